//! End-to-end guided sessions driven through the public API

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use synheart_calm::signals::{
    spawn_audio_worker, spawn_pose_worker, AudioFormat, AudioSource, HandJoint, PoseSource,
};
use synheart_calm::{
    BreathingQuality, CalmEngine, Emotion, EngineConfig, EngineError, GestureLabel, HandFrame,
    InputState, SessionPhase, SessionStore,
};

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.geometry.point_count = 400;
    config.geometry.seed = Some(21);
    config
}

fn quiet_frame() -> Vec<f32> {
    (0..512).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect()
}

fn loud_frame() -> Vec<f32> {
    (0..512).map(|i| if i % 2 == 0 { 0.3 } else { -0.3 }).collect()
}

fn open_palm() -> HandFrame {
    HandFrame::empty()
        .with(HandJoint::Wrist, 0.5, 0.8, 0.95)
        .with(HandJoint::IndexMcp, 0.45, 0.65, 0.9)
        .with(HandJoint::MiddleMcp, 0.5, 0.64, 0.9)
        .with(HandJoint::RingMcp, 0.55, 0.65, 0.9)
        .with(HandJoint::LittleMcp, 0.59, 0.67, 0.9)
        .with(HandJoint::IndexPip, 0.44, 0.55, 0.9)
        .with(HandJoint::MiddlePip, 0.5, 0.53, 0.9)
        .with(HandJoint::RingPip, 0.56, 0.55, 0.9)
        .with(HandJoint::LittlePip, 0.61, 0.58, 0.9)
        .with(HandJoint::IndexTip, 0.43, 0.45, 0.9)
        .with(HandJoint::MiddleTip, 0.5, 0.42, 0.9)
        .with(HandJoint::RingTip, 0.57, 0.45, 0.9)
        .with(HandJoint::LittleTip, 0.63, 0.5, 0.9)
}

fn walk_to_stabilizing(engine: &mut CalmEngine, emotion: Emotion, log: bool) {
    assert!(engine.select_emotion(emotion));
    engine.advance(Duration::from_secs(5));
    assert!(engine.answer_log(log));
    assert!(engine.restore_balance());
}

#[test]
fn guided_session_is_persisted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sessions.json");

    {
        let mut engine = CalmEngine::with_store(config(), SessionStore::open(&path)).unwrap();
        walk_to_stabilizing(&mut engine, Emotion::Angry, false);

        for _ in 0..60 {
            engine.push_audio(&quiet_frame());
        }
        for _ in 0..10 {
            engine.push_hand(&open_palm());
        }
        assert_eq!(engine.snapshot().gesture, GestureLabel::OpenPalm);

        engine.advance(Duration::from_secs(3));
        assert_eq!(engine.phase(), SessionPhase::Restored);
        engine.advance(Duration::from_secs(5));
        assert_eq!(engine.phase(), SessionPhase::Hidden);
    }

    let store = SessionStore::open(&path);
    assert_eq!(store.len(), 1);
    let session = &store.sessions()[0];
    assert_eq!(session.emotion, Emotion::Angry);
    assert_eq!(session.breathing_quality, BreathingQuality::Calm);
    assert!(!session.is_logged);
}

#[test]
fn elevated_breathing_blocks_stabilization() {
    let mut engine = CalmEngine::new(config()).unwrap();
    walk_to_stabilizing(&mut engine, Emotion::Anxiety, true);

    for step in 0..50 {
        engine.push_audio(&loud_frame());
        engine.push_hand(&open_palm());
        engine.advance(Duration::from_millis(100));
        assert_eq!(engine.phase(), SessionPhase::Stabilizing, "step {step}");
    }
    let snapshot = engine.snapshot();
    assert!(snapshot.hand_steady);
    assert!(!snapshot.breathing_calm);
    assert_eq!(snapshot.stabilization_progress, 0.0);
}

#[test]
fn clear_mid_stabilization_leaves_no_session() {
    let mut engine = CalmEngine::new(config()).unwrap();
    walk_to_stabilizing(&mut engine, Emotion::Love, true);
    for _ in 0..60 {
        engine.push_audio(&quiet_frame());
    }
    for _ in 0..10 {
        engine.push_hand(&open_palm());
    }
    engine.advance(Duration::from_secs(2));
    assert!(engine.clear());

    engine.advance(Duration::from_secs(10));
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Hidden);
    assert_eq!(snapshot.session_count, 0);
    assert_eq!(snapshot.breathing_input, InputState::Stopped);
    assert_eq!(snapshot.active_emotion, None);
}

#[test]
fn snapshot_serializes_for_hosts() {
    let mut engine = CalmEngine::new(config()).unwrap();
    engine.select_emotion(Emotion::Happy);
    let json = serde_json::to_value(engine.snapshot()).unwrap();
    assert_eq!(json["phase"], "caption");
    assert_eq!(json["active_emotion"], "happy");
    assert_eq!(json["breathing_input"], "running");
}

struct DeniedMicrophone;

impl AudioSource for DeniedMicrophone {
    fn open(&mut self) -> Result<AudioFormat, EngineError> {
        Err(EngineError::SignalUnavailable("microphone permission denied".to_string()))
    }

    fn next_frame(&mut self) -> Option<Vec<f32>> {
        None
    }
}

struct SteadyCamera {
    stop: Arc<AtomicBool>,
}

impl PoseSource for SteadyCamera {
    fn next_frame(&mut self) -> Option<HandFrame> {
        if self.stop.load(Ordering::SeqCst) {
            return None;
        }
        thread::sleep(Duration::from_millis(2));
        Some(open_palm())
    }
}

#[test]
fn denied_microphone_degrades_without_crashing() {
    let mut engine = CalmEngine::new(config()).unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    let audio = spawn_audio_worker(DeniedMicrophone, engine.breathing_input());
    let pose = spawn_pose_worker(SteadyCamera { stop: Arc::clone(&stop) }, engine.hand_input());
    audio.join().unwrap();
    assert!(engine.breathing_input().is_unavailable());

    walk_to_stabilizing(&mut engine, Emotion::Sadness, true);

    // Wait for the pose worker to fill the steadiness window
    let deadline = Instant::now() + Duration::from_secs(5);
    while !engine.snapshot().hand_steady && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(engine.snapshot().hand_steady);

    engine.advance(Duration::from_secs(10));
    // Breathing never reads calm, so the session cannot complete
    assert_eq!(engine.phase(), SessionPhase::Stabilizing);
    assert!(!engine.snapshot().breathing_calm);

    stop.store(true, Ordering::SeqCst);
    pose.join().unwrap();
}
