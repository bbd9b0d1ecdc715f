//! Calm engine
//!
//! Owns the control-flow state (phase, stabilization accumulator, display
//! parameters) and drives it on a virtual clock advanced by the host:
//!
//! ```text
//!   audio ──▶ BreathingInput ─┐ latest
//!                             ├──────▶ StabilizationMonitor (100 ms) ──▶ SessionPhaseMachine
//!   pose  ──▶ HandInput ──────┘                                                │ effects
//!                                                                              ▼
//!   ParameterInterpolator (60 Hz) ◀── retarget ─────────────────────── SessionStore / inputs
//!          │ display
//!          ▼
//!   EmotionAnimationDirector ──▶ SceneFrame ──▶ RenderSurface
//! ```
//!
//! Producers only publish readings; every write to phase, accumulator and
//! parameters happens inside [`CalmEngine`] methods.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::animation::{EmotionAnimationDirector, RenderSurface, SceneFrame};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::geometry::{
    BackgroundJobs, ConnectionGraph, GeometryUpdate, NeuralGeometry, NeuralGeometryBuilder,
};
use crate::interpolator::ParameterInterpolator;
use crate::phase::{PhaseAction, PhaseEffect, SessionPhaseMachine, Transition};
use crate::presets::EmotionPresetTable;
use crate::signals::{
    BreathingClassifier, BreathingInput, HandFrame, HandInput, HandSignalClassifier,
};
use crate::stabilization::{StabilizationEvent, StabilizationMonitor};
use crate::store::SessionStore;
use crate::types::{BreathingQuality, Emotion, EmotionParameters, EngineSnapshot, SessionPhase};

/// Longest span a single [`CalmEngine::advance`] call simulates
pub const MAX_ADVANCE: Duration = Duration::from_secs(3600);

/// The animation clock restarts from zero after this long so `f32` time keeps sub-millisecond resolution
const ANIMATION_WRAP: Duration = Duration::from_secs(3600);

pub struct CalmEngine {
    config: EngineConfig,
    presets: EmotionPresetTable,
    interpolator: ParameterInterpolator,
    monitor: StabilizationMonitor,
    machine: SessionPhaseMachine,
    breathing: BreathingInput,
    hand: HandInput,
    store: SessionStore,
    director: EmotionAnimationDirector,
    builder: NeuralGeometryBuilder,
    rebuilds: BackgroundJobs<GeometryUpdate>,
    geometry: Option<Arc<NeuralGeometry>>,
    graph: Option<Arc<ConnectionGraph>>,
    /// Connectivity of the newest requested graph
    graph_connectivity: f32,
    active_emotion: Option<Emotion>,
    clock: Duration,
    /// Engine time at which the animation clock last restarted
    animation_epoch: Duration,
    monitor_tick: Duration,
    interpolator_tick: Duration,
    next_monitor: Duration,
    next_interpolator: Duration,
}

impl CalmEngine {
    /// Engine with an in-memory session store
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_store(config, SessionStore::in_memory())
    }

    pub fn with_store(config: EngineConfig, store: SessionStore) -> Result<Self, EngineError> {
        config.validate()?;

        let presets = EmotionPresetTable::new();
        let initial = presets.preset(Emotion::Calm);
        let interpolator_tick = config.timings.interpolator_tick();
        let monitor_tick = config.stabilization.tick();
        let builder = NeuralGeometryBuilder::new(config.geometry.clone());

        let engine = Self {
            interpolator: ParameterInterpolator::new(initial, 1.0 / config.timings.interpolator_hz),
            monitor: StabilizationMonitor::new(&config.stabilization),
            machine: SessionPhaseMachine::new(config.timings.clone()),
            breathing: BreathingInput::new(
                "breathing",
                BreathingClassifier::new(config.breathing.clone()),
            ),
            hand: HandInput::new("hand", HandSignalClassifier::new(config.hand.clone())),
            store,
            director: EmotionAnimationDirector::new(config.animation.clone(), config.geometry.seed),
            builder,
            rebuilds: BackgroundJobs::new("geometry"),
            geometry: None,
            graph: None,
            graph_connectivity: initial.connectivity,
            active_emotion: None,
            clock: Duration::ZERO,
            animation_epoch: Duration::ZERO,
            monitor_tick,
            interpolator_tick,
            next_monitor: monitor_tick,
            next_interpolator: interpolator_tick,
            presets,
            config,
        };

        let builder = engine.builder.clone();
        let connectivity = engine.graph_connectivity;
        engine.rebuilds.submit(move || {
            let (geometry, graph) = builder.build_all(connectivity);
            GeometryUpdate::Full(geometry, graph)
        })?;

        info!(sessions = engine.store.len(), "calm engine created");
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn active_emotion(&self) -> Option<Emotion> {
        self.active_emotion
    }

    pub fn parameters(&self) -> EmotionParameters {
        self.interpolator.display()
    }

    pub fn presets(&self) -> &EmotionPresetTable {
        &self.presets
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Handle for an audio producer thread
    pub fn breathing_input(&self) -> BreathingInput {
        self.breathing.clone()
    }

    /// Handle for a pose producer thread
    pub fn hand_input(&self) -> HandInput {
        self.hand.clone()
    }

    /// Classify an audio frame on the caller's thread
    pub fn push_audio(&self, frame: &[f32]) -> bool {
        self.breathing.push_frame(frame)
    }

    /// Classify a pose frame on the caller's thread
    pub fn push_hand(&self, frame: &HandFrame) -> bool {
        self.hand.push_frame(frame)
    }

    // ------------------------------------------------------------------------
    // User actions
    // ------------------------------------------------------------------------

    /// Pick an emotion to explore; only accepted while hidden
    pub fn select_emotion(&mut self, emotion: Emotion) -> bool {
        self.dispatch(PhaseAction::SelectEmotion(emotion))
    }

    pub fn answer_log(&mut self, log: bool) -> bool {
        self.dispatch(PhaseAction::AnswerLog(log))
    }

    pub fn restore_balance(&mut self) -> bool {
        self.dispatch(PhaseAction::RestoreBalance)
    }

    /// Return to hidden from any phase, stopping inputs and timers
    pub fn clear(&mut self) -> bool {
        self.director.cancel_restore();
        self.dispatch(PhaseAction::Clear)
    }

    /// New exploration: every emotion may be recorded once more
    pub fn begin_exploration(&mut self) {
        debug!("exploration started");
        self.store.begin_exploration();
    }

    fn dispatch(&mut self, action: PhaseAction) -> bool {
        match self.machine.handle(action, self.clock) {
            Some(transition) => {
                self.apply(transition);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------------

    /// Run every timer, monitor tick and interpolator tick due within `dt`.
    ///
    /// Spans longer than [`MAX_ADVANCE`] are clamped to it.
    pub fn advance(&mut self, dt: Duration) {
        let dt = if dt > MAX_ADVANCE {
            warn!(requested_ms = dt.as_millis() as u64, "advance clamped to one hour");
            MAX_ADVANCE
        } else {
            dt
        };
        let Some(target) = self.clock.checked_add(dt) else {
            warn!("engine clock exhausted, advance ignored");
            return;
        };

        loop {
            let next = self.next_monitor.min(self.next_interpolator);
            if next > target {
                break;
            }
            self.clock = next;
            self.fire_timers();

            if self.next_interpolator == next {
                self.interpolator.tick();
                self.next_interpolator += self.interpolator_tick;
            }
            if self.next_monitor == next {
                self.sample_monitor();
                self.next_monitor += self.monitor_tick;
            }
        }

        self.clock = target;
        self.fire_timers();
        self.wrap_animation_clock();
        self.poll_geometry();
        self.request_graph_if_drifted();
    }

    fn wrap_animation_clock(&mut self) {
        let elapsed = self.clock.saturating_sub(self.animation_epoch);
        if elapsed < ANIMATION_WRAP {
            return;
        }
        let wraps = (elapsed.as_secs() / ANIMATION_WRAP.as_secs()) as u32;
        let shift = ANIMATION_WRAP * wraps;
        self.animation_epoch += shift;
        self.director.rebase(shift.as_secs_f32());
        debug!(epoch_sec = self.animation_epoch.as_secs(), "animation clock wrapped");
    }

    fn fire_timers(&mut self) {
        for transition in self.machine.advance(self.clock) {
            self.apply(transition);
        }
    }

    fn sample_monitor(&mut self) {
        let hand = self.hand.reading();
        let breathing = self.breathing.reading();
        let event = self
            .monitor
            .tick(self.machine.phase(), hand.steady, breathing.calm);

        if let Some(StabilizationEvent::Stabilized) = event {
            let quality = BreathingQuality::from_calm_flag(breathing.calm);
            if let Some(transition) = self.machine.on_stabilized(self.clock, quality) {
                self.apply(transition);
            }
        }
    }

    fn apply(&mut self, transition: Transition) {
        for effect in transition.effects {
            match effect {
                PhaseEffect::Retarget {
                    emotion,
                    duration_sec,
                } => {
                    self.interpolator
                        .retarget(self.presets.preset(emotion), duration_sec as f64);
                }
                PhaseEffect::SetActiveEmotion(emotion) => {
                    self.active_emotion = emotion;
                    if let Some(emotion) = emotion {
                        self.director.set_emotion(emotion);
                    }
                }
                PhaseEffect::StartBreathingInput => self.breathing.start(),
                PhaseEffect::StartHandInput => self.hand.start(),
                PhaseEffect::FadeHandInput => self.hand.fade(),
                PhaseEffect::StopInputs => {
                    self.breathing.stop();
                    self.hand.stop();
                    self.monitor.reset();
                }
                PhaseEffect::BeginRestoreAnimation => {
                    self.director.begin_restore(self.animation_time());
                }
                PhaseEffect::RecordSession(draft) => {
                    self.store.record(&draft);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------------

    fn poll_geometry(&mut self) {
        if let Some(update) = self.rebuilds.poll() {
            self.install(update);
        }
    }

    fn install(&mut self, update: GeometryUpdate) {
        match update {
            GeometryUpdate::Full(geometry, graph) => {
                debug!(edges = graph.edge_count(), "geometry installed");
                self.geometry = Some(Arc::new(geometry));
                self.graph = Some(Arc::new(graph));
                self.director.geometry_replaced();
            }
            GeometryUpdate::Graph(graph) => {
                debug!(
                    connectivity = graph.connectivity(),
                    edges = graph.edge_count(),
                    "connection graph installed"
                );
                self.graph = Some(Arc::new(graph));
            }
        }
    }

    fn request_graph_if_drifted(&mut self) {
        // Graph rebuilds would supersede the initial full build
        let Some(geometry) = self.geometry.as_ref().map(Arc::clone) else {
            return;
        };
        let connectivity = self.interpolator.display().connectivity;
        if (connectivity - self.graph_connectivity).abs() <= self.config.geometry.connectivity_epsilon {
            return;
        }

        let builder = self.builder.clone();
        let submitted = self.rebuilds.submit(move || {
            GeometryUpdate::Graph(builder.build_graph(&geometry.skeleton, connectivity))
        });
        match submitted {
            Ok(_) => self.graph_connectivity = connectivity,
            Err(e) => debug!(error = %e, "graph rebuild not started"),
        }
    }

    /// Block until pending geometry lands; returns whether geometry is available
    pub fn wait_for_geometry(&mut self, timeout: Duration) -> bool {
        if self.rebuilds.is_pending() {
            if let Some(update) = self.rebuilds.wait(timeout) {
                self.install(update);
            }
        }
        self.geometry.is_some()
    }

    pub fn geometry(&self) -> Option<Arc<NeuralGeometry>> {
        self.geometry.clone()
    }

    pub fn graph(&self) -> Option<Arc<ConnectionGraph>> {
        self.graph.clone()
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Seconds since the animation epoch; stays below the wrap period
    fn animation_time(&self) -> f32 {
        self.clock.saturating_sub(self.animation_epoch).as_secs_f64() as f32
    }

    /// Compute the scene at the current clock
    pub fn frame(&mut self) -> SceneFrame {
        let params = self.interpolator.display();
        let now = self.animation_time();
        self.director
            .frame(now, &params, self.geometry.clone(), self.graph.clone())
    }

    /// Compute the scene and push it to `surface`
    pub fn render(&mut self, surface: &mut dyn RenderSurface) {
        self.frame().present(surface);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let hand = self.hand.reading();
        let breathing = self.breathing.reading();
        EngineSnapshot {
            phase: self.machine.phase(),
            active_emotion: self.active_emotion,
            parameters: self.interpolator.display(),
            blend: self.interpolator.blend() as f32,
            stabilization_progress: self.monitor.progress(),
            gesture: hand.gesture,
            hand_steady: hand.steady,
            breathing_intensity: breathing.intensity,
            breathing_calm: breathing.calm,
            breathing_input: self.breathing.state(),
            hand_input: self.hand.state(),
            session_count: self.store.len(),
            clock_sec: self.clock.as_secs_f64(),
        }
    }
}

impl Drop for CalmEngine {
    fn drop(&mut self) {
        // Let attached workers exit after their current frame
        self.breathing.close();
        self.hand.close();
    }
}
