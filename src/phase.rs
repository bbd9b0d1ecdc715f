//! Guided session phase machine
//!
//! Drives the flow `hidden → caption → logPrompt → restoreButton →
//! stabilizing → restored → cameraFading → hidden`. User actions and timer
//! expiries move it forward; `clear` returns to `hidden` from anywhere.
//!
//! Delayed transitions are scheduled events tagged with the phase that issued
//! them. Leaving a phase cancels everything tagged with it, so a stale timer
//! can never fire into a phase it was not meant for.

use std::time::Duration;
use tracing::{debug, info};

use crate::config::TimingConfig;
use crate::types::{BreathingQuality, Emotion, SessionPhase};

/// User-initiated input to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
    SelectEmotion(Emotion),
    /// Answer to "log this?"
    AnswerLog(bool),
    RestoreBalance,
    Clear,
}

/// Delayed transition kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    CaptionElapsed,
    RestoredElapsed,
    FadeElapsed,
}

/// Session facts gathered when stabilization completes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionDraft {
    pub emotion: Emotion,
    pub stabilization_duration: f64,
    pub breathing_quality: BreathingQuality,
    pub is_logged: bool,
}

/// Side effects the engine must apply after a transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEffect {
    /// Blend the display parameters to an emotion's preset
    Retarget { emotion: Emotion, duration_sec: f32 },
    SetActiveEmotion(Option<Emotion>),
    StartBreathingInput,
    StartHandInput,
    FadeHandInput,
    /// Stop both classifier inputs
    StopInputs,
    /// Hand the scene to the restore override
    BeginRestoreAnimation,
    RecordSession(SessionDraft),
}

/// A completed phase change and what it requires
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: SessionPhase,
    pub to: SessionPhase,
    pub effects: Vec<PhaseEffect>,
}

/// Documented edge set; `clear` may enter `hidden` from any phase
pub fn is_allowed(from: SessionPhase, to: SessionPhase) -> bool {
    use SessionPhase::*;
    matches!(
        (from, to),
        (_, Hidden)
            | (Hidden, Caption)
            | (Caption, LogPrompt)
            | (LogPrompt, RestoreButton)
            | (RestoreButton, Stabilizing)
            | (Stabilizing, Restored)
            | (Restored, CameraFading)
    )
}

#[derive(Debug, Clone)]
struct ScheduledEvent {
    id: u64,
    due: Duration,
    issued_in: SessionPhase,
    event: TimerEvent,
}

/// Pending delayed transitions keyed by the phase that issued them
#[derive(Debug, Clone, Default)]
pub struct PhaseScheduler {
    next_id: u64,
    events: Vec<ScheduledEvent>,
}

impl PhaseScheduler {
    pub fn schedule(&mut self, issued_in: SessionPhase, due: Duration, event: TimerEvent) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push(ScheduledEvent {
            id,
            due,
            issued_in,
            event,
        });
        id
    }

    /// Drop every event issued in `phase`; returns how many were cancelled
    pub fn cancel_phase(&mut self, phase: SessionPhase) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.issued_in != phase);
        before - self.events.len()
    }

    /// Remove and return the earliest event due at `now`
    fn pop_due(&mut self, now: Duration) -> Option<ScheduledEvent> {
        let index = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= now)
            .min_by_key(|(_, e)| (e.due, e.id))
            .map(|(i, _)| i)?;
        Some(self.events.remove(index))
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Phases that currently own pending events
    pub fn pending_phases(&self) -> Vec<SessionPhase> {
        self.events.iter().map(|e| e.issued_in).collect()
    }
}

/// The guided-flow state machine
#[derive(Debug, Clone)]
pub struct SessionPhaseMachine {
    phase: SessionPhase,
    timings: TimingConfig,
    scheduler: PhaseScheduler,
    emotion: Option<Emotion>,
    logged: Option<bool>,
    stabilization_started: Option<Duration>,
}

impl Default for SessionPhaseMachine {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}

impl SessionPhaseMachine {
    pub fn new(timings: TimingConfig) -> Self {
        Self {
            phase: SessionPhase::Hidden,
            timings,
            scheduler: PhaseScheduler::default(),
            emotion: None,
            logged: None,
            stabilization_started: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Emotion being explored in the current cycle
    pub fn emotion(&self) -> Option<Emotion> {
        self.emotion
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.scheduler
    }

    /// Apply a user action at engine time `now`; `None` when it does not apply
    pub fn handle(&mut self, action: PhaseAction, now: Duration) -> Option<Transition> {
        match (self.phase, action) {
            (SessionPhase::Hidden, PhaseAction::SelectEmotion(emotion)) => {
                self.emotion = Some(emotion);
                self.logged = None;
                self.stabilization_started = None;
                Some(self.enter(
                    SessionPhase::Caption,
                    now,
                    vec![
                        PhaseEffect::SetActiveEmotion(Some(emotion)),
                        PhaseEffect::Retarget {
                            emotion,
                            duration_sec: self.timings.select_blend_sec,
                        },
                        PhaseEffect::StartBreathingInput,
                        PhaseEffect::StartHandInput,
                    ],
                ))
            }
            (SessionPhase::LogPrompt, PhaseAction::AnswerLog(answer)) => {
                self.logged = Some(answer);
                Some(self.enter(SessionPhase::RestoreButton, now, Vec::new()))
            }
            (SessionPhase::RestoreButton, PhaseAction::RestoreBalance) => {
                self.stabilization_started = Some(now);
                Some(self.enter(
                    SessionPhase::Stabilizing,
                    now,
                    vec![PhaseEffect::StartHandInput],
                ))
            }
            (_, PhaseAction::Clear) => {
                self.emotion = None;
                self.logged = None;
                self.stabilization_started = None;
                Some(self.enter(
                    SessionPhase::Hidden,
                    now,
                    vec![PhaseEffect::StopInputs, PhaseEffect::SetActiveEmotion(None)],
                ))
            }
            (phase, action) => {
                debug!(%phase, ?action, "action ignored");
                None
            }
        }
    }

    /// Stabilization completed; `None` unless currently stabilizing
    pub fn on_stabilized(
        &mut self,
        now: Duration,
        breathing_quality: BreathingQuality,
    ) -> Option<Transition> {
        if self.phase != SessionPhase::Stabilizing {
            debug!(phase = %self.phase, "stale stabilized event ignored");
            return None;
        }
        let emotion = self.emotion?;
        let started = self.stabilization_started.unwrap_or(now);
        let draft = SessionDraft {
            emotion,
            stabilization_duration: now.saturating_sub(started).as_secs_f64(),
            breathing_quality,
            is_logged: self.logged.unwrap_or(false),
        };
        Some(self.enter(
            SessionPhase::Restored,
            now,
            vec![
                PhaseEffect::RecordSession(draft),
                PhaseEffect::Retarget {
                    emotion: Emotion::Calm,
                    duration_sec: self.timings.restore_blend_sec,
                },
                PhaseEffect::BeginRestoreAnimation,
            ],
        ))
    }

    /// Fire every scheduled transition due at `now`, in order
    pub fn advance(&mut self, now: Duration) -> Vec<Transition> {
        let mut transitions = Vec::new();
        while let Some(scheduled) = self.scheduler.pop_due(now) {
            debug_assert_eq!(scheduled.issued_in, self.phase);
            // Fire relative to the deadline, not `now`, so chained timers keep their spacing
            let at = scheduled.due;
            let transition = match (self.phase, scheduled.event) {
                (SessionPhase::Caption, TimerEvent::CaptionElapsed) => {
                    self.enter(SessionPhase::LogPrompt, at, Vec::new())
                }
                (SessionPhase::Restored, TimerEvent::RestoredElapsed) => self.enter(
                    SessionPhase::CameraFading,
                    at,
                    vec![
                        PhaseEffect::FadeHandInput,
                        PhaseEffect::SetActiveEmotion(Some(Emotion::Calm)),
                    ],
                ),
                (SessionPhase::CameraFading, TimerEvent::FadeElapsed) => {
                    self.emotion = None;
                    self.enter(SessionPhase::Hidden, at, vec![PhaseEffect::StopInputs])
                }
                (phase, event) => {
                    debug!(%phase, ?event, "timer does not apply");
                    continue;
                }
            };
            transitions.push(transition);
        }
        transitions
    }

    fn enter(&mut self, to: SessionPhase, now: Duration, effects: Vec<PhaseEffect>) -> Transition {
        let from = self.phase;
        debug_assert!(is_allowed(from, to), "illegal transition {from} -> {to}");

        let cancelled = self.scheduler.cancel_phase(from);
        if cancelled > 0 {
            debug!(%from, cancelled, "cancelled pending timers");
        }
        self.phase = to;

        match to {
            SessionPhase::Caption => {
                self.schedule(to, now, self.timings.caption_sec, TimerEvent::CaptionElapsed)
            }
            SessionPhase::Restored => {
                self.schedule(to, now, self.timings.restored_sec, TimerEvent::RestoredElapsed)
            }
            SessionPhase::CameraFading => {
                self.schedule(to, now, self.timings.fade_sec, TimerEvent::FadeElapsed)
            }
            _ => {}
        }

        info!(%from, %to, "phase transition");
        Transition { from, to, effects }
    }

    fn schedule(&mut self, phase: SessionPhase, now: Duration, delay_sec: f64, event: TimerEvent) {
        // Delays past what a Duration holds never fire
        let delay = Duration::try_from_secs_f64(delay_sec.max(0.0)).unwrap_or(Duration::MAX);
        let due = now.saturating_add(delay);
        self.scheduler.schedule(phase, due, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn to_stabilizing(machine: &mut SessionPhaseMachine) {
        machine.handle(PhaseAction::SelectEmotion(Emotion::Anxiety), secs(0.0));
        machine.advance(secs(5.0));
        machine.handle(PhaseAction::AnswerLog(true), secs(6.0));
        machine.handle(PhaseAction::RestoreBalance, secs(7.0));
    }

    #[test]
    fn test_selection_enters_caption() {
        let mut machine = SessionPhaseMachine::default();
        let t = machine
            .handle(PhaseAction::SelectEmotion(Emotion::Love), secs(0.0))
            .unwrap();
        assert_eq!(t.to, SessionPhase::Caption);
        assert!(t.effects.contains(&PhaseEffect::Retarget {
            emotion: Emotion::Love,
            duration_sec: 1.2
        }));
        assert!(t.effects.contains(&PhaseEffect::StartBreathingInput));
        assert_eq!(machine.scheduler().pending(), 1);
    }

    #[test]
    fn test_caption_timer() {
        let mut machine = SessionPhaseMachine::default();
        machine.handle(PhaseAction::SelectEmotion(Emotion::Calm), secs(0.0));
        assert!(machine.advance(secs(4.9)).is_empty());
        let fired = machine.advance(secs(5.0));
        assert_eq!(fired.len(), 1);
        assert_eq!(machine.phase(), SessionPhase::LogPrompt);
    }

    #[test]
    fn test_unrepresentable_delay_never_fires() {
        let timings = TimingConfig {
            caption_sec: 1e30,
            ..TimingConfig::default()
        };
        let mut machine = SessionPhaseMachine::new(timings);
        machine.handle(PhaseAction::SelectEmotion(Emotion::Happy), secs(1.0));
        assert!(machine.advance(secs(1e9)).is_empty());
        assert_eq!(machine.phase(), SessionPhase::Caption);
        assert!(machine.handle(PhaseAction::Clear, secs(2.0)).is_some());
    }

    #[test]
    fn test_clear_cancels_caption_timer() {
        let mut machine = SessionPhaseMachine::default();
        machine.handle(PhaseAction::SelectEmotion(Emotion::Calm), secs(0.0));
        let t = machine.handle(PhaseAction::Clear, secs(1.0)).unwrap();
        assert!(t.effects.contains(&PhaseEffect::StopInputs));
        assert_eq!(machine.scheduler().pending(), 0);

        // Re-enter caption later; the old deadline must not cut it short
        machine.handle(PhaseAction::SelectEmotion(Emotion::Calm), secs(3.0));
        assert!(machine.advance(secs(5.5)).is_empty());
        assert_eq!(machine.phase(), SessionPhase::Caption);
        machine.advance(secs(8.0));
        assert_eq!(machine.phase(), SessionPhase::LogPrompt);
    }

    #[test]
    fn test_log_prompt_cannot_jump_to_stabilizing() {
        let mut machine = SessionPhaseMachine::default();
        machine.handle(PhaseAction::SelectEmotion(Emotion::Sadness), secs(0.0));
        machine.advance(secs(5.0));
        assert_eq!(machine.phase(), SessionPhase::LogPrompt);
        assert!(machine.handle(PhaseAction::RestoreBalance, secs(5.5)).is_none());
        assert!(machine.on_stabilized(secs(5.5), BreathingQuality::Calm).is_none());
        assert_eq!(machine.phase(), SessionPhase::LogPrompt);
        assert!(!is_allowed(SessionPhase::LogPrompt, SessionPhase::Stabilizing));
    }

    #[test]
    fn test_selection_ignored_outside_hidden() {
        let mut machine = SessionPhaseMachine::default();
        machine.handle(PhaseAction::SelectEmotion(Emotion::Happy), secs(0.0));
        assert!(machine
            .handle(PhaseAction::SelectEmotion(Emotion::Angry), secs(1.0))
            .is_none());
        assert_eq!(machine.emotion(), Some(Emotion::Happy));
    }

    #[test]
    fn test_full_cycle() {
        let mut machine = SessionPhaseMachine::default();
        to_stabilizing(&mut machine);
        assert_eq!(machine.phase(), SessionPhase::Stabilizing);

        let t = machine.on_stabilized(secs(10.5), BreathingQuality::Calm).unwrap();
        assert_eq!(t.to, SessionPhase::Restored);
        assert_eq!(
            t.effects[0],
            PhaseEffect::RecordSession(SessionDraft {
                emotion: Emotion::Anxiety,
                stabilization_duration: 3.5,
                breathing_quality: BreathingQuality::Calm,
                is_logged: true,
            })
        );
        assert!(t.effects.contains(&PhaseEffect::Retarget {
            emotion: Emotion::Calm,
            duration_sec: 3.0
        }));

        let fired = machine.advance(secs(13.5));
        assert_eq!(fired.len(), 1);
        assert_eq!(machine.phase(), SessionPhase::CameraFading);
        assert!(fired[0]
            .effects
            .contains(&PhaseEffect::SetActiveEmotion(Some(Emotion::Calm))));

        let fired = machine.advance(secs(20.0));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].effects, vec![PhaseEffect::StopInputs]);
        assert_eq!(machine.phase(), SessionPhase::Hidden);
    }

    #[test]
    fn test_late_advance_chains_timers() {
        let mut machine = SessionPhaseMachine::default();
        to_stabilizing(&mut machine);
        machine.on_stabilized(secs(10.0), BreathingQuality::Elevated);
        // One big step covers both restored (3 s) and fade (1.75 s)
        let fired = machine.advance(secs(30.0));
        assert_eq!(fired.len(), 2);
        assert_eq!(machine.phase(), SessionPhase::Hidden);
    }

    #[test]
    fn test_clear_during_restored_drops_fade_chain() {
        let mut machine = SessionPhaseMachine::default();
        to_stabilizing(&mut machine);
        machine.on_stabilized(secs(10.0), BreathingQuality::Calm);
        machine.handle(PhaseAction::Clear, secs(11.0));
        assert_eq!(machine.scheduler().pending(), 0);
        assert!(machine.advance(secs(30.0)).is_empty());
    }

    #[test]
    fn test_every_emitted_transition_is_documented() {
        let mut machine = SessionPhaseMachine::default();
        let mut transitions = Vec::new();
        transitions.extend(machine.handle(PhaseAction::SelectEmotion(Emotion::Calm), secs(0.0)));
        transitions.extend(machine.advance(secs(5.0)));
        transitions.extend(machine.handle(PhaseAction::AnswerLog(false), secs(5.0)));
        transitions.extend(machine.handle(PhaseAction::RestoreBalance, secs(6.0)));
        transitions.extend(machine.on_stabilized(secs(9.0), BreathingQuality::Calm));
        transitions.extend(machine.advance(secs(20.0)));
        transitions.extend(machine.handle(PhaseAction::Clear, secs(21.0)));
        assert_eq!(transitions.len(), 8);
        for t in transitions {
            assert!(is_allowed(t.from, t.to), "{} -> {}", t.from, t.to);
        }
    }

    #[test]
    fn test_pending_events_belong_to_current_phase() {
        let mut machine = SessionPhaseMachine::default();
        machine.handle(PhaseAction::SelectEmotion(Emotion::Calm), secs(0.0));
        assert_eq!(machine.scheduler().pending_phases(), vec![SessionPhase::Caption]);
        machine.advance(secs(5.0));
        assert!(machine.scheduler().pending_phases().is_empty());
    }
}
