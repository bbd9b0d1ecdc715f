//! Stabilization monitoring
//!
//! While the session is in `stabilizing`, a bounded accumulator integrates
//! how long the user has been both steady and breathing calmly. Reaching the
//! hold threshold raises a single "stabilized" event per phase entry.
//!
//! The accumulator is kept in integer milliseconds so that thirty 0.1 s gains
//! land exactly on 3.0 s.

use crate::config::StabilizationConfig;
use crate::types::SessionPhase;

/// Event raised by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizationEvent {
    Stabilized,
}

/// Bounded integrator of continuous calm
#[derive(Debug, Clone)]
pub struct StabilizationMonitor {
    gain_ms: u64,
    decay_ms: u64,
    hold_ms: u64,
    accumulator_ms: u64,
    fired: bool,
}

impl Default for StabilizationMonitor {
    fn default() -> Self {
        Self::new(&StabilizationConfig::default())
    }
}

impl StabilizationMonitor {
    pub fn new(config: &StabilizationConfig) -> Self {
        Self {
            // A zero gain could never reach the hold
            gain_ms: to_ms(config.gain_sec).max(1),
            decay_ms: to_ms(config.decay_sec),
            hold_ms: to_ms(config.hold_sec).max(1),
            accumulator_ms: 0,
            fired: false,
        }
    }

    /// Sample the latest classifier flags for one monitor tick
    pub fn tick(
        &mut self,
        phase: SessionPhase,
        steady: bool,
        calm: bool,
    ) -> Option<StabilizationEvent> {
        if phase != SessionPhase::Stabilizing {
            self.reset();
            return None;
        }

        if steady && calm {
            self.accumulator_ms = (self.accumulator_ms + self.gain_ms).min(self.hold_ms);
        } else {
            self.accumulator_ms = self.accumulator_ms.saturating_sub(self.decay_ms);
        }

        if self.accumulator_ms >= self.hold_ms && !self.fired {
            self.fired = true;
            return Some(StabilizationEvent::Stabilized);
        }
        None
    }

    /// Back to zero; re-arms the stabilized event
    pub fn reset(&mut self) {
        self.accumulator_ms = 0;
        self.fired = false;
    }

    /// Accumulated calm in seconds (0 to hold)
    pub fn accumulator(&self) -> f64 {
        self.accumulator_ms as f64 / 1000.0
    }

    /// Accumulator as a fraction of the hold threshold
    pub fn progress(&self) -> f64 {
        self.accumulator_ms as f64 / self.hold_ms as f64
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

fn to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_thirty_calm_ticks_fire_once() {
        let mut monitor = StabilizationMonitor::default();
        for tick in 1..=29 {
            assert_eq!(monitor.tick(SessionPhase::Stabilizing, true, true), None, "tick {tick}");
        }
        assert!((monitor.accumulator() - 2.9).abs() < 1e-9);
        assert_eq!(
            monitor.tick(SessionPhase::Stabilizing, true, true),
            Some(StabilizationEvent::Stabilized)
        );
        assert_eq!(monitor.accumulator(), 3.0);
        assert_eq!(monitor.progress(), 1.0);

        for _ in 0..10 {
            assert_eq!(monitor.tick(SessionPhase::Stabilizing, true, true), None);
        }
        assert_eq!(monitor.accumulator(), 3.0);
    }

    #[test]
    fn test_sub_millisecond_gain_still_progresses() {
        let config = StabilizationConfig {
            gain_sec: 0.0001,
            hold_sec: 0.005,
            ..StabilizationConfig::default()
        };
        let mut monitor = StabilizationMonitor::new(&config);
        let fired = (0..5)
            .filter_map(|_| monitor.tick(SessionPhase::Stabilizing, true, true))
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let mut monitor = StabilizationMonitor::default();
        monitor.tick(SessionPhase::Stabilizing, true, true);
        monitor.tick(SessionPhase::Stabilizing, false, true);
        assert_eq!(monitor.accumulator(), 0.0);
        monitor.tick(SessionPhase::Stabilizing, true, false);
        assert_eq!(monitor.accumulator(), 0.0);
    }

    #[test]
    fn test_other_phase_resets() {
        let mut monitor = StabilizationMonitor::default();
        for _ in 0..10 {
            monitor.tick(SessionPhase::Stabilizing, true, true);
        }
        assert!(monitor.accumulator() > 0.0);
        assert_eq!(monitor.tick(SessionPhase::RestoreButton, true, true), None);
        assert_eq!(monitor.accumulator(), 0.0);
    }

    #[test]
    fn test_rearms_after_phase_cycle() {
        let mut monitor = StabilizationMonitor::default();
        for _ in 0..30 {
            monitor.tick(SessionPhase::Stabilizing, true, true);
        }
        assert!(monitor.has_fired());
        monitor.tick(SessionPhase::Restored, false, false);
        assert!(!monitor.has_fired());

        let fired = (0..30)
            .filter_map(|_| monitor.tick(SessionPhase::Stabilizing, true, true))
            .count();
        assert_eq!(fired, 1);
    }

    proptest! {
        #[test]
        fn prop_accumulator_bounded_and_directional(
            flags in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..200)
        ) {
            let mut monitor = StabilizationMonitor::default();
            let mut fired = 0;
            for (steady, calm) in flags {
                let before = monitor.accumulator();
                if monitor.tick(SessionPhase::Stabilizing, steady, calm).is_some() {
                    fired += 1;
                }
                let after = monitor.accumulator();
                prop_assert!((0.0..=3.0).contains(&after));
                if steady && calm {
                    prop_assert!(after >= before);
                } else if before > 0.0 {
                    prop_assert!(after < before);
                } else {
                    prop_assert_eq!(after, 0.0);
                }
            }
            prop_assert!(fired <= 1);
        }
    }
}
