//! Engine configuration
//!
//! Every tunable threshold, window, and timing lives here with its default.
//! Configs round-trip through JSON so hosts can ship overrides alongside the app.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EngineError;

/// Smoothing window for breathing intensity (frames)
pub const DEFAULT_SMOOTHING_WINDOW: usize = 20;
/// Calm-detection window (~3 s of intensity outputs)
pub const DEFAULT_CALM_WINDOW: usize = 60;
/// RMS amplitude that maps to intensity 1.0
pub const DEFAULT_REFERENCE_RMS: f64 = 0.1;
/// Wrist positions kept for steadiness
pub const DEFAULT_WRIST_WINDOW: usize = 10;
/// Stabilization hold threshold (seconds-equivalent)
pub const DEFAULT_HOLD_SEC: f64 = 3.0;
/// Longest accepted phase timer, blend or hold
pub const MAX_TIMING_SEC: f64 = 3600.0;
/// Fastest accepted interpolator rate
pub const MAX_INTERPOLATOR_HZ: f64 = 1000.0;
/// Smallest stabilization gain the millisecond accumulator can represent
pub const MIN_GAIN_SEC: f64 = 0.001;

/// Breathing classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathingConfig {
    pub smoothing_window: usize,
    pub calm_window: usize,
    pub reference_rms: f64,
    /// Calm requires the window mean below this
    pub calm_mean_threshold: f64,
    /// Calm requires the window variance below this
    pub calm_variance_threshold: f64,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            calm_window: DEFAULT_CALM_WINDOW,
            reference_rms: DEFAULT_REFERENCE_RMS,
            calm_mean_threshold: 0.30,
            calm_variance_threshold: 0.02,
        }
    }
}

/// Hand classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandConfig {
    pub wrist_window: usize,
    /// Positional variance (normalized image units squared) below which the hand is steady
    pub steady_variance_threshold: f64,
    /// Landmarks at or below this confidence are ignored
    pub confidence_floor: f32,
    /// Extended fingers needed for an open palm
    pub open_palm_min_extended: usize,
}

impl Default for HandConfig {
    fn default() -> Self {
        Self {
            wrist_window: DEFAULT_WRIST_WINDOW,
            steady_variance_threshold: 0.0008,
            confidence_floor: 0.3,
            open_palm_min_extended: 3,
        }
    }
}

/// Stabilization monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationConfig {
    pub tick_ms: u64,
    /// Added per tick while steady and calm
    pub gain_sec: f64,
    /// Removed per tick otherwise
    pub decay_sec: f64,
    pub hold_sec: f64,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            gain_sec: 0.1,
            decay_sec: 0.15,
            hold_sec: DEFAULT_HOLD_SEC,
        }
    }
}

impl StabilizationConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Phase timers and parameter transition lengths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// caption -> logPrompt
    pub caption_sec: f64,
    /// restored -> cameraFading
    pub restored_sec: f64,
    /// cameraFading -> hidden
    pub fade_sec: f64,
    /// Blend length when an emotion is selected
    pub select_blend_sec: f32,
    /// Blend length back to calm after stabilization
    pub restore_blend_sec: f32,
    /// Interpolator tick rate
    pub interpolator_hz: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            caption_sec: 5.0,
            restored_sec: 3.0,
            fade_sec: 1.75,
            select_blend_sec: 1.2,
            restore_blend_sec: 3.0,
            interpolator_hz: 60.0,
        }
    }
}

impl TimingConfig {
    /// Tick length; zero when the rate cannot be represented
    pub fn interpolator_tick(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.interpolator_hz).unwrap_or(Duration::ZERO)
    }
}

/// Neural geometry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub point_count: usize,
    pub soma_radius: f32,
    pub dendrite_radius: f32,
    pub axon_radius: f32,
    /// Connection threshold at connectivity 0
    pub min_connection_distance: f32,
    /// Connection threshold at connectivity 1
    pub max_connection_distance: f32,
    /// Boutons closer than this get impulse paths
    pub impulse_path_distance: f32,
    /// Max midpoint displacement of an impulse path
    pub midpoint_jitter: f32,
    /// Connectivity drift that triggers a graph rebuild
    pub connectivity_epsilon: f32,
    /// Fixed RNG seed; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            point_count: 5000,
            soma_radius: 0.35,
            dendrite_radius: 0.08,
            axon_radius: 0.05,
            min_connection_distance: 0.3,
            max_connection_distance: 0.8,
            impulse_path_distance: 0.9,
            midpoint_jitter: 0.12,
            connectivity_epsilon: 0.02,
            seed: None,
        }
    }
}

impl GeometryConfig {
    /// Distance threshold for a connectivity value
    pub fn connection_threshold(&self, connectivity: f32) -> f32 {
        let c = connectivity.clamp(0.0, 1.0);
        self.min_connection_distance + c * (self.max_connection_distance - self.min_connection_distance)
    }
}

/// Animation director settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Length of the restore override
    pub restore_duration_sec: f32,
    /// Upper bound on simultaneously travelling impulses
    pub max_impulses: usize,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            restore_duration_sec: 4.5,
            max_impulses: 48,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub breathing: BreathingConfig,
    pub hand: HandConfig,
    pub stabilization: StabilizationConfig,
    pub timings: TimingConfig,
    pub geometry: GeometryConfig,
    pub animation: AnimationConfig,
}

impl EngineConfig {
    /// Load and validate a config from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to pretty JSON
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would stall, panic or divide by zero
    pub fn validate(&self) -> Result<(), EngineError> {
        let b = &self.breathing;
        if b.smoothing_window == 0 || b.calm_window == 0 {
            return Err(invalid("breathing windows must be non-zero"));
        }
        if !is_positive(b.reference_rms) {
            return Err(invalid("breathing.reference_rms must be positive"));
        }

        let h = &self.hand;
        if h.wrist_window < 2 {
            return Err(invalid("hand.wrist_window must be at least 2"));
        }
        if !is_positive(h.steady_variance_threshold) {
            return Err(invalid("hand.steady_variance_threshold must be positive"));
        }
        if h.open_palm_min_extended == 0 || h.open_palm_min_extended > 4 {
            return Err(invalid("hand.open_palm_min_extended must be 1-4"));
        }

        let s = &self.stabilization;
        if s.tick_ms == 0 || s.tick_ms as f64 > MAX_TIMING_SEC * 1000.0 {
            return Err(invalid("stabilization.tick_ms must be between 1 ms and one hour"));
        }
        if !(MIN_GAIN_SEC..=MAX_TIMING_SEC).contains(&s.gain_sec) {
            return Err(invalid("stabilization.gain_sec must be at least 1 ms"));
        }
        if !(0.0..=MAX_TIMING_SEC).contains(&s.decay_sec) {
            return Err(invalid("stabilization.decay_sec must be non-negative"));
        }
        if !is_positive(s.hold_sec) || s.hold_sec > MAX_TIMING_SEC {
            return Err(invalid("stabilization.hold_sec must be positive"));
        }

        let t = &self.timings;
        if !(t.interpolator_hz > 0.0 && t.interpolator_hz <= MAX_INTERPOLATOR_HZ)
            || t.interpolator_tick().is_zero()
        {
            return Err(invalid("timings.interpolator_hz must be in (0, 1000]"));
        }
        for (name, value) in [
            ("caption_sec", t.caption_sec),
            ("restored_sec", t.restored_sec),
            ("fade_sec", t.fade_sec),
            ("select_blend_sec", t.select_blend_sec as f64),
            ("restore_blend_sec", t.restore_blend_sec as f64),
        ] {
            if !(0.0..=MAX_TIMING_SEC).contains(&value) {
                return Err(invalid(&format!("timings.{name} must be between 0 and one hour")));
            }
        }

        let g = &self.geometry;
        if g.point_count < 8 {
            return Err(invalid("geometry.point_count must cover all 8 groups"));
        }
        if !is_positive(g.min_connection_distance as f64)
            || g.max_connection_distance.is_nan()
            || g.max_connection_distance < g.min_connection_distance
        {
            return Err(invalid("geometry connection distances are inconsistent"));
        }
        if !is_positive(g.impulse_path_distance as f64) {
            return Err(invalid("geometry.impulse_path_distance must be positive"));
        }

        let a = &self.animation;
        let restore_sec = a.restore_duration_sec as f64;
        if !is_positive(restore_sec) || restore_sec > MAX_TIMING_SEC {
            return Err(invalid("animation.restore_duration_sec must be positive"));
        }
        if a.max_impulses == 0 {
            return Err(invalid("animation.max_impulses must be non-zero"));
        }

        Ok(())
    }
}

/// Finite and strictly positive; NaN fails
fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(msg: &str) -> EngineError {
    EngineError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{"stabilization": {"hold_sec": 5.0}}"#).unwrap();
        assert_eq!(config.stabilization.hold_sec, 5.0);
        assert_eq!(config.stabilization.tick_ms, 100);
        assert_eq!(config.breathing, BreathingConfig::default());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = EngineConfig::default();
        config.geometry.seed = Some(42);
        let json = config.to_json().unwrap();
        let loaded = EngineConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_rejects_zero_windows() {
        let result = EngineConfig::from_json(r#"{"breathing": {"smoothing_window": 0}}"#);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    fn rejects(json: &str) -> bool {
        matches!(EngineConfig::from_json(json), Err(EngineError::InvalidConfig(_)))
    }

    #[test]
    fn test_rejects_zero_impulse_cap() {
        assert!(rejects(r#"{"animation": {"max_impulses": 0}}"#));
        assert!(!rejects(r#"{"animation": {"max_impulses": 1}}"#));
    }

    #[test]
    fn test_rejects_unrepresentable_timings() {
        assert!(rejects(r#"{"timings": {"caption_sec": 1e30}}"#));
        assert!(rejects(r#"{"timings": {"fade_sec": -0.5}}"#));
        assert!(rejects(r#"{"timings": {"select_blend_sec": 1e12}}"#));
        assert!(rejects(r#"{"timings": {"interpolator_hz": 1e10}}"#));
        assert!(rejects(r#"{"timings": {"interpolator_hz": 0.0}}"#));
        assert!(!rejects(r#"{"timings": {"caption_sec": 3600.0, "interpolator_hz": 1000.0}}"#));

        let mut config = EngineConfig::default();
        config.timings.interpolator_hz = f64::NAN;
        assert!(config.validate().is_err());
        config.timings.interpolator_hz = 1e10;
        assert_eq!(config.timings.interpolator_tick(), Duration::ZERO);
    }

    #[test]
    fn test_rejects_sub_millisecond_gain() {
        assert!(rejects(r#"{"stabilization": {"gain_sec": 0.0004}}"#));
        assert!(rejects(r#"{"stabilization": {"hold_sec": 1e30}}"#));
        assert!(!rejects(r#"{"stabilization": {"gain_sec": 0.001}}"#));
    }

    #[test]
    fn test_connection_threshold_mapping() {
        let geometry = GeometryConfig::default();
        assert!((geometry.connection_threshold(0.0) - 0.3).abs() < 1e-6);
        assert!((geometry.connection_threshold(1.0) - 0.8).abs() < 1e-6);
        assert!((geometry.connection_threshold(2.0) - 0.8).abs() < 1e-6);
    }
}
