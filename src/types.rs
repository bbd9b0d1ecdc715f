//! Core types for the Synheart Calm engine
//!
//! This module defines the values that flow between the classifiers, the
//! session machinery, and the visualization: emotions and their parameter
//! tuples, session phases, persisted session records, and the observable
//! snapshot handed to the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Emotion selected by the user; key into the preset table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Calm,
    Anxiety,
    Sadness,
    Love,
    Happy,
    Angry,
}

impl Emotion {
    /// Every emotion, in table order
    pub const ALL: [Emotion; 6] = [
        Emotion::Calm,
        Emotion::Anxiety,
        Emotion::Sadness,
        Emotion::Love,
        Emotion::Happy,
        Emotion::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Calm => "calm",
            Emotion::Anxiety => "anxiety",
            Emotion::Sadness => "sadness",
            Emotion::Love => "love",
            Emotion::Happy => "happy",
            Emotion::Angry => "angry",
        }
    }

    /// Position in [`Emotion::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Emotion::Calm => 0,
            Emotion::Anxiety => 1,
            Emotion::Sadness => 2,
            Emotion::Love => 3,
            Emotion::Happy => 4,
            Emotion::Angry => 5,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == needle)
            .ok_or_else(|| EngineError::UnknownEmotion(s.to_string()))
    }
}

/// Linear blend that is exact at both ends and never leaves `[min(a, b), max(a, b)]`
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    if t <= 0.0 || a == b {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    let value = a * (1.0 - t) + b * t;
    value.clamp(a.min(b), a.max(b))
}

/// Normalized RGB color, each channel in 0-1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(level: f32) -> Self {
        Self::new(level, level, level)
    }

    pub fn lerp(&self, other: &Rgb, t: f32) -> Rgb {
        Rgb::new(
            lerp(self.r, other.r, t),
            lerp(self.g, other.g, t),
            lerp(self.b, other.b, t),
        )
    }

    /// Multiply every channel; the result may exceed 1.0 (HDR emission)
    pub fn scaled(&self, factor: f32) -> Rgb {
        Rgb::new(self.r * factor, self.g * factor, self.b * factor)
    }

    /// Rec. 709 relative luminance
    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    fn is_normalized(&self) -> bool {
        [self.r, self.g, self.b]
            .iter()
            .all(|c| c.is_finite() && (0.0..=1.0).contains(c))
    }
}

/// Shortest pulse period accepted by [`EmotionParameters::validate`] (seconds)
pub const MIN_PULSE_PERIOD_SEC: f32 = 0.1;
/// Longest pulse period accepted by [`EmotionParameters::validate`] (seconds)
pub const MAX_PULSE_PERIOD_SEC: f32 = 30.0;
/// Shortest rotation period accepted by [`EmotionParameters::validate`] (seconds)
pub const MIN_ROTATION_PERIOD_SEC: f32 = 1.0;
/// Longest rotation period accepted by [`EmotionParameters::validate`] (seconds)
pub const MAX_ROTATION_PERIOD_SEC: f32 = 600.0;

/// Full description of the visualization's appearance and behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionParameters {
    /// Primary hue
    pub primary_color: Rgb,
    /// Secondary hue used for blends and flares
    pub secondary_color: Rgb,
    /// Displacement magnitude (0-1)
    pub turbulence: f32,
    /// Pulse period (seconds)
    pub pulse_period: f32,
    /// Connection-graph density (0-1)
    pub connectivity: f32,
    /// Particle velocity (0-1)
    pub particle_velocity: f32,
    /// Particle birth rate (0-1)
    pub birth_rate: f32,
    /// Connection line opacity (0-1)
    pub connection_opacity: f32,
    /// Time for one full revolution (seconds)
    pub rotation_period: f32,
    /// Baseline emission brightness (0-1)
    pub glow_intensity: f32,
}

impl EmotionParameters {
    /// Component-wise linear blend from `self` (t = 0) to `other` (t = 1)
    pub fn lerp(&self, other: &EmotionParameters, t: f32) -> EmotionParameters {
        let t = t.clamp(0.0, 1.0);
        EmotionParameters {
            primary_color: self.primary_color.lerp(&other.primary_color, t),
            secondary_color: self.secondary_color.lerp(&other.secondary_color, t),
            turbulence: lerp(self.turbulence, other.turbulence, t),
            pulse_period: lerp(self.pulse_period, other.pulse_period, t),
            connectivity: lerp(self.connectivity, other.connectivity, t),
            particle_velocity: lerp(self.particle_velocity, other.particle_velocity, t),
            birth_rate: lerp(self.birth_rate, other.birth_rate, t),
            connection_opacity: lerp(self.connection_opacity, other.connection_opacity, t),
            rotation_period: lerp(self.rotation_period, other.rotation_period, t),
            glow_intensity: lerp(self.glow_intensity, other.glow_intensity, t),
        }
    }

    /// Scalar fields in declaration order (colors excluded)
    pub fn scalars(&self) -> [f32; 8] {
        [
            self.turbulence,
            self.pulse_period,
            self.connectivity,
            self.particle_velocity,
            self.birth_rate,
            self.connection_opacity,
            self.rotation_period,
            self.glow_intensity,
        ]
    }

    /// Check every component against its documented range
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.primary_color.is_normalized() {
            return Err(EngineError::InvalidConfig(
                "primary_color out of 0-1".to_string(),
            ));
        }
        if !self.secondary_color.is_normalized() {
            return Err(EngineError::InvalidConfig(
                "secondary_color out of 0-1".to_string(),
            ));
        }

        let unit_fields = [
            ("turbulence", self.turbulence),
            ("connectivity", self.connectivity),
            ("particle_velocity", self.particle_velocity),
            ("birth_rate", self.birth_rate),
            ("connection_opacity", self.connection_opacity),
            ("glow_intensity", self.glow_intensity),
        ];
        for (name, value) in unit_fields {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} = {value} out of 0-1"
                )));
            }
        }

        if !(MIN_PULSE_PERIOD_SEC..=MAX_PULSE_PERIOD_SEC).contains(&self.pulse_period) {
            return Err(EngineError::InvalidConfig(format!(
                "pulse_period = {} out of range",
                self.pulse_period
            )));
        }
        if !(MIN_ROTATION_PERIOD_SEC..=MAX_ROTATION_PERIOD_SEC).contains(&self.rotation_period) {
            return Err(EngineError::InvalidConfig(format!(
                "rotation_period = {} out of range",
                self.rotation_period
            )));
        }

        Ok(())
    }
}

/// State of the guided flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Hidden,
    Caption,
    LogPrompt,
    RestoreButton,
    Stabilizing,
    Restored,
    CameraFading,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Hidden => "hidden",
            SessionPhase::Caption => "caption",
            SessionPhase::LogPrompt => "logPrompt",
            SessionPhase::RestoreButton => "restoreButton",
            SessionPhase::Stabilizing => "stabilizing",
            SessionPhase::Restored => "restored",
            SessionPhase::CameraFading => "cameraFading",
        }
    }

    /// Whether the restore animation owns the scene in this phase
    pub fn is_restoring(&self) -> bool {
        matches!(self, SessionPhase::Restored | SessionPhase::CameraFading)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breathing quality captured when a session record is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreathingQuality {
    Calm,
    Elevated,
}

impl BreathingQuality {
    pub fn from_calm_flag(calm: bool) -> Self {
        if calm {
            BreathingQuality::Calm
        } else {
            BreathingQuality::Elevated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BreathingQuality::Calm => "Calm",
            BreathingQuality::Elevated => "Elevated",
        }
    }
}

/// Openness gesture read from the hand landmarks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    #[default]
    NoHand,
    OpenPalm,
    ClosedFist,
    Indeterminate,
}

impl GestureLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::NoHand => "no_hand",
            GestureLabel::OpenPalm => "open_palm",
            GestureLabel::ClosedFist => "closed_fist",
            GestureLabel::Indeterminate => "indeterminate",
        }
    }
}

/// Persisted record of one completed stabilization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionSession {
    /// Unique record identifier
    pub id: String,
    pub emotion: Emotion,
    /// When stabilization completed
    pub timestamp: DateTime<Utc>,
    /// Seconds from "restore balance" to the stabilized event
    pub stabilization_duration: f64,
    pub breathing_quality: BreathingQuality,
    /// The user's answer to the log prompt
    pub is_logged: bool,
}

/// State of a classifier input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputState {
    #[default]
    Stopped,
    Running,
    Fading,
}

impl InputState {
    /// Whether frames pushed in this state are classified
    pub fn accepts_frames(&self) -> bool {
        !matches!(self, InputState::Stopped)
    }
}

/// Observable engine state consumed by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub phase: SessionPhase,
    /// Emotion label currently shown (None before the first selection or after clear)
    pub active_emotion: Option<Emotion>,
    /// Live display parameters
    pub parameters: EmotionParameters,
    /// Blend factor of the running transition (0-1)
    pub blend: f32,
    /// Stabilization progress (0-1)
    pub stabilization_progress: f64,
    pub gesture: GestureLabel,
    pub hand_steady: bool,
    /// Smoothed breathing intensity (0-1)
    pub breathing_intensity: f64,
    pub breathing_calm: bool,
    pub breathing_input: InputState,
    pub hand_input: InputState,
    /// Records in the session store
    pub session_count: usize,
    /// Engine clock (seconds since start)
    pub clock_sec: f64,
}
