//! Synheart Calm - On-device biofeedback engine for guided emotional regulation
//!
//! Calm turns live breathing audio and hand-pose landmarks into a calm/steady
//! signal, walks the user through a guided stabilization session, and drives
//! an emotion-specific neural visualization through smoothly interpolated
//! display parameters.
//!
//! ## Modules
//!
//! - **Signals**: breathing and hand classifiers behind latest-value inputs
//! - **Session**: phase machine, stabilization monitor, session store
//! - **Visualization**: emotion presets, parameter interpolation, neural
//!   geometry and the animation director
//! - **Engine**: [`CalmEngine`] wires everything onto one clock

pub mod animation;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod interpolator;
pub mod phase;
pub mod presets;
pub mod signals;
pub mod stabilization;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use animation::{EmotionAnimationDirector, RenderSurface, SceneFrame};
pub use config::EngineConfig;
pub use engine::CalmEngine;
pub use error::EngineError;
pub use geometry::{NeuralGeometry, NeuralGeometryBuilder};
pub use interpolator::ParameterInterpolator;
pub use phase::{PhaseAction, SessionPhaseMachine};
pub use presets::EmotionPresetTable;
pub use signals::{BreathingClassifier, HandFrame, HandSignalClassifier};
pub use stabilization::StabilizationMonitor;
pub use store::{SessionStore, SessionSummary};
pub use types::{
    BreathingQuality, Emotion, EmotionParameters, EmotionSession, EngineSnapshot, GestureLabel,
    InputState, SessionPhase,
};

/// Calm library version
pub const CALM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by diagnostics
pub const PRODUCER_NAME: &str = "synheart-calm";
