//! Error types for Synheart Calm

use thiserror::Error;

/// Errors that can occur inside the engine and its collaborators
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Signal unavailable: {0}")]
    SignalUnavailable(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown emotion: {0}")]
    UnknownEmotion(String),
}
