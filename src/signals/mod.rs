//! Biosignal classification
//!
//! Two independent classifiers turn live sensor frames into scalar features:
//!
//! - **Breathing**: audio frames → smoothed intensity + calm flag
//! - **Hand**: pose landmarks → steadiness flag + openness gesture
//!
//! Frames are classified on the producer's thread and only the latest reading
//! is kept; the engine samples those readings on its own clock.

pub mod breathing;
pub mod hand;
pub mod input;

pub use breathing::{BreathingClassifier, BreathingReading};
pub use hand::{HandFrame, HandJoint, HandReading, HandSignalClassifier, Landmark};
pub use input::{
    spawn_audio_worker, spawn_pose_worker, AudioFormat, AudioSource, BreathingInput, Classifier,
    HandInput, Latest, PoseSource, SignalInput,
};
