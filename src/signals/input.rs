//! Producer-side signal plumbing
//!
//! Classifiers run on whichever thread delivers frames. Each input keeps only
//! the latest reading (last write wins, no queueing), and a gate decides
//! whether frames are classified at all. Stopping an input never waits on a
//! producer: it flips the gate and resets the published value.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::signals::breathing::{BreathingClassifier, BreathingReading};
use crate::signals::hand::{HandFrame, HandReading, HandSignalClassifier};
use crate::types::InputState;

/// A per-frame classifier with a copyable latest reading
pub trait Classifier: Send + 'static {
    type Frame: ?Sized;
    type Reading: Copy + Default + Send + Sync + 'static;

    fn classify(&mut self, frame: &Self::Frame) -> Self::Reading;
    fn reset(&mut self);
}

impl Classifier for BreathingClassifier {
    type Frame = [f32];
    type Reading = BreathingReading;

    fn classify(&mut self, frame: &[f32]) -> BreathingReading {
        self.process_frame(frame)
    }

    fn reset(&mut self) {
        BreathingClassifier::reset(self)
    }
}

impl Classifier for HandSignalClassifier {
    type Frame = HandFrame;
    type Reading = HandReading;

    fn classify(&mut self, frame: &HandFrame) -> HandReading {
        self.process_frame(frame)
    }

    fn reset(&mut self) {
        HandSignalClassifier::reset(self)
    }
}

/// Latest-value slot shared between one producer and any number of readers
#[derive(Debug)]
pub struct Latest<T> {
    value: Arc<RwLock<T>>,
}

impl<T> Clone for Latest<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: Copy + Default> Default for Latest<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy> Latest<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
        }
    }

    pub fn publish(&self, value: T) {
        *self.value.write() = value;
    }

    pub fn get(&self) -> T {
        *self.value.read()
    }
}

struct Shared<C: Classifier> {
    name: &'static str,
    classifier: Mutex<C>,
    latest: Latest<C::Reading>,
    state: RwLock<InputState>,
    unavailable: AtomicBool,
    closed: AtomicBool,
}

/// Gated classifier input; cheap to clone and safe to share across threads
pub struct SignalInput<C: Classifier> {
    shared: Arc<Shared<C>>,
}

impl<C: Classifier> Clone for SignalInput<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Audio input feeding the breathing classifier
pub type BreathingInput = SignalInput<BreathingClassifier>;
/// Pose input feeding the hand classifier
pub type HandInput = SignalInput<HandSignalClassifier>;

impl<C: Classifier> SignalInput<C> {
    pub fn new(name: &'static str, classifier: C) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                classifier: Mutex::new(classifier),
                latest: Latest::default(),
                state: RwLock::new(InputState::Stopped),
                unavailable: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Classify a frame if the input is open; returns whether it was used
    pub fn push_frame(&self, frame: &C::Frame) -> bool {
        if self.is_unavailable() {
            return false;
        }
        let mut classifier = self.shared.classifier.lock();
        // Checked under the classifier lock so a concurrent stop cannot be overwritten
        if !self.state().accepts_frames() {
            return false;
        }
        let reading = classifier.classify(frame);
        self.shared.latest.publish(reading);
        true
    }

    /// Latest published reading
    pub fn reading(&self) -> C::Reading {
        self.shared.latest.get()
    }

    pub fn state(&self) -> InputState {
        *self.shared.state.read()
    }

    /// Open the gate; idempotent
    pub fn start(&self) {
        let mut state = self.shared.state.write();
        if *state != InputState::Running {
            info!(input = self.shared.name, "input started");
            *state = InputState::Running;
        }
    }

    /// Keep classifying while the host fades the input out
    pub fn fade(&self) {
        let mut state = self.shared.state.write();
        if *state == InputState::Running {
            debug!(input = self.shared.name, "input fading");
            *state = InputState::Fading;
        }
    }

    /// Close the gate and drop classifier history; idempotent, never blocks on producers
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.write();
            if *state == InputState::Stopped {
                return;
            }
            *state = InputState::Stopped;
        }
        self.shared.classifier.lock().reset();
        self.shared.latest.publish(C::Reading::default());
        info!(input = self.shared.name, "input stopped");
    }

    /// Freeze at the default reading; used when the hardware cannot be acquired
    pub fn mark_unavailable(&self, reason: &EngineError) {
        if !self.shared.unavailable.swap(true, Ordering::SeqCst) {
            warn!(input = self.shared.name, %reason, "signal unavailable, holding default reading");
        }
        self.shared.latest.publish(C::Reading::default());
    }

    pub fn is_unavailable(&self) -> bool {
        self.shared.unavailable.load(Ordering::SeqCst)
    }

    /// Ask attached workers to exit after their current frame
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

/// Hardware format reported by an audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(EngineError::SignalUnavailable(format!(
                "invalid hardware format: {} Hz, {} channels",
                self.sample_rate, self.channels
            )));
        }
        Ok(())
    }
}

/// Microphone-like producer of fixed-size sample buffers
pub trait AudioSource: Send {
    /// Acquire the device; permission or format failures are reported here
    fn open(&mut self) -> Result<AudioFormat, EngineError>;

    /// Next buffer, blocking until one arrives; `None` ends the stream
    fn next_frame(&mut self) -> Option<Vec<f32>>;
}

/// Camera/pose producer of per-frame hand landmarks
pub trait PoseSource: Send {
    /// Next frame, blocking until one arrives; `None` ends the stream
    fn next_frame(&mut self) -> Option<HandFrame>;
}

/// Drive the breathing input from an audio source on a dedicated thread.
///
/// A source that fails to open leaves the input frozen at its default
/// reading; the rest of the engine keeps running.
pub fn spawn_audio_worker<S>(mut source: S, input: BreathingInput) -> JoinHandle<()>
where
    S: AudioSource + 'static,
{
    std::thread::spawn(move || {
        let format = match source.open().and_then(|f| f.validate().map(|_| f)) {
            Ok(format) => format,
            Err(e) => {
                input.mark_unavailable(&e);
                return;
            }
        };
        debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "audio worker running"
        );
        while !input.is_closed() {
            match source.next_frame() {
                Some(frame) => {
                    input.push_frame(&frame);
                }
                None => break,
            }
        }
        debug!("audio worker finished");
    })
}

/// Drive the hand input from a pose source on a dedicated thread
pub fn spawn_pose_worker<S>(mut source: S, input: HandInput) -> JoinHandle<()>
where
    S: PoseSource + 'static,
{
    std::thread::spawn(move || {
        while !input.is_closed() {
            match source.next_frame() {
                Some(frame) => {
                    input.push_frame(&frame);
                }
                None => break,
            }
        }
        debug!("pose worker finished");
    })
}
