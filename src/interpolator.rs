//! Parameter interpolation
//!
//! Produces the live display parameters by blending a source and destination
//! preset on a fixed tick. Retargeting mid-blend snapshots the current live
//! value as the new source, so the stream never jumps.

use tracing::debug;

use crate::types::EmotionParameters;

/// Snap threshold for accumulated tick error near the end of a blend
const BLEND_EPSILON: f64 = 1e-6;

/// Fixed-tick blender between two parameter sets
#[derive(Debug, Clone)]
pub struct ParameterInterpolator {
    source: EmotionParameters,
    destination: EmotionParameters,
    display: EmotionParameters,
    /// Seconds per tick
    tick_sec: f64,
    /// Transition length in seconds
    duration_sec: f64,
    /// Ticks taken since the last retarget
    ticks: u64,
    blend: f64,
}

impl ParameterInterpolator {
    /// Start idle at `initial`
    pub fn new(initial: EmotionParameters, tick_sec: f64) -> Self {
        Self {
            source: initial,
            destination: initial,
            display: initial,
            tick_sec,
            duration_sec: 0.0,
            ticks: 0,
            blend: 1.0,
        }
    }

    /// Blend from the current live value towards `target` over `duration_sec`
    pub fn retarget(&mut self, target: EmotionParameters, duration_sec: f64) {
        self.source = self.display;
        self.destination = target;
        self.duration_sec = duration_sec.max(0.0);
        self.ticks = 0;
        self.blend = 0.0;
        if self.duration_sec <= 0.0 {
            self.finish();
        }
        debug!(duration_sec = self.duration_sec, "parameter retarget");
    }

    /// Advance one fixed tick; returns whether the display changed
    pub fn tick(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }
        self.ticks += 1;
        // Recomputed from the tick count so error does not accumulate
        let t = (self.ticks as f64 * self.tick_sec) / self.duration_sec;
        if t >= 1.0 - BLEND_EPSILON {
            self.finish();
        } else {
            self.blend = t;
            self.display = self.source.lerp(&self.destination, t as f32);
        }
        true
    }

    fn finish(&mut self) {
        self.blend = 1.0;
        self.display = self.destination;
    }

    /// Idle once the blend reaches 1
    pub fn is_idle(&self) -> bool {
        self.blend >= 1.0
    }

    pub fn display(&self) -> EmotionParameters {
        self.display
    }

    pub fn destination(&self) -> EmotionParameters {
        self.destination
    }

    pub fn source(&self) -> EmotionParameters {
        self.source
    }

    pub fn blend(&self) -> f64 {
        self.blend
    }

    pub fn tick_sec(&self) -> f64 {
        self.tick_sec
    }
}
