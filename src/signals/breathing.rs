//! Breathing calmness classification
//!
//! Audio frames are reduced to an RMS amplitude, normalized against a fixed
//! reference, and smoothed over a short window. A longer window over the
//! smoothed intensity decides whether breathing is calm: low and even.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::BreathingConfig;

/// Latest output of the breathing classifier
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BreathingReading {
    /// Smoothed, normalized intensity (0-1)
    pub intensity: f64,
    /// Low mean and low variance over the calm window
    pub calm: bool,
}

/// Classifier turning raw audio frames into a [`BreathingReading`]
#[derive(Debug, Clone)]
pub struct BreathingClassifier {
    config: BreathingConfig,
    /// Normalized RMS of the most recent frames
    samples: VecDeque<f64>,
    /// Smoothed intensities for calm detection
    intensities: VecDeque<f64>,
    reading: BreathingReading,
}

impl Default for BreathingClassifier {
    fn default() -> Self {
        Self::new(BreathingConfig::default())
    }
}

impl BreathingClassifier {
    pub fn new(config: BreathingConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.smoothing_window + 1),
            intensities: VecDeque::with_capacity(config.calm_window + 1),
            config,
            reading: BreathingReading::default(),
        }
    }

    /// Classify one audio frame and return the updated reading
    pub fn process_frame(&mut self, frame: &[f32]) -> BreathingReading {
        let level = normalize_rms(compute_rms(frame), self.config.reference_rms);

        push_bounded(&mut self.samples, level, self.config.smoothing_window);
        let intensity = mean(&self.samples);

        push_bounded(&mut self.intensities, intensity, self.config.calm_window);
        let calm = if self.intensities.len() >= self.config.calm_window {
            let m = mean(&self.intensities);
            let v = variance(&self.intensities, m);
            m < self.config.calm_mean_threshold && v < self.config.calm_variance_threshold
        } else {
            false
        };

        self.reading = BreathingReading { intensity, calm };
        self.reading
    }

    pub fn reading(&self) -> BreathingReading {
        self.reading
    }

    /// Whether the calm window has filled at least once since the last reset
    pub fn is_warmed_up(&self) -> bool {
        self.intensities.len() >= self.config.calm_window
    }

    /// Drop all history and return to intensity 0 / not calm
    pub fn reset(&mut self) {
        self.samples.clear();
        self.intensities.clear();
        self.reading = BreathingReading::default();
    }
}

/// Root-mean-square amplitude of a frame; empty frames are silent
fn compute_rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame
        .iter()
        .filter(|s| s.is_finite())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    (sum_sq / frame.len() as f64).sqrt()
}

/// Scale RMS by the reference; anything louder than the reference is 1.0
fn normalize_rms(rms: f64, reference: f64) -> f64 {
    (rms / reference).clamp(0.0, 1.0)
}

fn push_bounded(queue: &mut VecDeque<f64>, value: f64, capacity: usize) {
    queue.push_back(value);
    while queue.len() > capacity {
        queue.pop_front();
    }
}

fn mean(queue: &VecDeque<f64>) -> f64 {
    if queue.is_empty() {
        return 0.0;
    }
    queue.iter().sum::<f64>() / queue.len() as f64
}

/// Population variance around a precomputed mean
fn variance(queue: &VecDeque<f64>, mean: f64) -> f64 {
    if queue.is_empty() {
        return 0.0;
    }
    queue.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / queue.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(amplitude: f32, len: usize) -> Vec<f32> {
        // Square wave: RMS equals the amplitude exactly
        (0..len)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_rms() {
        assert_eq!(compute_rms(&[]), 0.0);
        assert!((compute_rms(&tone(0.05, 512)) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_normalization_clamps_loud_frames() {
        assert_eq!(normalize_rms(0.5, 0.1), 1.0);
        assert!((normalize_rms(0.05, 0.1) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_intensity_is_smoothed_mean() {
        let mut classifier = BreathingClassifier::default();
        classifier.process_frame(&tone(0.1, 256)); // 1.0
        let reading = classifier.process_frame(&tone(0.0, 256)); // 0.0
        assert!((reading.intensity - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_smoothing_window_evicts_oldest() {
        let mut classifier = BreathingClassifier::default();
        classifier.process_frame(&tone(0.1, 256));
        for _ in 0..BreathingConfig::default().smoothing_window {
            classifier.process_frame(&tone(0.0, 256));
        }
        assert!(classifier.reading().intensity.abs() < 1e-9);
    }

    #[test]
    fn test_calm_requires_full_window() {
        let mut classifier = BreathingClassifier::default();
        for _ in 0..59 {
            assert!(!classifier.process_frame(&tone(0.01, 256)).calm);
        }
        let reading = classifier.process_frame(&tone(0.01, 256));
        assert!(classifier.is_warmed_up());
        assert!(reading.calm);
    }

    #[test]
    fn test_loud_breathing_is_not_calm() {
        let mut classifier = BreathingClassifier::default();
        for _ in 0..100 {
            classifier.process_frame(&tone(0.08, 256));
        }
        let reading = classifier.reading();
        assert!(reading.intensity > 0.3);
        assert!(!reading.calm);
    }

    #[test]
    fn test_erratic_breathing_is_not_calm() {
        // Bursts alternate between silence and full scale every 20 frames,
        // so the smoothed intensity sweeps the whole range.
        let mut classifier = BreathingClassifier::default();
        for i in 0..120 {
            let amp = if (i / 20) % 2 == 0 { 0.0 } else { 0.1 };
            classifier.process_frame(&tone(amp, 256));
        }
        assert!(!classifier.reading().calm);
    }

    #[test]
    fn test_reset() {
        let mut classifier = BreathingClassifier::default();
        for _ in 0..60 {
            classifier.process_frame(&tone(0.0, 128));
        }
        assert!(classifier.reading().calm);
        classifier.reset();
        assert_eq!(classifier.reading(), BreathingReading::default());
        assert!(!classifier.is_warmed_up());
    }
}
