//! Emotion preset table
//!
//! One fixed parameter tuple per emotion. The table is built once and only
//! ever read and interpolated.

use crate::types::{Emotion, EmotionParameters, Rgb};

/// Read-only lookup from emotion to its visualization preset
#[derive(Debug, Clone)]
pub struct EmotionPresetTable {
    presets: [EmotionParameters; 6],
}

impl Default for EmotionPresetTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionPresetTable {
    pub fn new() -> Self {
        Self {
            presets: Emotion::ALL.map(builtin_preset),
        }
    }

    /// Preset for an emotion
    pub fn preset(&self, emotion: Emotion) -> EmotionParameters {
        self.presets[emotion.index()]
    }

    /// All presets in table order
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, &EmotionParameters)> {
        Emotion::ALL.into_iter().zip(self.presets.iter())
    }
}

/// Built-in preset values
pub fn builtin_preset(emotion: Emotion) -> EmotionParameters {
    match emotion {
        Emotion::Calm => EmotionParameters {
            primary_color: Rgb::new(0.35, 0.65, 0.95),
            secondary_color: Rgb::new(0.55, 0.85, 1.0),
            turbulence: 0.1,
            pulse_period: 4.0,
            connectivity: 0.6,
            particle_velocity: 0.2,
            birth_rate: 0.3,
            connection_opacity: 0.5,
            rotation_period: 60.0,
            glow_intensity: 0.5,
        },
        Emotion::Anxiety => EmotionParameters {
            primary_color: Rgb::new(0.95, 0.55, 0.15),
            secondary_color: Rgb::new(1.0, 0.9, 0.4),
            turbulence: 0.85,
            pulse_period: 0.6,
            connectivity: 0.9,
            particle_velocity: 0.9,
            birth_rate: 0.9,
            connection_opacity: 0.8,
            rotation_period: 12.0,
            glow_intensity: 0.85,
        },
        Emotion::Sadness => EmotionParameters {
            primary_color: Rgb::new(0.25, 0.3, 0.6),
            secondary_color: Rgb::new(0.4, 0.45, 0.7),
            turbulence: 0.05,
            pulse_period: 7.0,
            connectivity: 0.25,
            particle_velocity: 0.08,
            birth_rate: 0.1,
            connection_opacity: 0.2,
            rotation_period: 120.0,
            glow_intensity: 0.2,
        },
        Emotion::Love => EmotionParameters {
            primary_color: Rgb::new(0.95, 0.35, 0.6),
            secondary_color: Rgb::new(1.0, 0.6, 0.75),
            turbulence: 0.3,
            pulse_period: 1.0,
            connectivity: 0.75,
            particle_velocity: 0.4,
            birth_rate: 0.5,
            connection_opacity: 0.65,
            rotation_period: 40.0,
            glow_intensity: 0.7,
        },
        Emotion::Happy => EmotionParameters {
            primary_color: Rgb::new(1.0, 0.8, 0.25),
            secondary_color: Rgb::new(1.0, 0.95, 0.6),
            turbulence: 0.45,
            pulse_period: 0.8,
            connectivity: 0.8,
            particle_velocity: 0.6,
            birth_rate: 0.7,
            connection_opacity: 0.7,
            rotation_period: 25.0,
            glow_intensity: 0.8,
        },
        Emotion::Angry => EmotionParameters {
            primary_color: Rgb::new(0.7, 0.05, 0.05),
            secondary_color: Rgb::new(1.0, 0.45, 0.1),
            turbulence: 0.7,
            pulse_period: 0.5,
            connectivity: 0.85,
            particle_velocity: 0.8,
            birth_rate: 0.8,
            connection_opacity: 0.75,
            rotation_period: 15.0,
            glow_intensity: 0.9,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_is_valid() {
        let table = EmotionPresetTable::new();
        for (emotion, preset) in table.iter() {
            assert!(preset.validate().is_ok(), "{emotion} preset invalid");
        }
    }

    #[test]
    fn test_one_preset_per_emotion() {
        let table = EmotionPresetTable::new();
        assert_eq!(table.iter().count(), 6);
        for emotion in Emotion::ALL {
            assert_eq!(table.preset(emotion), builtin_preset(emotion));
        }
    }

    #[test]
    fn test_presets_are_distinct() {
        let table = EmotionPresetTable::new();
        for a in Emotion::ALL {
            for b in Emotion::ALL {
                if a != b {
                    assert_ne!(table.preset(a), table.preset(b));
                }
            }
        }
    }

    #[test]
    fn test_agitated_emotions_are_more_turbulent_than_calm() {
        let table = EmotionPresetTable::new();
        let calm = table.preset(Emotion::Calm).turbulence;
        assert!(table.preset(Emotion::Anxiety).turbulence > calm);
        assert!(table.preset(Emotion::Angry).turbulence > calm);
        assert!(table.preset(Emotion::Sadness).turbulence < calm);
    }
}
