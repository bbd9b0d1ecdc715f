//! Per-emotion group behaviors
//!
//! Every behavior is a pure function of elapsed time, group index and the
//! live display parameters. Amplitudes scale with turbulence, brightness with
//! glow and timing with the pulse period, so blends between presets animate
//! smoothly.

use glam::Vec3;
use serde::Serialize;
use std::f32::consts::{PI, TAU};

use crate::geometry::GROUP_COUNT;
use crate::types::{Emotion, EmotionParameters, Rgb};

/// Per-group transform applied on top of the static cloud
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupTransform {
    pub offset: Vec3,
    pub scale: f32,
    pub opacity: f32,
    /// Emission color; may exceed 1.0 for overshoot
    pub emission: Rgb,
}

impl GroupTransform {
    pub const IDENTITY: GroupTransform = GroupTransform {
        offset: Vec3::ZERO,
        scale: 1.0,
        opacity: 1.0,
        emission: Rgb::WHITE,
    };
}

impl Default for GroupTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Appearance of the connection lines
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConnectionStyle {
    pub opacity: f32,
    pub color: Rgb,
}

/// Groups 6 and 7 keep drifting while sadness dims the rest
const SADNESS_DRIFT_GROUPS: std::ops::Range<usize> = 6..GROUP_COUNT;

/// Transform of one group for an emotion at time `t` (seconds)
pub fn group_transform(
    emotion: Emotion,
    group: usize,
    t: f32,
    params: &EmotionParameters,
) -> GroupTransform {
    match emotion {
        Emotion::Calm => calm(group, t, params),
        Emotion::Anxiety => anxiety(group, t, params),
        Emotion::Sadness => sadness(group, t, params),
        Emotion::Love => love(group, t, params),
        Emotion::Happy => happy(group, t, params),
        Emotion::Angry => angry(group, t, params),
    }
}

/// Transforms for all groups
pub fn group_transforms(
    emotion: Emotion,
    t: f32,
    params: &EmotionParameters,
) -> [GroupTransform; GROUP_COUNT] {
    std::array::from_fn(|g| group_transform(emotion, g, t, params))
}

/// Connection line style following the mean group brightness
pub fn connection_style(
    groups: &[GroupTransform; GROUP_COUNT],
    params: &EmotionParameters,
) -> ConnectionStyle {
    let mean_opacity = groups.iter().map(|g| g.opacity).sum::<f32>() / GROUP_COUNT as f32;
    ConnectionStyle {
        opacity: (params.connection_opacity * mean_opacity).clamp(0.0, 1.0),
        color: params.primary_color.lerp(&params.secondary_color, 0.5),
    }
}

/// Whole-structure rotation in radians
pub fn rotation(t: f32, params: &EmotionParameters) -> f32 {
    (t / params.rotation_period.max(f32::EPSILON) * TAU).rem_euclid(TAU)
}

fn calm(group: usize, t: f32, p: &EmotionParameters) -> GroupTransform {
    let phase = group as f32 * 0.15;
    let s = (TAU * t / p.pulse_period + phase).sin();
    let amplitude = 0.02 + p.turbulence * 0.05;
    GroupTransform {
        offset: Vec3::new(0.0, s * amplitude, 0.0),
        scale: 1.0 + 0.03 * s,
        opacity: 0.7 + 0.1 * s,
        emission: p
            .primary_color
            .lerp(&p.secondary_color, 0.5 + 0.5 * s)
            .scaled(p.glow_intensity * (0.9 + 0.1 * s)),
    }
}

fn anxiety(group: usize, t: f32, p: &EmotionParameters) -> GroupTransform {
    let g = group as f32;
    let (f1, f2, f3) = (3.0 + g * 0.7, 7.3 + g * 1.1, 13.1 + g * 0.37);
    let amplitude = p.turbulence * 0.08;
    let offset = Vec3::new(
        (f1 * t).sin() + 0.5 * (f2 * t + g).sin(),
        (f2 * t).cos() + 0.3 * (f3 * t).sin(),
        (f3 * t + g * 0.5).sin() + 0.4 * (f1 * t * 1.3).cos(),
    ) * amplitude;

    // Independent firing: each group rolls a new value every 80 ms
    let step = (t / 0.08).floor() as i64;
    let roll = hash_noise(group, step);
    let opacity = if roll > 0.8 { 1.0 } else { 0.45 + 0.25 * roll };
    let overshoot = if roll > 0.93 { 0.8 } else { 0.2 * roll };
    let base = if roll > 0.93 {
        p.primary_color.lerp(&Rgb::WHITE, 0.7)
    } else {
        p.primary_color.lerp(&p.secondary_color, roll)
    };

    GroupTransform {
        offset,
        scale: 1.0 + 0.04 * (f2 * t).sin(),
        opacity,
        emission: base.scaled(p.glow_intensity * (1.0 + overshoot)),
    }
}

fn sadness(group: usize, t: f32, p: &EmotionParameters) -> GroupTransform {
    let droop = 0.94 - 0.02 * (TAU * t / (p.pulse_period * 2.0)).sin().abs();
    if SADNESS_DRIFT_GROUPS.contains(&group) {
        let drift = (TAU * t / (p.pulse_period * 2.0) + group as f32).sin();
        GroupTransform {
            offset: Vec3::new(drift * 0.02, -0.02 + drift * 0.01, 0.0),
            scale: droop,
            opacity: 0.35,
            emission: p.primary_color.scaled(p.glow_intensity * 0.6),
        }
    } else {
        GroupTransform {
            offset: Vec3::new(0.0, -0.03, 0.0),
            scale: droop,
            opacity: 0.15,
            emission: p.primary_color.scaled(p.glow_intensity * 0.4),
        }
    }
}

fn love(group: usize, t: f32, p: &EmotionParameters) -> GroupTransform {
    // Cascade: each group trails the previous by an eighth of a beat
    let phase = (t / p.pulse_period - group as f32 / GROUP_COUNT as f32).rem_euclid(1.0);
    let beat = heartbeat(phase);
    let mix = 0.5 + 0.5 * (TAU * t / (p.pulse_period * 4.0)).sin();
    GroupTransform {
        offset: Vec3::new(0.0, 0.01 * beat, 0.0),
        scale: 1.0 + 0.08 * beat,
        opacity: 0.6 + 0.35 * beat,
        emission: p
            .primary_color
            .lerp(&p.secondary_color, mix)
            .scaled(p.glow_intensity * (0.8 + 0.4 * beat)),
    }
}

fn happy(group: usize, t: f32, p: &EmotionParameters) -> GroupTransform {
    let phase = TAU * t / p.pulse_period - group as f32 * 0.4;
    let bounce = phase.sin().abs();
    let amplitude = 0.02 + p.turbulence * 0.06;
    GroupTransform {
        // Upward bias: y never drops below half the amplitude
        offset: Vec3::new(0.3 * amplitude * (phase * 0.5).sin(), amplitude * (0.5 + bounce), 0.0),
        scale: 1.0 + 0.06 * bounce,
        opacity: 0.75 + 0.2 * bounce,
        emission: p
            .primary_color
            .lerp(&p.secondary_color, bounce)
            .scaled(p.glow_intensity * (1.0 + 0.2 * bounce)),
    }
}

fn angry(group: usize, t: f32, p: &EmotionParameters) -> GroupTransform {
    let phase = (t / p.pulse_period + group as f32 * 0.05).rem_euclid(1.0);
    let envelope = attack_release(phase);
    let wave = (TAU * phase).sin();
    // Sharpened, non-sinusoidal strike
    let strike = wave.signum() * wave.abs().powf(0.3);
    let angle = group as f32 * TAU / GROUP_COUNT as f32;
    let direction = Vec3::new(angle.cos(), angle.sin(), 0.0);
    GroupTransform {
        offset: direction * (p.turbulence * 0.12 * strike),
        scale: 1.0 + 0.1 * envelope,
        opacity: 0.6 + 0.4 * envelope,
        emission: p
            .primary_color
            .lerp(&p.secondary_color, envelope)
            .scaled(p.glow_intensity * (0.7 + 0.6 * envelope)),
    }
}

/// Lub-dub: two gaussian bumps per beat, 0-1
pub fn heartbeat(phase: f32) -> f32 {
    let bump = |center: f32, width: f32| (-((phase - center) / width).powi(2)).exp();
    (bump(0.05, 0.05) + 0.6 * bump(0.25, 0.05)).min(1.0)
}

/// Linear attack over the first 8% of the cycle, exponential release after
pub fn attack_release(phase: f32) -> f32 {
    const ATTACK: f32 = 0.08;
    if phase < ATTACK {
        phase / ATTACK
    } else {
        (-(phase - ATTACK) * 6.0).exp()
    }
}

/// Deterministic pseudo-random value in [0, 1) per group and time step
pub fn hash_noise(group: usize, step: i64) -> f32 {
    let mut x = (group as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (step as u64);
    x ^= x >> 33;
    x = x.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    x ^= x >> 33;
    x = x.wrapping_mul(0xC4CE_B9FE_1A85_EC53);
    x ^= x >> 33;
    (x >> 40) as f32 / (1u64 << 24) as f32
}

/// Smooth 0-1 ease
pub fn smoothstep(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Half-sine bump: 0 at both ends, 1 in the middle
pub fn bump(x: f32) -> f32 {
    (PI * x.clamp(0.0, 1.0)).sin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::builtin_preset;

    fn samples(emotion: Emotion) -> Vec<[GroupTransform; GROUP_COUNT]> {
        let params = builtin_preset(emotion);
        (0..600)
            .map(|i| group_transforms(emotion, i as f32 / 60.0, &params))
            .collect()
    }

    fn max_offset(frames: &[[GroupTransform; GROUP_COUNT]], group: usize) -> f32 {
        frames
            .iter()
            .map(|f| f[group].offset.length())
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_calm_groups_move_together() {
        let frames = samples(Emotion::Calm);
        for frame in &frames {
            let ys: Vec<f32> = frame.iter().map(|g| g.offset.y).collect();
            let spread = ys.iter().cloned().fold(f32::MIN, f32::max)
                - ys.iter().cloned().fold(f32::MAX, f32::min);
            assert!(spread < 0.05);
        }
    }

    #[test]
    fn test_anxiety_overshoots_brightness() {
        let params = builtin_preset(Emotion::Anxiety);
        let frames = samples(Emotion::Anxiety);
        let peak = frames
            .iter()
            .flat_map(|f| f.iter())
            .map(|g| g.emission.r.max(g.emission.g).max(g.emission.b))
            .fold(0.0, f32::max);
        assert!(peak > params.glow_intensity);
        assert!(peak > 1.0);
    }

    #[test]
    fn test_anxiety_groups_are_unsynchronized() {
        let params = builtin_preset(Emotion::Anxiety);
        let frame = group_transforms(Emotion::Anxiety, 1.37, &params);
        assert_ne!(frame[0].offset, frame[1].offset);
    }

    #[test]
    fn test_sadness_minority_drifts() {
        let frames = samples(Emotion::Sadness);
        for group in 0..6 {
            assert!(frames.iter().all(|f| f[group].opacity < 0.2));
        }
        let still = frames[0][0].offset;
        assert!(frames.iter().all(|f| f[0].offset == still));
        assert!(frames.iter().any(|f| f[7].offset != frames[0][7].offset));
        assert!(max_offset(&frames, 7) > 0.0);
        assert!(frames.iter().all(|f| f.iter().all(|g| g.scale < 1.0)));
    }

    #[test]
    fn test_love_cascades() {
        let params = builtin_preset(Emotion::Love);
        // At the first group's beat peak, the last group is elsewhere in its cycle
        let t = 0.05 * params.pulse_period;
        let frame = group_transforms(Emotion::Love, t, &params);
        assert!(frame[0].scale > frame[4].scale);
    }

    #[test]
    fn test_happy_lifts() {
        let frames = samples(Emotion::Happy);
        assert!(frames.iter().all(|f| f.iter().all(|g| g.offset.y > 0.0)));
    }

    #[test]
    fn test_angry_flares_to_secondary() {
        let params = builtin_preset(Emotion::Angry);
        let peak = group_transform(Emotion::Angry, 0, 0.08 * params.pulse_period, &params);
        let rest = group_transform(Emotion::Angry, 0, 0.9 * params.pulse_period, &params);
        assert!(peak.scale > rest.scale);
        assert!(peak.emission.g > rest.emission.g);
    }

    #[test]
    fn test_envelopes() {
        assert_eq!(attack_release(0.0), 0.0);
        assert!((attack_release(0.08) - 1.0).abs() < 1e-6);
        assert!(attack_release(0.5) < 0.1);
        assert!(heartbeat(0.05) > 0.9);
        assert!(heartbeat(0.6) < 0.01);
        for step in 0..1000 {
            let n = hash_noise(3, step);
            assert!((0.0..1.0).contains(&n));
        }
    }

    #[test]
    fn test_rotation_wraps() {
        let params = builtin_preset(Emotion::Calm);
        let r = rotation(params.rotation_period * 2.5, &params);
        assert!((r - PI).abs() < 1e-3);
    }
}
