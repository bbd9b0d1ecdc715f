//! Restore override
//!
//! Once stabilization completes, colors drain to white and gray while the
//! groups spiral in toward the center and brighten. When the override ends
//! every group is back at identity.

use glam::Vec3;
use std::f32::consts::TAU;

use crate::animation::behavior::{bump, smoothstep, GroupTransform};
use crate::geometry::GROUP_COUNT;
use crate::types::{EmotionParameters, Rgb};

const SPIRAL_TURNS: f32 = 1.5;
const SPIRAL_RADIUS: f32 = 0.15;
const CONTRACTION: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoreAnimation {
    started: f32,
    duration: f32,
}

impl RestoreAnimation {
    pub fn new(started: f32, duration: f32) -> Self {
        Self {
            started,
            duration: duration.max(f32::EPSILON),
        }
    }

    /// 0 at start, 1 once finished
    pub fn progress(&self, now: f32) -> f32 {
        ((now - self.started) / self.duration).clamp(0.0, 1.0)
    }

    /// Same animation on a clock moved back by `shift` seconds
    pub fn rebased(&self, shift: f32) -> Self {
        Self {
            started: self.started - shift,
            duration: self.duration,
        }
    }

    pub fn is_finished(&self, now: f32) -> bool {
        self.progress(now) >= 1.0
    }

    pub fn transforms(&self, now: f32, params: &EmotionParameters) -> [GroupTransform; GROUP_COUNT] {
        let p = self.progress(now);
        if p >= 1.0 {
            return [GroupTransform::IDENTITY; GROUP_COUNT];
        }
        let ease = smoothstep(p);
        // Radius swells then winds back to zero
        let radius = SPIRAL_RADIUS * bump(p) * (1.0 - ease);
        let gray = Rgb::gray(params.primary_color.luminance());
        let drained = params.primary_color.lerp(&gray, (ease * 2.0).min(1.0));
        let color = drained.lerp(&Rgb::WHITE, ease);

        std::array::from_fn(|g| {
            let angle = g as f32 * TAU / GROUP_COUNT as f32 + p * SPIRAL_TURNS * TAU;
            GroupTransform {
                offset: Vec3::new(angle.cos(), angle.sin(), 0.0) * radius,
                scale: 1.0 - CONTRACTION * bump(p),
                opacity: 0.6 + 0.4 * ease,
                emission: color.scaled(params.glow_intensity * (0.6 + 0.6 * ease)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::builtin_preset;
    use crate::types::Emotion;

    #[test]
    fn test_ends_at_identity() {
        let restore = RestoreAnimation::new(10.0, 4.5);
        let params = builtin_preset(Emotion::Anxiety);
        assert!(!restore.is_finished(14.0));
        assert!(restore.is_finished(14.5));
        assert_eq!(restore.transforms(15.0, &params), [GroupTransform::IDENTITY; GROUP_COUNT]);
    }

    #[test]
    fn test_desaturates_and_brightens() {
        let restore = RestoreAnimation::new(0.0, 4.5);
        let params = builtin_preset(Emotion::Angry);
        let early = restore.transforms(0.2, &params)[0].emission;
        let late = restore.transforms(4.2, &params)[0].emission;
        let spread = |c: Rgb| c.r.max(c.g).max(c.b) - c.r.min(c.g).min(c.b);
        assert!(spread(late) < spread(early));
        assert!(late.luminance() > early.luminance());
    }

    #[test]
    fn test_spirals_inward() {
        let restore = RestoreAnimation::new(0.0, 4.5);
        let params = builtin_preset(Emotion::Calm);
        let mid = restore.transforms(2.0, &params);
        let late = restore.transforms(4.3, &params);
        assert!(late[0].offset.length() < mid[0].offset.length());
        assert!(mid[0].scale < 1.0);
    }
}
