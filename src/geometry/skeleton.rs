//! Branching skeleton of the neuron
//!
//! Layout:
//! - one center point (the soma)
//! - 6 dendrites at 60° intervals, 4 steps each, with a per-branch
//!   sinusoidal depth offset; every dendrite tip forks into 2 sub-branches
//!   of 3 steps
//! - an axon of 8 steps heading straight down, fanning into 5 terminal
//!   branches of 2 steps

use glam::Vec3;
use serde::Serialize;
use std::f32::consts::{PI, TAU};

pub const DENDRITE_COUNT: usize = 6;
pub const DENDRITE_STEPS: usize = 4;
pub const SUB_BRANCHES: usize = 2;
pub const SUB_BRANCH_STEPS: usize = 3;
pub const AXON_STEPS: usize = 8;
pub const TERMINAL_COUNT: usize = 5;
pub const TERMINAL_STEPS: usize = 2;

const DENDRITE_STEP_LEN: f32 = 0.25;
const SUB_BRANCH_STEP_LEN: f32 = 0.18;
const SUB_BRANCH_SPREAD_RAD: f32 = 35.0 * PI / 180.0;
const DEPTH_AMPLITUDE: f32 = 0.35;
const AXON_STEP_LEN: f32 = 0.3;
const TERMINAL_STEP_LEN: f32 = 0.15;
const TERMINAL_FLARE: f32 = 0.6;

/// Which part of the neuron a segment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Dendrite,
    Axon,
    Terminal,
}

/// Skeleton edge between two point indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub a: usize,
    pub b: usize,
    pub kind: SegmentKind,
}

/// Skeleton points plus the segments that connect them
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    pub points: Vec<Vec3>,
    pub segments: Vec<Segment>,
    /// Index of the center point
    pub center: usize,
    /// Every dendritic point, main branches and forks alike
    pub dendrite_points: Vec<usize>,
    pub axon_points: Vec<usize>,
    pub terminal_points: Vec<usize>,
}

impl Skeleton {
    pub fn build() -> Self {
        let mut skeleton = Skeleton {
            points: vec![Vec3::ZERO],
            segments: Vec::new(),
            center: 0,
            dendrite_points: Vec::new(),
            axon_points: Vec::new(),
            terminal_points: Vec::new(),
        };

        for branch in 0..DENDRITE_COUNT {
            let angle = branch as f32 * TAU / DENDRITE_COUNT as f32;
            let depth = DEPTH_AMPLITUDE * (angle * 1.5 + 0.5).sin();
            let direction = Vec3::new(angle.cos(), angle.sin(), depth).normalize();

            let tip = skeleton.extend(
                0,
                direction,
                DENDRITE_STEP_LEN,
                DENDRITE_STEPS,
                SegmentKind::Dendrite,
            );

            for fork in 0..SUB_BRANCHES {
                let sign = if fork == 0 { 1.0 } else { -1.0 };
                let rotated = rotate_about_z(direction, sign * SUB_BRANCH_SPREAD_RAD);
                skeleton.extend(
                    tip,
                    rotated,
                    SUB_BRANCH_STEP_LEN,
                    SUB_BRANCH_STEPS,
                    SegmentKind::Dendrite,
                );
            }
        }

        let axon_tip = skeleton.extend(0, Vec3::NEG_Y, AXON_STEP_LEN, AXON_STEPS, SegmentKind::Axon);

        for terminal in 0..TERMINAL_COUNT {
            let phi = terminal as f32 * TAU / TERMINAL_COUNT as f32;
            let direction =
                Vec3::new(phi.cos() * TERMINAL_FLARE, -1.0, phi.sin() * TERMINAL_FLARE).normalize();
            skeleton.extend(
                axon_tip,
                direction,
                TERMINAL_STEP_LEN,
                TERMINAL_STEPS,
                SegmentKind::Terminal,
            );
        }

        skeleton
    }

    /// Walk `steps` points from `from`; returns the index of the last point
    fn extend(
        &mut self,
        from: usize,
        direction: Vec3,
        step_len: f32,
        steps: usize,
        kind: SegmentKind,
    ) -> usize {
        let mut previous = from;
        for _ in 0..steps {
            let point = self.points[previous] + direction * step_len;
            let index = self.points.len();
            self.points.push(point);
            self.segments.push(Segment {
                a: previous,
                b: index,
                kind,
            });
            match kind {
                SegmentKind::Dendrite => self.dendrite_points.push(index),
                SegmentKind::Axon => self.axon_points.push(index),
                SegmentKind::Terminal => self.terminal_points.push(index),
            }
            previous = index;
        }
        previous
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn axon_tip(&self) -> Option<usize> {
        self.axon_points.last().copied()
    }

    /// Synapse-like positions: center, every dendritic point, the axon tip
    /// and every terminal point
    pub fn boutons(&self) -> Vec<usize> {
        let mut boutons = Vec::with_capacity(2 + self.dendrite_points.len() + self.terminal_points.len());
        boutons.push(self.center);
        boutons.extend(&self.dendrite_points);
        boutons.extend(self.axon_tip());
        boutons.extend(&self.terminal_points);
        boutons
    }

    pub fn segments_of(&self, kind: SegmentKind) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.kind == kind)
    }
}

fn rotate_about_z(v: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_counts() {
        let skeleton = Skeleton::build();
        let dendritic = DENDRITE_COUNT * (DENDRITE_STEPS + SUB_BRANCHES * SUB_BRANCH_STEPS);
        assert_eq!(skeleton.dendrite_points.len(), dendritic);
        assert_eq!(skeleton.axon_points.len(), AXON_STEPS);
        assert_eq!(skeleton.terminal_points.len(), TERMINAL_COUNT * TERMINAL_STEPS);
        assert_eq!(skeleton.len(), 1 + 60 + 8 + 10);
        // Tree: one segment per non-center point
        assert_eq!(skeleton.segments.len(), skeleton.len() - 1);
    }

    #[test]
    fn test_axon_points_down() {
        let skeleton = Skeleton::build();
        let tip = skeleton.points[skeleton.axon_tip().unwrap()];
        assert!((tip.y + AXON_STEPS as f32 * AXON_STEP_LEN).abs() < 1e-5);
        for &t in &skeleton.terminal_points {
            assert!(skeleton.points[t].y < tip.y);
        }
    }

    #[test]
    fn test_bouton_subset() {
        let skeleton = Skeleton::build();
        let boutons = skeleton.boutons();
        assert_eq!(boutons.len(), 72);
        assert!((70..=80).contains(&boutons.len()));
        assert_eq!(boutons[0], skeleton.center);
        assert!(boutons.iter().all(|&b| b < skeleton.len()));
    }

    #[test]
    fn test_is_deterministic() {
        assert_eq!(Skeleton::build(), Skeleton::build());
    }
}
