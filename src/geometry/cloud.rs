//! Dense point cloud around the skeleton
//!
//! Points are emitted soma first, then dendrites, then axon and terminals,
//! and split order-preserving into [`GROUP_COUNT`] contiguous groups.

use glam::Vec3;
use rand::Rng;
use std::ops::Range;

use crate::config::GeometryConfig;
use crate::geometry::skeleton::{SegmentKind, Skeleton};

/// Independent animation channels
pub const GROUP_COUNT: usize = 8;

/// Share of the cloud inside the soma sphere (percent)
const SOMA_SHARE_PCT: usize = 20;
/// Share of the cloud along the dendrites (percent)
const DENDRITE_SHARE_PCT: usize = 55;

#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Vec3>,
    groups: [Range<usize>; GROUP_COUNT],
}

impl PointCloud {
    pub fn generate<R: Rng + ?Sized>(
        skeleton: &Skeleton,
        config: &GeometryConfig,
        rng: &mut R,
    ) -> Self {
        let total = config.point_count;
        let soma = total * SOMA_SHARE_PCT / 100;
        let dendrite = total * DENDRITE_SHARE_PCT / 100;
        let axon = total - soma - dendrite;

        let center = skeleton.points[skeleton.center];
        let mut points = Vec::with_capacity(total);

        for _ in 0..soma {
            points.push(center + random_in_sphere(rng) * config.soma_radius);
        }

        let dendrite_segments: Vec<_> = skeleton.segments_of(SegmentKind::Dendrite).collect();
        for _ in 0..dendrite {
            let segment = dendrite_segments[rng.gen_range(0..dendrite_segments.len())];
            points.push(point_along(
                skeleton.points[segment.a],
                skeleton.points[segment.b],
                config.dendrite_radius,
                rng,
            ));
        }

        let axon_segments: Vec<_> = skeleton
            .segments
            .iter()
            .filter(|s| s.kind != SegmentKind::Dendrite)
            .collect();
        for _ in 0..axon {
            let segment = axon_segments[rng.gen_range(0..axon_segments.len())];
            points.push(point_along(
                skeleton.points[segment.a],
                skeleton.points[segment.b],
                config.axon_radius,
                rng,
            ));
        }

        let groups = split_groups(points.len());
        Self { points, groups }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index range of a group
    pub fn group_range(&self, group: usize) -> Range<usize> {
        self.groups[group].clone()
    }

    pub fn group(&self, group: usize) -> &[Vec3] {
        &self.points[self.group_range(group)]
    }

    pub fn group_sizes(&self) -> [usize; GROUP_COUNT] {
        std::array::from_fn(|g| self.groups[g].len())
    }
}

/// Contiguous split whose sizes differ by at most one
pub fn split_groups(len: usize) -> [Range<usize>; GROUP_COUNT] {
    let base = len / GROUP_COUNT;
    let extra = len % GROUP_COUNT;
    let mut start = 0;
    std::array::from_fn(|g| {
        let size = base + usize::from(g < extra);
        let range = start..start + size;
        start += size;
        range
    })
}

fn random_in_sphere<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let candidate = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        if candidate.length_squared() <= 1.0 {
            return candidate;
        }
    }
}

/// Random point inside the cylinder of `radius` around segment a-b
fn point_along<R: Rng + ?Sized>(a: Vec3, b: Vec3, radius: f32, rng: &mut R) -> Vec3 {
    let axis = b - a;
    let direction = axis.normalize_or_zero();
    let helper = if direction.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    let u = direction.cross(helper).normalize_or_zero();
    let v = direction.cross(u);

    let t: f32 = rng.gen_range(0.0..=1.0);
    let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    // sqrt keeps the disk uniformly filled
    let r = radius * rng.gen_range(0.0f32..=1.0).sqrt();
    a + axis * t + (u * theta.cos() + v * theta.sin()) * r
}
