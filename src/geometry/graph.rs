//! Distance-thresholded connection graph and impulse paths

use glam::Vec3;
use rand::Rng;
use std::collections::HashSet;

/// Undirected edges between skeleton points closer than a threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionGraph {
    threshold: f32,
    /// Connectivity the graph was built for
    connectivity: f32,
    /// Pairs stored as (low, high)
    edges: Vec<(usize, usize)>,
    lookup: HashSet<(usize, usize)>,
}

impl ConnectionGraph {
    /// All pairs `i < j` with distance below `threshold`
    pub fn build(points: &[Vec3], threshold: f32, connectivity: f32) -> Self {
        let mut edges = Vec::new();
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                if points[i].distance(points[j]) < threshold {
                    edges.push((i, j));
                }
            }
        }
        let lookup = edges.iter().copied().collect();
        Self {
            threshold,
            connectivity,
            edges,
            lookup,
        }
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        a != b && self.lookup.contains(&(a.min(b), a.max(b)))
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn connectivity(&self) -> f32 {
        self.connectivity
    }
}

/// Three-point arc between two boutons
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulsePath {
    /// Skeleton index of the start bouton
    pub from: usize,
    /// Skeleton index of the end bouton
    pub to: usize,
    pub points: [Vec3; 3],
}

impl ImpulsePath {
    /// Position along the arc (quadratic Bezier through the midpoint control)
    pub fn sample(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        let [p0, p1, p2] = self.points;
        let u = 1.0 - t;
        p0 * (u * u) + p1 * (2.0 * u * t) + p2 * (t * t)
    }
}

/// Paths in both directions for every bouton pair within `max_distance`
pub fn build_impulse_paths<R: Rng + ?Sized>(
    points: &[Vec3],
    boutons: &[usize],
    max_distance: f32,
    jitter: f32,
    rng: &mut R,
) -> Vec<ImpulsePath> {
    let mut paths = Vec::new();
    for (n, &a) in boutons.iter().enumerate() {
        for &b in &boutons[n + 1..] {
            let (start, end) = (points[a], points[b]);
            if a == b || start.distance(end) >= max_distance {
                continue;
            }
            let offset = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            ) * jitter;
            let mid = (start + end) * 0.5 + offset;
            paths.push(ImpulsePath {
                from: a,
                to: b,
                points: [start, mid, end],
            });
            paths.push(ImpulsePath {
                from: b,
                to: a,
                points: [end, mid, start],
            });
        }
    }
    paths
}
