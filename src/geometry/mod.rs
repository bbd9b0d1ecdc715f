//! Neural geometry
//!
//! Side-effect-free construction of the visualized neuron: a branching
//! skeleton, a dense point cloud split into animation groups, a
//! distance-thresholded connection graph and the impulse paths between
//! boutons. Builds are meant to run on a background thread; see
//! [`rebuild::BackgroundJobs`].

pub mod cloud;
pub mod graph;
pub mod rebuild;
pub mod skeleton;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;

use crate::config::GeometryConfig;

pub use cloud::{split_groups, PointCloud, GROUP_COUNT};
pub use graph::{build_impulse_paths, ConnectionGraph, ImpulsePath};
pub use rebuild::BackgroundJobs;
pub use skeleton::{Segment, SegmentKind, Skeleton};

/// Static structure shared by every frame until the next full rebuild
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralGeometry {
    pub skeleton: Skeleton,
    pub cloud: PointCloud,
    /// Skeleton indices designated as synapses
    pub boutons: Vec<usize>,
    pub impulse_paths: Vec<ImpulsePath>,
}

/// Result of a background build
#[derive(Debug, Clone)]
pub enum GeometryUpdate {
    Full(NeuralGeometry, ConnectionGraph),
    Graph(ConnectionGraph),
}

/// Structure statistics for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryStats {
    pub skeleton_points: usize,
    pub segments: usize,
    pub cloud_points: usize,
    pub group_sizes: [usize; GROUP_COUNT],
    pub boutons: usize,
    pub impulse_paths: usize,
    pub connection_threshold: f32,
    pub connections: usize,
}

impl GeometryStats {
    pub fn new(geometry: &NeuralGeometry, graph: &ConnectionGraph) -> Self {
        Self {
            skeleton_points: geometry.skeleton.len(),
            segments: geometry.skeleton.segments.len(),
            cloud_points: geometry.cloud.len(),
            group_sizes: geometry.cloud.group_sizes(),
            boutons: geometry.boutons.len(),
            impulse_paths: geometry.impulse_paths.len(),
            connection_threshold: graph.threshold(),
            connections: graph.edge_count(),
        }
    }
}

/// Builds [`NeuralGeometry`] and connection graphs from a [`GeometryConfig`]
#[derive(Debug, Clone, Default)]
pub struct NeuralGeometryBuilder {
    config: GeometryConfig,
}

impl NeuralGeometryBuilder {
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Skeleton, cloud, boutons and impulse paths
    pub fn build(&self) -> NeuralGeometry {
        let mut rng = self.rng();
        let skeleton = Skeleton::build();
        let cloud = PointCloud::generate(&skeleton, &self.config, &mut rng);
        let boutons = skeleton.boutons();
        let impulse_paths = build_impulse_paths(
            &skeleton.points,
            &boutons,
            self.config.impulse_path_distance,
            self.config.midpoint_jitter,
            &mut rng,
        );
        debug!(
            points = cloud.len(),
            boutons = boutons.len(),
            paths = impulse_paths.len(),
            "neural geometry built"
        );
        NeuralGeometry {
            skeleton,
            cloud,
            boutons,
            impulse_paths,
        }
    }

    /// Connection graph for a connectivity value
    pub fn build_graph(&self, skeleton: &Skeleton, connectivity: f32) -> ConnectionGraph {
        let threshold = self.config.connection_threshold(connectivity);
        ConnectionGraph::build(&skeleton.points, threshold, connectivity)
    }

    pub fn build_all(&self, connectivity: f32) -> (NeuralGeometry, ConnectionGraph) {
        let geometry = self.build();
        let graph = self.build_graph(&geometry.skeleton, connectivity);
        (geometry, graph)
    }
}
