//! Emotion animation director
//!
//! Turns the live display parameters into per-frame group transforms,
//! connection styling and impulse trails. The restore override takes over
//! from the per-emotion behaviors when a session completes and hands back to
//! calm once it finishes.

pub mod behavior;
pub mod impulse;
pub mod restore;

use std::sync::Arc;
use tracing::debug;

use crate::config::AnimationConfig;
use crate::geometry::{ConnectionGraph, NeuralGeometry, GROUP_COUNT};
use crate::types::{Emotion, EmotionParameters};

pub use behavior::{connection_style, group_transforms, rotation, ConnectionStyle, GroupTransform};
pub use impulse::{cadence, ImpulseCadence, ImpulseLauncher, ImpulseTrail};
pub use restore::RestoreAnimation;

/// Everything a renderer needs for one frame
#[derive(Debug, Clone)]
pub struct SceneFrame {
    /// Animation clock (seconds)
    pub time: f32,
    /// Whole-structure rotation (radians)
    pub rotation: f32,
    pub groups: [GroupTransform; GROUP_COUNT],
    pub connections: ConnectionStyle,
    pub impulses: Vec<ImpulseTrail>,
    pub restoring: bool,
    pub geometry: Option<Arc<NeuralGeometry>>,
    pub graph: Option<Arc<ConnectionGraph>>,
}

impl SceneFrame {
    /// Push this frame to a surface
    pub fn present(&self, surface: &mut dyn RenderSurface) {
        surface.apply_groups(self.rotation, &self.groups);
        surface.apply_connections(self.graph.as_deref(), &self.connections);
        surface.draw_impulses(&self.impulses);
    }
}

/// Host-side renderer fed by [`SceneFrame::present`]
pub trait RenderSurface {
    fn apply_groups(&mut self, rotation: f32, groups: &[GroupTransform; GROUP_COUNT]);

    /// `graph` is `None` until the first background build lands
    fn apply_connections(&mut self, graph: Option<&ConnectionGraph>, style: &ConnectionStyle);

    fn draw_impulses(&mut self, trails: &[ImpulseTrail]);
}

/// Per-frame animation state machine
#[derive(Debug)]
pub struct EmotionAnimationDirector {
    config: AnimationConfig,
    emotion: Emotion,
    restore: Option<RestoreAnimation>,
    impulses: ImpulseLauncher,
}

impl EmotionAnimationDirector {
    pub fn new(config: AnimationConfig, seed: Option<u64>) -> Self {
        let impulses = ImpulseLauncher::new(config.max_impulses, seed);
        Self {
            config,
            emotion: Emotion::Calm,
            restore: None,
            impulses,
        }
    }

    /// Behavior used outside the restore override
    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    pub fn set_emotion(&mut self, emotion: Emotion) {
        if self.emotion != emotion {
            debug!(%emotion, "animation behavior switched");
            self.emotion = emotion;
        }
    }

    /// Start the restore override at animation time `now`; calm resumes afterwards
    pub fn begin_restore(&mut self, now: f32) {
        self.restore = Some(RestoreAnimation::new(now, self.config.restore_duration_sec));
        self.emotion = Emotion::Calm;
    }

    /// Cancel a running override without waiting for it to finish
    pub fn cancel_restore(&mut self) {
        self.restore = None;
    }

    /// The animation clock wrapped back by `shift` seconds
    pub fn rebase(&mut self, shift: f32) {
        self.restore = self.restore.map(|r| r.rebased(shift));
        self.impulses.rebase(shift);
    }

    pub fn is_restoring(&self) -> bool {
        self.restore.is_some()
    }

    /// Impulse paths changed; live impulses referencing old paths are dropped
    pub fn geometry_replaced(&mut self) {
        self.impulses.clear();
    }

    /// Compute the frame at animation time `now`
    pub fn frame(
        &mut self,
        now: f32,
        params: &EmotionParameters,
        geometry: Option<Arc<NeuralGeometry>>,
        graph: Option<Arc<ConnectionGraph>>,
    ) -> SceneFrame {
        if self.restore.is_some_and(|r| r.is_finished(now)) {
            debug!("restore animation finished");
            self.restore = None;
        }

        let (groups, launching) = match &self.restore {
            Some(restore) => (restore.transforms(now, params), None),
            None => (group_transforms(self.emotion, now, params), Some(self.emotion)),
        };

        let paths = geometry
            .as_deref()
            .map(|g| g.impulse_paths.as_slice())
            .unwrap_or_default();
        self.impulses.update(now, launching, paths.len());
        let impulses = self.impulses.trails(now, paths, params.secondary_color);

        SceneFrame {
            time: now,
            rotation: rotation(now, params),
            connections: connection_style(&groups, params),
            groups,
            impulses,
            restoring: self.restore.is_some(),
            geometry,
            graph,
        }
    }
}
