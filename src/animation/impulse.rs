//! Travelling impulses along synapse paths

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::geometry::ImpulsePath;
use crate::types::{Emotion, Rgb};

/// Gap between trail samples along a path (fraction of the path)
const TRAIL_SPACING: f32 = 0.04;

/// Launch cadence for one emotion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseCadence {
    /// Seconds between launches
    pub interval_sec: f32,
    /// Trail samples drawn behind the head
    pub trail: usize,
    pub brightness: f32,
    /// Seconds to cross a path
    pub travel_sec: f32,
}

pub fn cadence(emotion: Emotion) -> ImpulseCadence {
    let (interval_sec, trail, brightness, travel_sec) = match emotion {
        Emotion::Anxiety => (0.12, 6, 1.0, 0.5),
        Emotion::Angry => (0.15, 5, 1.0, 0.45),
        Emotion::Happy => (0.3, 4, 0.85, 0.8),
        Emotion::Love => (0.4, 4, 0.8, 1.0),
        Emotion::Calm => (0.8, 3, 0.6, 1.6),
        Emotion::Sadness => (2.0, 2, 0.35, 2.8),
    };
    ImpulseCadence {
        interval_sec,
        trail,
        brightness,
        travel_sec,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Impulse {
    path: usize,
    launched: f32,
    cadence: ImpulseCadence,
}

/// Drawable trail: head first, then older samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpulseTrail {
    pub points: Vec<Vec3>,
    pub brightness: f32,
    pub color: Rgb,
}

/// Launches and ages impulses on the animation clock
#[derive(Debug)]
pub struct ImpulseLauncher {
    rng: StdRng,
    max_live: usize,
    next_launch: Option<f32>,
    live: Vec<Impulse>,
    launched: u64,
}

impl ImpulseLauncher {
    pub fn new(max_live: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            max_live,
            next_launch: None,
            live: Vec::new(),
            launched: 0,
        }
    }

    /// Retire finished impulses and launch new ones; `emotion = None` pauses launching
    pub fn update(&mut self, now: f32, emotion: Option<Emotion>, path_count: usize) {
        self.live
            .retain(|i| now - i.launched < i.cadence.travel_sec);

        let Some(emotion) = emotion.filter(|_| path_count > 0) else {
            self.next_launch = None;
            return;
        };
        let cadence = cadence(emotion);
        let mut next = self.next_launch.unwrap_or(now);

        // After a long stall, resume the cadence instead of bursting
        if now - next > cadence.interval_sec * 4.0 {
            next = now;
        }

        while next <= now {
            if self.max_live == 0 {
                break;
            }
            if self.live.len() >= self.max_live {
                self.live.remove(0);
            }
            self.live.push(Impulse {
                path: self.rng.gen_range(0..path_count),
                launched: next,
                cadence,
            });
            self.launched += 1;
            next += cadence.interval_sec;
        }
        self.next_launch = Some(next);
    }

    /// Move every launch time back by `shift` seconds when the animation clock wraps
    pub fn rebase(&mut self, shift: f32) {
        for impulse in &mut self.live {
            impulse.launched -= shift;
        }
        if let Some(next) = self.next_launch.as_mut() {
            *next -= shift;
        }
    }

    /// Trails at `now` for the current path set
    pub fn trails(&self, now: f32, paths: &[ImpulsePath], color: Rgb) -> Vec<ImpulseTrail> {
        self.live
            .iter()
            .filter_map(|impulse| {
                let path = paths.get(impulse.path)?;
                let progress = (now - impulse.launched) / impulse.cadence.travel_sec;
                let points = (0..=impulse.cadence.trail)
                    .map(|k| progress - k as f32 * TRAIL_SPACING)
                    .filter(|t| (0.0..=1.0).contains(t))
                    .map(|t| path.sample(t))
                    .collect::<Vec<_>>();
                if points.is_empty() {
                    return None;
                }
                Some(ImpulseTrail {
                    points,
                    brightness: impulse.cadence.brightness,
                    color,
                })
            })
            .collect()
    }

    /// Total launches since creation
    pub fn launched(&self) -> u64 {
        self.launched
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Drop everything; called when the path set is replaced
    pub fn clear(&mut self) {
        self.live.clear();
        self.next_launch = None;
    }
}
