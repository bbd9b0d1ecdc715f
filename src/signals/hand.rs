//! Hand steadiness and openness classification
//!
//! Each pose frame carries named joints with a confidence score. The wrist
//! position is tracked over a short window to decide steadiness, and four
//! fingertip/knuckle pairs decide whether the hand is an open palm or a fist.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::config::HandConfig;
use crate::error::EngineError;
use crate::types::GestureLabel;

/// Named hand joints delivered by the pose source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandJoint {
    Wrist,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingTip,
    LittleMcp,
    LittlePip,
    LittleTip,
}

/// Fingertip and knuckle joints compared for openness
const FINGER_PAIRS: [(HandJoint, HandJoint); 4] = [
    (HandJoint::IndexTip, HandJoint::IndexPip),
    (HandJoint::MiddleTip, HandJoint::MiddlePip),
    (HandJoint::RingTip, HandJoint::RingPip),
    (HandJoint::LittleTip, HandJoint::LittlePip),
];

/// Joints averaged with the wrist to locate the palm
const PALM_JOINTS: [HandJoint; 4] = [
    HandJoint::IndexMcp,
    HandJoint::MiddleMcp,
    HandJoint::RingMcp,
    HandJoint::LittleMcp,
];

/// One joint position in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    fn distance(&self, other: (f32, f32)) -> f32 {
        ((self.x - other.0).powi(2) + (self.y - other.1).powi(2)).sqrt()
    }
}

/// A single pose frame; an empty frame means no hand was detected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandFrame {
    #[serde(default)]
    pub landmarks: HashMap<HandJoint, Landmark>,
}

impl HandFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, joint: HandJoint, x: f32, y: f32, confidence: f32) -> Self {
        self.landmarks.insert(joint, Landmark::new(x, y, confidence));
        self
    }

    /// Parse a pose frame delivered as JSON by the host
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::InvalidFrame(e.to_string()))
    }

    /// Landmark if present and above the confidence floor
    fn usable(&self, joint: HandJoint, floor: f32) -> Option<&Landmark> {
        self.landmarks
            .get(&joint)
            .filter(|l| l.confidence > floor && l.x.is_finite() && l.y.is_finite())
    }
}

/// Latest output of the hand classifier
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HandReading {
    pub steady: bool,
    pub gesture: GestureLabel,
    /// Wrist variance over a full window, when available
    pub wrist_variance: Option<f64>,
}

/// Classifier turning pose frames into a [`HandReading`]
#[derive(Debug, Clone)]
pub struct HandSignalClassifier {
    config: HandConfig,
    wrist_positions: VecDeque<(f64, f64)>,
    reading: HandReading,
}

impl Default for HandSignalClassifier {
    fn default() -> Self {
        Self::new(HandConfig::default())
    }
}

impl HandSignalClassifier {
    pub fn new(config: HandConfig) -> Self {
        Self {
            wrist_positions: VecDeque::with_capacity(config.wrist_window + 1),
            config,
            reading: HandReading::default(),
        }
    }

    /// Classify one pose frame and return the updated reading
    pub fn process_frame(&mut self, frame: &HandFrame) -> HandReading {
        let floor = self.config.confidence_floor;

        let Some(wrist) = frame.usable(HandJoint::Wrist, floor).copied() else {
            // A lost hand must re-earn steadiness from scratch
            self.wrist_positions.clear();
            self.reading = HandReading::default();
            return self.reading;
        };

        self.wrist_positions
            .push_back((wrist.x as f64, wrist.y as f64));
        while self.wrist_positions.len() > self.config.wrist_window {
            self.wrist_positions.pop_front();
        }

        let wrist_variance = if self.wrist_positions.len() >= self.config.wrist_window {
            Some(positional_variance(&self.wrist_positions))
        } else {
            None
        };
        let steady = wrist_variance
            .map(|v| v < self.config.steady_variance_threshold)
            .unwrap_or(false);

        let gesture = classify_openness(frame, &wrist, floor, self.config.open_palm_min_extended);

        self.reading = HandReading {
            steady,
            gesture,
            wrist_variance,
        };
        self.reading
    }

    pub fn reading(&self) -> HandReading {
        self.reading
    }

    pub fn reset(&mut self) {
        self.wrist_positions.clear();
        self.reading = HandReading::default();
    }
}

/// Mean squared distance of the points from their centroid
fn positional_variance(points: &VecDeque<(f64, f64)>) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
    let (cx, cy) = (sx / n, sy / n);
    points
        .iter()
        .map(|(x, y)| (x - cx).powi(2) + (y - cy).powi(2))
        .sum::<f64>()
        / n
}

/// Count fingers whose tip lies further from the palm than their knuckle
fn classify_openness(
    frame: &HandFrame,
    wrist: &Landmark,
    floor: f32,
    open_min: usize,
) -> GestureLabel {
    let palm = palm_center(frame, wrist, floor);

    let mut usable_pairs = 0;
    let mut extended = 0;
    for (tip, knuckle) in FINGER_PAIRS {
        if let (Some(tip), Some(knuckle)) = (frame.usable(tip, floor), frame.usable(knuckle, floor)) {
            usable_pairs += 1;
            if tip.distance(palm) > knuckle.distance(palm) {
                extended += 1;
            }
        }
    }

    if usable_pairs == 0 {
        GestureLabel::Indeterminate
    } else if extended >= open_min {
        GestureLabel::OpenPalm
    } else if extended == 0 {
        GestureLabel::ClosedFist
    } else {
        GestureLabel::Indeterminate
    }
}

fn palm_center(frame: &HandFrame, wrist: &Landmark, floor: f32) -> (f32, f32) {
    let mut sum = (wrist.x, wrist.y);
    let mut count = 1.0;
    for joint in PALM_JOINTS {
        if let Some(l) = frame.usable(joint, floor) {
            sum.0 += l.x;
            sum.1 += l.y;
            count += 1.0;
        }
    }
    (sum.0 / count, sum.1 / count)
}
