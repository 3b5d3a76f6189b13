//! Frontal and centered judgments from one detection.
//!
//! Frontal: the eyes are level (no roll) and the nose tip sits under the eye
//! midpoint (no yaw). Centered: the box center is near the frame center, with
//! a looser vertical tolerance because the target zone is a portrait ellipse.

use serde::{Deserialize, Serialize};

use crate::detection::domain::detection::Detection;

/// Differences this close to a threshold count as reaching it, so decimal
/// inputs such as `0.6 - 0.5` land on the boundary instead of just below it.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// All thresholds are exclusive upper bounds in normalized units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub eye_level: f64,
    pub nose_offset: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            eye_level: 0.08,
            nose_offset: 0.08,
            center_x: 0.10,
            center_y: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub is_frontal: bool,
    pub is_centered: bool,
    pub eye_diff_y: f64,
    pub nose_offset: f64,
    pub center_x_diff: f64,
    pub center_y_diff: f64,
}

impl ClassificationResult {
    /// Result used when the frame has no usable detection.
    pub fn absent() -> Self {
        Self {
            is_frontal: false,
            is_centered: false,
            eye_diff_y: f64::NAN,
            nose_offset: f64::NAN,
            center_x_diff: f64::NAN,
            center_y_diff: f64::NAN,
        }
    }

    pub fn joint_condition_holds(&self) -> bool {
        self.is_frontal && self.is_centered
    }
}

/// Classifies a well-formed detection. Callers must check
/// [`Detection::is_well_formed`] first; missing keypoints classify as not frontal.
pub fn classify(detection: &Detection, thresholds: &ClassifierThresholds) -> ClassificationResult {
    let (eye_diff_y, nose_offset) =
        match (detection.left_eye(), detection.right_eye(), detection.nose_tip()) {
            (Some(left), Some(right), Some(nose)) => (
                (left.y - right.y).abs(),
                ((left.x + right.x) / 2.0 - nose.x).abs(),
            ),
            _ => (f64::INFINITY, f64::INFINITY),
        };

    let center_x_diff = (detection.bounding_box.x_center - 0.5).abs();
    let center_y_diff = (detection.bounding_box.y_center - 0.5).abs();

    ClassificationResult {
        is_frontal: below(eye_diff_y, thresholds.eye_level)
            && below(nose_offset, thresholds.nose_offset),
        is_centered: below(center_x_diff, thresholds.center_x)
            && below(center_y_diff, thresholds.center_y),
        eye_diff_y,
        nose_offset,
        center_x_diff,
        center_y_diff,
    }
}

fn below(value: f64, limit: f64) -> bool {
    value < limit - BOUNDARY_EPSILON
}
