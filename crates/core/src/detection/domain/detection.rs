//! One frame's primary face detection in normalized coordinates.
//!
//! All geometry is relative to the frame, in [0, 1], so classification is
//! independent of the camera resolution.

use crate::shared::constants::{LEFT_EYE, NOSE_TIP, REQUIRED_KEYPOINTS, RIGHT_EYE};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Center-anchored box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Top-left corner and size in pixels for a `frame_width × frame_height` frame.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> (f64, f64, f64, f64) {
        let w = self.width * frame_width as f64;
        let h = self.height * frame_height as f64;
        let x = self.x_center * frame_width as f64 - w / 2.0;
        let y = self.y_center * frame_height as f64 - h / 2.0;
        (x, y, w, h)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    /// Ordered: left eye, right eye, nose tip, then any detector extras.
    pub keypoints: Vec<Keypoint>,
    pub score: f64,
}

impl Detection {
    pub fn new(bounding_box: BoundingBox, keypoints: Vec<Keypoint>, score: f64) -> Self {
        Self {
            bounding_box,
            keypoints,
            score,
        }
    }

    /// False when the detector returned too few keypoints to judge orientation.
    pub fn is_well_formed(&self) -> bool {
        self.keypoints.len() >= REQUIRED_KEYPOINTS
    }

    pub fn left_eye(&self) -> Option<Keypoint> {
        self.keypoints.get(LEFT_EYE).copied()
    }

    pub fn right_eye(&self) -> Option<Keypoint> {
        self.keypoints.get(RIGHT_EYE).copied()
    }

    pub fn nose_tip(&self) -> Option<Keypoint> {
        self.keypoints.get(NOSE_TIP).copied()
    }
}
