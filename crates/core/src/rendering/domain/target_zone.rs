//! Target-zone geometry and progress-arc math.
//!
//! The zone is a portrait ellipse scaled to the smaller viewport dimension so
//! it stays fully visible for any aspect ratio.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::rendering::domain::drawing_surface::Shape;

/// Zone radii as fractions of `min(width, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneFractions {
    pub radius_x: f64,
    pub radius_y: f64,
}

impl Default for ZoneFractions {
    fn default() -> Self {
        Self {
            radius_x: 0.22,
            radius_y: 0.33,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetZone {
    pub cx: f64,
    pub cy: f64,
    pub radius_x: f64,
    pub radius_y: f64,
}

impl TargetZone {
    pub fn for_viewport(width: u32, height: u32, fractions: &ZoneFractions) -> Self {
        let min_dim = width.min(height) as f64;
        Self {
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            radius_x: min_dim * fractions.radius_x,
            radius_y: min_dim * fractions.radius_y,
        }
    }

    pub fn ellipse(&self) -> Shape {
        Shape::Ellipse {
            cx: self.cx,
            cy: self.cy,
            radius_x: self.radius_x,
            radius_y: self.radius_y,
        }
    }

    /// Circular stand-in with `radius_x` as the uniform radius.
    pub fn circle(&self) -> Shape {
        Shape::Circle {
            cx: self.cx,
            cy: self.cy,
            radius: self.radius_x,
        }
    }
}

/// Ramanujan's second approximation of an ellipse perimeter.
///
/// Exact for circles: with `a == b` it reduces to `2πa`.
pub fn ramanujan_perimeter(a: f64, b: f64) -> f64 {
    PI * (3.0 * (a + b) - ((3.0 * a + b) * (a + 3.0 * b)).sqrt())
}

/// Dash pattern `[on, off]` that shows exactly `progress` of a closed path.
///
/// The gap is a full perimeter long so the pattern never repeats within
/// one lap.
pub fn arc_dash(perimeter: f64, progress: f64) -> [f64; 2] {
    [perimeter * progress.clamp(0.0, 1.0), perimeter]
}
