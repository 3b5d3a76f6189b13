use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("drawing surface cannot be {width}x{height}")]
    ZeroSize { width: u32, height: u32 },
}

/// Straight-alpha color; `a` in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }
}

/// Geometry in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Ellipse {
        cx: f64,
        cy: f64,
        radius_x: f64,
        radius_y: f64,
    },
    Circle {
        cx: f64,
        cy: f64,
        radius: f64,
    },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
}

/// Alternating on/off lengths measured along the path, starting "on".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineDash {
    pub segments: [f64; 2],
    pub offset: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f64,
    pub line_cap: LineCap,
    pub dash: Option<LineDash>,
    /// Angle where closed curves begin, in radians. 0 is the rightmost point;
    /// the path runs clockwise on screen (y grows downward).
    pub start_angle: f64,
}

impl Stroke {
    pub fn solid(color: Rgba, width: f64) -> Self {
        Self {
            color,
            width,
            line_cap: LineCap::Butt,
            dash: None,
            start_angle: 0.0,
        }
    }
}

/// The 2D drawing capability the overlay is rendered onto.
///
/// Hosts without an ellipse primitive report `supports_ellipse() == false`
/// and receive circles only.
pub trait DrawingSurface: Send {
    fn size(&self) -> (u32, u32);

    /// Matches the surface to the frame source's native dimensions.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), SurfaceError>;

    fn supports_ellipse(&self) -> bool;

    /// Replaces the surface contents with the frame, scaled to fit if needed.
    fn draw_frame(&mut self, frame: &Frame);

    /// Fills the whole surface except the interior of `hole` (even-odd fill).
    fn fill_outside(&mut self, hole: &Shape, color: Rgba);

    fn stroke(&mut self, shape: &Shape, stroke: &Stroke);

    /// Copy of the composited pixels, for surfaces that keep them in memory.
    fn snapshot(&self) -> Option<Frame> {
        None
    }
}
