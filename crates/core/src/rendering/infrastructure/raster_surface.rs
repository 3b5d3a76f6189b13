use std::f64::consts::TAU;

use crate::rendering::domain::drawing_surface::{
    DrawingSurface, LineCap, Rgba, Shape, Stroke, SurfaceError,
};
use crate::shared::frame::Frame;

/// Distance between consecutive brush stamps along a path, in pixels.
const SAMPLE_SPACING: f64 = 0.5;

/// CPU drawing surface that rasterizes into an RGB [`Frame`].
///
/// Strokes are built as a coverage mask first and blended once, so
/// semi-transparent outlines keep their alpha where brush stamps overlap.
pub struct RasterSurface {
    canvas: Frame,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::ZeroSize { width, height });
        }
        Ok(Self {
            canvas: Frame::black(width, height),
        })
    }

    pub fn canvas(&self) -> &Frame {
        &self.canvas
    }

    fn blend_mask(&mut self, mask: &[bool], color: Rgba) {
        let alpha = color.a.clamp(0.0, 1.0) as f64;
        let rgb = [color.r as f64, color.g as f64, color.b as f64];
        for (px, _) in self
            .canvas
            .data_mut()
            .chunks_exact_mut(3)
            .zip(mask)
            .filter(|(_, &covered)| covered)
        {
            for c in 0..3 {
                px[c] = (px[c] as f64 * (1.0 - alpha) + rgb[c] * alpha).round() as u8;
            }
        }
    }
}

impl DrawingSurface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::ZeroSize { width, height });
        }
        if self.canvas.dimensions() != (width, height) {
            log::debug!("Resizing raster surface to {width}x{height}");
            self.canvas = Frame::black(width, height);
        }
        Ok(())
    }

    fn supports_ellipse(&self) -> bool {
        true
    }

    fn draw_frame(&mut self, frame: &Frame) {
        let (dw, dh) = self.canvas.dimensions();
        let (sw, sh) = frame.dimensions();
        if sw == 0 || sh == 0 {
            return;
        }
        let src_channels = frame.channels() as usize;
        let src = frame.data();
        let dst = self.canvas.data_mut();

        for y in 0..dh as usize {
            let sy = (y * sh as usize) / dh as usize;
            for x in 0..dw as usize {
                let sx = (x * sw as usize) / dw as usize;
                let s = (sy * sw as usize + sx) * src_channels;
                let d = (y * dw as usize + x) * 3;
                if src_channels >= 3 {
                    dst[d..d + 3].copy_from_slice(&src[s..s + 3]);
                } else {
                    dst[d..d + 3].fill(src[s]);
                }
            }
        }
    }

    fn fill_outside(&mut self, hole: &Shape, color: Rgba) {
        let (w, h) = self.canvas.dimensions();
        let mut mask = vec![false; (w as usize) * (h as usize)];
        for y in 0..h as usize {
            for x in 0..w as usize {
                mask[y * w as usize + x] = !contains(hole, x as f64 + 0.5, y as f64 + 0.5);
            }
        }
        self.blend_mask(&mask, color);
    }

    fn stroke(&mut self, shape: &Shape, stroke: &Stroke) {
        if stroke.width <= 0.0 || stroke.color.a <= 0.0 {
            return;
        }
        let (w, h) = self.canvas.dimensions();
        let mut mask = vec![false; (w as usize) * (h as usize)];
        let half = stroke.width / 2.0;

        for sample in path_samples(shape, stroke.start_angle) {
            if !is_dash_on(sample.distance, stroke) {
                continue;
            }
            match stroke.line_cap {
                LineCap::Round => stamp_disc(&mut mask, w, h, sample.x, sample.y, half),
                LineCap::Butt => stamp_normal(&mut mask, w, h, &sample, half),
            }
        }
        self.blend_mask(&mask, stroke.color);
    }

    fn snapshot(&self) -> Option<Frame> {
        Some(self.canvas.clone())
    }
}

fn contains(shape: &Shape, x: f64, y: f64) -> bool {
    match *shape {
        Shape::Ellipse {
            cx,
            cy,
            radius_x,
            radius_y,
        } => {
            if radius_x <= 0.0 || radius_y <= 0.0 {
                return false;
            }
            let dx = (x - cx) / radius_x;
            let dy = (y - cy) / radius_y;
            dx * dx + dy * dy <= 1.0
        }
        Shape::Circle { cx, cy, radius } => {
            let dx = x - cx;
            let dy = y - cy;
            dx * dx + dy * dy <= radius * radius
        }
        Shape::Rectangle {
            x: rx,
            y: ry,
            width,
            height,
        } => x >= rx && x <= rx + width && y >= ry && y <= ry + height,
    }
}

/// Point on a path with its unit normal and arc length from the path start.
#[derive(Clone, Copy, Debug)]
struct PathSample {
    x: f64,
    y: f64,
    nx: f64,
    ny: f64,
    distance: f64,
}

fn path_samples(shape: &Shape, start_angle: f64) -> Vec<PathSample> {
    match *shape {
        Shape::Ellipse {
            cx,
            cy,
            radius_x,
            radius_y,
        } => conic_samples(cx, cy, radius_x, radius_y, start_angle),
        Shape::Circle { cx, cy, radius } => conic_samples(cx, cy, radius, radius, start_angle),
        Shape::Rectangle {
            x,
            y,
            width,
            height,
        } => rectangle_samples(x, y, width, height),
    }
}

/// Walks an axis-aligned ellipse clockwise on screen from `start_angle`.
fn conic_samples(cx: f64, cy: f64, rx: f64, ry: f64, start_angle: f64) -> Vec<PathSample> {
    if rx <= 0.0 || ry <= 0.0 {
        return Vec::new();
    }
    let steps = ((TAU * rx.max(ry)) / SAMPLE_SPACING).ceil().max(64.0) as usize;
    let mut samples = Vec::with_capacity(steps + 1);
    let mut distance = 0.0;
    let mut prev: Option<(f64, f64)> = None;

    for i in 0..=steps {
        let t = start_angle + TAU * i as f64 / steps as f64;
        let (sin, cos) = t.sin_cos();
        let x = cx + rx * cos;
        let y = cy + ry * sin;
        if let Some((px, py)) = prev {
            distance += ((x - px).powi(2) + (y - py).powi(2)).sqrt();
        }
        prev = Some((x, y));

        let (nx, ny) = (ry * cos, rx * sin);
        let len = (nx * nx + ny * ny).sqrt().max(f64::EPSILON);
        samples.push(PathSample {
            x,
            y,
            nx: nx / len,
            ny: ny / len,
            distance,
        });
    }
    samples
}

/// Walks a rectangle clockwise from its top-left corner.
fn rectangle_samples(x: f64, y: f64, width: f64, height: f64) -> Vec<PathSample> {
    let corners = [
        (x, y),
        (x + width, y),
        (x + width, y + height),
        (x, y + height),
        (x, y),
    ];
    let mut samples = Vec::new();
    let mut distance = 0.0;

    for edge in corners.windows(2) {
        let (x0, y0) = edge[0];
        let (x1, y1) = edge[1];
        let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if len <= 0.0 {
            continue;
        }
        let (nx, ny) = ((y1 - y0) / len, -(x1 - x0) / len);
        let steps = (len / SAMPLE_SPACING).ceil().max(1.0) as usize;
        for i in 0..steps {
            let f = i as f64 / steps as f64;
            samples.push(PathSample {
                x: x0 + (x1 - x0) * f,
                y: y0 + (y1 - y0) * f,
                nx,
                ny,
                distance: distance + len * f,
            });
        }
        distance += len;
    }
    samples
}

fn is_dash_on(distance: f64, stroke: &Stroke) -> bool {
    let Some(dash) = stroke.dash else {
        return true;
    };
    let [on, off] = dash.segments;
    let period = on + off;
    if period <= 0.0 {
        return true;
    }
    if on <= 0.0 {
        return false;
    }
    (distance + dash.offset).rem_euclid(period) < on
}

fn stamp_disc(mask: &mut [bool], w: u32, h: u32, cx: f64, cy: f64, radius: f64) {
    let r_sq = radius * radius;
    let x0 = (cx - radius).floor().max(0.0) as i64;
    let y0 = (cy - radius).floor().max(0.0) as i64;
    let x1 = ((cx + radius).ceil() as i64).min(w as i64 - 1);
    let y1 = ((cy + radius).ceil() as i64).min(h as i64 - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            if dx * dx + dy * dy <= r_sq {
                mask[y as usize * w as usize + x as usize] = true;
            }
        }
    }
}

fn stamp_normal(mask: &mut [bool], w: u32, h: u32, sample: &PathSample, half: f64) {
    let steps = ((2.0 * half) / SAMPLE_SPACING).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let d = -half + 2.0 * half * i as f64 / steps as f64;
        let x = (sample.x + sample.nx * d).floor() as i64;
        let y = (sample.y + sample.ny * d).floor() as i64;
        if x >= 0 && y >= 0 && x < w as i64 && y < h as i64 {
            mask[y as usize * w as usize + x as usize] = true;
        }
    }
}
