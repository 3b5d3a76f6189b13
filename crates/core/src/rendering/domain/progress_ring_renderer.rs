use std::f64::consts::FRAC_PI_2;

use crate::detection::domain::detection::BoundingBox;
use crate::rendering::domain::drawing_surface::{
    DrawingSurface, LineCap, LineDash, Rgba, Shape, Stroke,
};
use crate::rendering::domain::target_zone::{
    arc_dash, ramanujan_perimeter, TargetZone, ZoneFractions,
};

pub const DIM_COLOR: Rgba = Rgba::new(0, 0, 0, 0.55);
pub const GUIDE_COLOR: Rgba = Rgba::new(255, 255, 255, 0.35);
pub const ARC_COLOR: Rgba = Rgba::opaque(0, 230, 64);
pub const GUIDE_WIDTH: f64 = 4.0;
pub const ARC_WIDTH: f64 = 6.0;

const FACE_BOX_FRONTAL: Rgba = Rgba::opaque(0, 255, 0);
const FACE_BOX_TURNED: Rgba = Rgba::opaque(255, 0, 0);
const FACE_BOX_WIDTH: f64 = 4.0;

/// How the target zone is drawn, fixed for the renderer's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneStrategy {
    Elliptical,
    /// For surfaces without an ellipse primitive.
    Circular,
}

/// Draws the dimmed backdrop, the zone guide and the clockwise progress arc.
pub struct ProgressRingRenderer {
    strategy: ZoneStrategy,
    fractions: ZoneFractions,
}

impl ProgressRingRenderer {
    pub fn new(strategy: ZoneStrategy, fractions: ZoneFractions) -> Self {
        Self {
            strategy,
            fractions,
        }
    }

    /// Picks the strategy from the surface's capabilities once, at setup.
    pub fn for_surface(surface: &dyn DrawingSurface, fractions: ZoneFractions) -> Self {
        let strategy = if surface.supports_ellipse() {
            ZoneStrategy::Elliptical
        } else {
            ZoneStrategy::Circular
        };
        log::info!("Progress ring using {:?} target zone", strategy);
        Self::new(strategy, fractions)
    }

    pub fn strategy(&self) -> ZoneStrategy {
        self.strategy
    }

    /// Zone shape and its perimeter for a `width × height` viewport.
    pub fn zone(&self, width: u32, height: u32) -> (Shape, f64) {
        let zone = TargetZone::for_viewport(width, height, &self.fractions);
        match self.strategy {
            ZoneStrategy::Elliptical => (
                zone.ellipse(),
                ramanujan_perimeter(zone.radius_x, zone.radius_y),
            ),
            ZoneStrategy::Circular => (
                zone.circle(),
                ramanujan_perimeter(zone.radius_x, zone.radius_x),
            ),
        }
    }

    pub fn render(&self, surface: &mut dyn DrawingSurface, width: u32, height: u32, progress: f64) {
        let (shape, perimeter) = self.zone(width, height);

        surface.fill_outside(&shape, DIM_COLOR);
        surface.stroke(&shape, &Stroke::solid(GUIDE_COLOR, GUIDE_WIDTH));

        let progress = progress.clamp(0.0, 1.0);
        if progress <= 0.0 {
            return;
        }

        surface.stroke(
            &shape,
            &Stroke {
                color: ARC_COLOR,
                width: ARC_WIDTH,
                line_cap: LineCap::Round,
                dash: Some(LineDash {
                    segments: arc_dash(perimeter, progress),
                    offset: 0.0,
                }),
                start_angle: -FRAC_PI_2,
            },
        );
    }

    /// Outlines the detector's box in pixel space, colored by orientation.
    pub fn render_face_box(
        &self,
        surface: &mut dyn DrawingSurface,
        bounding_box: &BoundingBox,
        is_frontal: bool,
    ) {
        let (width, height) = surface.size();
        let (x, y, w, h) = bounding_box.to_pixels(width, height);
        let color = if is_frontal {
            FACE_BOX_FRONTAL
        } else {
            FACE_BOX_TURNED
        };
        surface.stroke(
            &Shape::Rectangle {
                x,
                y,
                width: w,
                height: h,
            },
            &Stroke::solid(color, FACE_BOX_WIDTH),
        );
    }
}
