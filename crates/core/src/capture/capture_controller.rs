//! Per-frame orchestration of one capture session.
//!
//! Each step draws the frame, judges the detector's primary face, advances
//! the dwell window and renders the progress ring. When the dwell completes
//! the raw frame is encoded once and the session latches.

use std::time::Duration;

use crate::capture::domain::capture_output::{CaptureOutput, OutputSink};
use crate::capture::domain::dwell_accumulator;
use crate::capture::domain::session_state::SessionState;
use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_classifier::{
    classify, ClassificationResult, ClassifierThresholds,
};
use crate::detection::domain::face_detector::FaceDetector;
use crate::rendering::domain::drawing_surface::{DrawingSurface, SurfaceError};
use crate::rendering::domain::progress_ring_renderer::ProgressRingRenderer;
use crate::shared::capture_config::CaptureConfig;
use crate::shared::frame::Frame;
use crate::video::domain::image_encoder::ImageEncoder;

/// Result of one controller step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: SessionState,
    /// Dwell progress shown on this frame, in [0, 1].
    pub progress: f64,
    pub classification: ClassificationResult,
    pub detection: Option<Detection>,
    /// Set only on the frame where capture fired.
    pub captured: Option<CaptureOutput>,
}

pub struct CaptureController {
    detector: Box<dyn FaceDetector>,
    encoder: Box<dyn ImageEncoder>,
    renderer: ProgressRingRenderer,
    thresholds: ClassifierThresholds,
    required_dwell: Duration,
    show_face_box: bool,
    sink: Option<OutputSink>,
}

impl CaptureController {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        encoder: Box<dyn ImageEncoder>,
        renderer: ProgressRingRenderer,
        config: &CaptureConfig,
    ) -> Self {
        Self {
            detector,
            encoder,
            renderer,
            thresholds: config.thresholds,
            required_dwell: config.required_dwell(),
            show_face_box: config.show_face_box,
            sink: None,
        }
    }

    /// Registers the host callback notified when the output slot is written.
    pub fn with_sink(mut self, sink: OutputSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Processes one frame at timestamp `now`.
    ///
    /// Fails only when the surface cannot take the frame's dimensions.
    pub fn step(
        &mut self,
        state: SessionState,
        frame: &Frame,
        now: Duration,
        surface: &mut dyn DrawingSurface,
    ) -> Result<StepOutcome, SurfaceError> {
        let (width, height) = frame.dimensions();
        if surface.size() != (width, height) {
            surface.resize(width, height)?;
        }
        surface.draw_frame(frame);

        if state.is_latched() {
            return Ok(StepOutcome {
                progress: state.dwell.progress(),
                state,
                classification: ClassificationResult::absent(),
                detection: None,
                captured: None,
            });
        }

        let detection = self.detect(frame);
        let classification = detection
            .as_ref()
            .map(|d| classify(d, &self.thresholds))
            .unwrap_or_else(ClassificationResult::absent);
        if detection.is_some() {
            log::debug!(
                "frame {}: frontal={} (eye_dy={:.3}, nose={:.3}) centered={} (dx={:.3}, dy={:.3})",
                frame.index(),
                classification.is_frontal,
                classification.eye_diff_y,
                classification.nose_offset,
                classification.is_centered,
                classification.center_x_diff,
                classification.center_y_diff
            );
        }

        let (dwell, triggered) = dwell_accumulator::advance(
            state.dwell,
            classification.joint_condition_holds(),
            now,
            self.required_dwell,
        );
        let progress = dwell.progress();

        self.renderer.render(surface, width, height, progress);
        if self.show_face_box {
            if let Some(d) = &detection {
                self.renderer
                    .render_face_box(surface, &d.bounding_box, classification.is_frontal);
            }
        }

        let state = SessionState { dwell, ..state };
        if !triggered {
            return Ok(StepOutcome {
                state,
                progress,
                classification,
                detection,
                captured: None,
            });
        }

        let output = match self.encoder.encode(frame) {
            Ok(jpeg) => CaptureOutput::from_jpeg(&jpeg),
            Err(e) => {
                log::error!("Failed to encode capture at frame {}: {e}", frame.index());
                return Ok(StepOutcome {
                    state,
                    progress,
                    classification,
                    detection,
                    captured: None,
                });
            }
        };

        log::info!(
            "Captured frame {} after {:?} of dwell",
            frame.index(),
            self.required_dwell
        );
        if let Some(sink) = self.sink.as_mut() {
            sink(&output);
        }

        Ok(StepOutcome {
            state: state.latch(output.clone()),
            progress,
            classification,
            detection,
            captured: Some(output),
        })
    }

    fn detect(&mut self, frame: &Frame) -> Option<Detection> {
        match self.detector.detect(frame) {
            Ok(Some(d)) if d.is_well_formed() => Some(d),
            Ok(Some(d)) => {
                log::debug!(
                    "frame {}: ignoring detection with {} keypoints",
                    frame.index(),
                    d.keypoints.len()
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                None
            }
        }
    }
}
