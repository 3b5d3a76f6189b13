use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for the external face detector.
///
/// Returns the single highest-confidence face, or `None` when no face is
/// visible. Implementations may hold inference sessions, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Detection>, Box<dyn std::error::Error>>;
}
