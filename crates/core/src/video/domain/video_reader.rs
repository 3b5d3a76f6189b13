use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// The frame source a capture session pulls from.
///
/// Implementations own acquisition details (container, codec, device
/// negotiation); a session only sees decoded `Frame`s in display order.
pub trait VideoReader: Send {
    /// Opens a file or device and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Frames in decode order. Live sources yield until closed or exhausted.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases the source. Safe to call more than once.
    fn close(&mut self);
}
