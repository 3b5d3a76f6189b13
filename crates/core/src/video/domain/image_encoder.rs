use crate::shared::frame::Frame;

/// Compresses a frame into an image file format held in memory.
pub trait ImageEncoder: Send {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>>;
}
