use base64::Engine;

/// Scheme and media type in front of every published image, as produced by
/// a browser canvas `toDataURL("image/jpeg", quality)`.
pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// The single output slot of a capture session.
///
/// Starts empty and is written exactly once, when capture fires.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptureOutput {
    /// JPEG of the raw frame (no overlay) as a `data:image/jpeg;base64,` URL.
    pub image_base64: String,
    pub face_detected: bool,
}

impl CaptureOutput {
    pub fn captured(image_base64: String) -> Self {
        Self {
            image_base64,
            face_detected: true,
        }
    }

    /// Publishes encoded JPEG bytes as a data URL.
    pub fn from_jpeg(jpeg: &[u8]) -> Self {
        let payload = base64::engine::general_purpose::STANDARD.encode(jpeg);
        Self::captured(format!("{JPEG_DATA_URL_PREFIX}{payload}"))
    }

    pub fn is_empty(&self) -> bool {
        !self.face_detected && self.image_base64.is_empty()
    }

    /// The base64 text after the data URL header. Bare payloads pass through.
    pub fn payload(&self) -> &str {
        self.image_base64
            .strip_prefix(JPEG_DATA_URL_PREFIX)
            .unwrap_or(&self.image_base64)
    }

    /// Raw JPEG bytes behind `image_base64`.
    pub fn image_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.payload())
    }
}

/// Host change-notification callback, invoked once at the moment of capture.
pub type OutputSink = Box<dyn FnMut(&CaptureOutput) + Send>;
