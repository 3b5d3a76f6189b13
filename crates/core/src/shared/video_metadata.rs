use std::path::PathBuf;

/// Properties of an opened frame source.
///
/// `fps` is 0 for live devices that do not advertise a rate; callers then
/// fall back to wall-clock timestamps.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    pub fn has_frame_rate(&self) -> bool {
        self.fps > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(fps: f64) -> VideoMetadata {
        VideoMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames: 100,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/selfie.mp4")),
        }
    }

    #[test]
    fn test_recorded_source_has_frame_rate() {
        assert!(metadata(29.97).has_frame_rate());
    }

    #[test]
    fn test_live_source_has_no_frame_rate() {
        assert!(!metadata(0.0).has_frame_rate());
    }

    #[test]
    fn test_clone_is_equal() {
        let meta = metadata(30.0);
        assert_eq!(meta.clone(), meta);
    }
}
