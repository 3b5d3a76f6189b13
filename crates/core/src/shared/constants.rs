/// File name looked up in the model cache and the bundled model directory.
pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Name of the per-user configuration directory and the model cache directory.
pub const APP_DIR_NAME: &str = "FaceCapture";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Frames with fewer keypoints than this cannot be classified.
pub const REQUIRED_KEYPOINTS: usize = 3;

pub const LEFT_EYE: usize = 0;
pub const RIGHT_EYE: usize = 1;
pub const NOSE_TIP: usize = 2;
