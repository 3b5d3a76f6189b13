use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::face_classifier::ClassifierThresholds;
use crate::rendering::domain::target_zone::ZoneFractions;
use crate::shared::constants::{APP_DIR_NAME, CONFIG_FILE_NAME};

pub const DEFAULT_REQUIRED_DWELL_MS: u64 = 2000;
pub const DEFAULT_JPEG_QUALITY: f32 = 0.9;
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f64 = 0.7;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tuning constants for one capture session.
///
/// Every field has a default so partial JSON files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub thresholds: ClassifierThresholds,
    #[serde(default = "default_required_dwell_ms")]
    pub required_dwell_ms: u64,
    #[serde(default)]
    pub zone: ZoneFractions,
    /// Encoder quality in (0, 1].
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: f32,
    #[serde(default = "default_min_detection_confidence")]
    pub min_detection_confidence: f64,
    /// Outline the detector's bounding box, green when frontal and red otherwise.
    #[serde(default)]
    pub show_face_box: bool,
}

fn default_required_dwell_ms() -> u64 {
    DEFAULT_REQUIRED_DWELL_MS
}

fn default_jpeg_quality() -> f32 {
    DEFAULT_JPEG_QUALITY
}

fn default_min_detection_confidence() -> f64 {
    DEFAULT_MIN_DETECTION_CONFIDENCE
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            thresholds: ClassifierThresholds::default(),
            required_dwell_ms: DEFAULT_REQUIRED_DWELL_MS,
            zone: ZoneFractions::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            show_face_box: false,
        }
    }
}

impl CaptureConfig {
    /// Per-user config location, e.g. `~/.config/FaceCapture/config.json`.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the user config if present, otherwise the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::user_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (name, value) in [
            ("eye_level", t.eye_level),
            ("nose_offset", t.nose_offset),
            ("center_x", t.center_x),
            ("center_y", t.center_y),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "threshold {name} must be in (0, 1], got {value}"
                )));
            }
        }
        for (name, value) in [
            ("radius_x", self.zone.radius_x),
            ("radius_y", self.zone.radius_y),
        ] {
            if !(value > 0.0 && value <= 0.5) {
                return Err(ConfigError::Invalid(format!(
                    "zone {name} must be in (0, 0.5], got {value}"
                )));
            }
        }
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be in (0, 1], got {}",
                self.jpeg_quality
            )));
        }
        if !(0.0..=1.0).contains(&self.min_detection_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_detection_confidence must be in [0, 1], got {}",
                self.min_detection_confidence
            )));
        }
        Ok(())
    }

    pub fn required_dwell(&self) -> Duration {
        Duration::from_millis(self.required_dwell_ms)
    }

    /// Encoder quality as the 1..=100 scale used by JPEG encoders.
    pub fn jpeg_quality_percent(&self) -> u8 {
        (self.jpeg_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}
