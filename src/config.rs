//! Camera manager configuration.
//!
//! Loaded from a TOML file with a `[manager]` table for the session and an
//! `[output]` table for the CLI's reporting surfaces. Every field has a
//! default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::modes::CameraPosition;

/// Configuration for a [`CameraManager`](crate::CameraManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name of the session queue worker thread.
    pub queue_label: String,
    /// Time a still capture may take before it fails with a timeout.
    pub capture_timeout_ms: u64,
    /// Camera bound by `start` when none was selected.
    pub default_position: CameraPosition,
    /// JPEG quality used when a picture request does not specify one.
    pub default_quality: f32,
    /// Directory captured pictures are written to. `None` disables storage.
    pub photo_dir: Option<PathBuf>,
    /// Bind the first available camera when none sits at the requested
    /// position.
    pub allow_position_fallback: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            queue_label: "camera.session".to_string(),
            capture_timeout_ms: 5_000,
            default_position: CameraPosition::Back,
            default_quality: 1.0,
            photo_dir: default_photo_dir(),
            allow_position_fallback: false,
        }
    }
}

/// `<cache dir>/camera-session/Camera`, if the platform has a cache dir.
pub fn default_photo_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("camera-session").join("Camera"))
}

impl ManagerConfig {
    /// Creates a configuration that keeps pictures in memory only.
    pub fn in_memory() -> Self {
        Self {
            photo_dir: None,
            ..Default::default()
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_label.trim().is_empty() {
            return Err(ConfigError::InvalidQueueLabel);
        }
        if self.capture_timeout_ms == 0 || self.capture_timeout_ms > 60_000 {
            return Err(ConfigError::InvalidCaptureTimeout(self.capture_timeout_ms));
        }
        if !(0.0..=1.0).contains(&self.default_quality) {
            return Err(ConfigError::InvalidQuality(self.default_quality));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("queue label must not be empty")]
    InvalidQueueLabel,
    #[error("invalid capture timeout {0} ms (must be 1-60000)")]
    InvalidCaptureTimeout(u64),
    #[error("invalid default quality {0} (must be 0.0-1.0)")]
    InvalidQuality(f32),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
    /// Print session snapshots as JSON instead of log lines.
    pub json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            json: false,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.manager.validate()?;
        Ok(config)
    }
}
