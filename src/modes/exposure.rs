use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::invalid;
use crate::error::CameraError;
use crate::platform::ExposureSetting;

/// Exposure behavior requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureMode {
    Locked,
    Continuous,
    /// Uses externally supplied [`ExposureParams`].
    Custom,
}

impl ExposureMode {
    pub fn from_host(value: i64) -> Result<Self, CameraError> {
        match value {
            0 => Ok(ExposureMode::Locked),
            1 => Ok(ExposureMode::Continuous),
            2 => Ok(ExposureMode::Custom),
            other => Err(invalid("exposure mode", other)),
        }
    }

    pub fn host_value(self) -> i64 {
        match self {
            ExposureMode::Locked => 0,
            ExposureMode::Continuous => 1,
            ExposureMode::Custom => 2,
        }
    }

    pub fn exposure_setting(self) -> ExposureSetting {
        match self {
            ExposureMode::Locked => ExposureSetting::Locked,
            ExposureMode::Continuous => ExposureSetting::ContinuousAutoExposure,
            ExposureMode::Custom => ExposureSetting::Custom,
        }
    }
}

impl fmt::Display for ExposureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExposureMode::Locked => f.write_str("locked"),
            ExposureMode::Continuous => f.write_str("continuous"),
            ExposureMode::Custom => f.write_str("custom"),
        }
    }
}

/// Shutter duration and sensor sensitivity for custom exposure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureParams {
    pub duration_seconds: f64,
    pub iso: f32,
}

impl ExposureParams {
    pub fn new(duration: Duration, iso: f32) -> Self {
        Self {
            duration_seconds: duration.as_secs_f64(),
            iso,
        }
    }

    /// Shutter duration; unrepresentable values collapse to zero.
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_seconds).unwrap_or(Duration::ZERO)
    }

    /// Rejects non-finite or non-positive values.
    pub fn validate(&self) -> Result<(), CameraError> {
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(CameraError::InvalidArgument(format!(
                "exposure duration {} must be a positive number of seconds",
                self.duration_seconds
            )));
        }
        if !self.iso.is_finite() || self.iso <= 0.0 {
            return Err(CameraError::InvalidArgument(format!(
                "ISO {} must be positive",
                self.iso
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_mapping() {
        assert_eq!(ExposureMode::from_host(1).unwrap().exposure_setting().raw(), 2);
        assert_eq!(ExposureMode::from_host(2).unwrap().exposure_setting().raw(), 3);
        assert!(ExposureMode::from_host(3).is_err());
    }

    #[test]
    fn test_params_validation() {
        assert!(ExposureParams::new(Duration::from_millis(20), 400.0)
            .validate()
            .is_ok());

        let negative = ExposureParams {
            duration_seconds: -1.0,
            iso: 100.0,
        };
        assert!(negative.validate().is_err());

        let nan_iso = ExposureParams {
            duration_seconds: 0.01,
            iso: f32::NAN,
        };
        assert!(nan_iso.validate().is_err());
    }
}
