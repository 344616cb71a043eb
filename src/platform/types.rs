//! Platform-level constants and value types.
//!
//! Raw values follow the capture framework's own encodings, which differ
//! from the integers the host uses.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kind of media a device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
}

/// Physical placement of a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum DevicePosition {
    Unspecified = 0,
    Back = 1,
    Front = 2,
}

/// Still-capture flash setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i64)]
pub enum FlashSetting {
    #[default]
    Off = 0,
    On = 1,
    Auto = 2,
}

/// Continuous illuminator setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i64)]
pub enum TorchMode {
    #[default]
    Off = 0,
    On = 1,
    Auto = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum FocusMode {
    Locked = 0,
    AutoFocus = 1,
    ContinuousAutoFocus = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum ExposureSetting {
    Locked = 0,
    AutoExpose = 1,
    ContinuousAutoExposure = 2,
    Custom = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum WhiteBalanceSetting {
    Locked = 0,
    AutoWhiteBalance = 1,
    ContinuousAutoWhiteBalance = 2,
}

macro_rules! raw_value {
    ($($ty:ty),*) => {
        $(impl $ty {
            /// Returns the framework's raw value for this constant.
            #[inline]
            pub fn raw(self) -> i64 {
                self as i64
            }
        })*
    };
}

raw_value!(
    DevicePosition,
    FlashSetting,
    TorchMode,
    FocusMode,
    ExposureSetting,
    WhiteBalanceSetting
);

/// Per-channel white balance gains in device units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhiteBalanceGains {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl WhiteBalanceGains {
    pub fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Unity gains on every channel.
    pub fn unity() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub fn max_channel(&self) -> f32 {
        self.red.max(self.green).max(self.blue)
    }

    pub fn min_channel(&self) -> f32 {
        self.red.min(self.green).min(self.blue)
    }

    /// Multiplies every channel by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.red * factor, self.green * factor, self.blue * factor)
    }
}

/// Correlated color temperature (Kelvin) and green-magenta tint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureAndTint {
    pub temperature: f32,
    pub tint: f32,
}

/// Custom exposure limits supported by a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureRange {
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub min_iso: f32,
    pub max_iso: f32,
}

impl ExposureRange {
    /// Clamps a requested duration and ISO into the supported range.
    pub fn clamp(&self, duration: Duration, iso: f32) -> (Duration, f32) {
        (
            duration.clamp(self.min_duration, self.max_duration),
            iso.clamp(self.min_iso, self.max_iso),
        )
    }
}

impl Default for ExposureRange {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_micros(100),
            max_duration: Duration::from_millis(500),
            min_iso: 32.0,
            max_iso: 3200.0,
        }
    }
}

/// Settings applied to a single still capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StillSettings {
    pub flash: FlashSetting,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

/// Encoded still image delivered by the framework.
#[derive(Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A machine-readable code reported by the session's metadata output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataObject {
    /// Symbology reported by the framework, e.g. `org.iso.QRCode`.
    pub kind: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_values_match_framework() {
        assert_eq!(DevicePosition::Back.raw(), 1);
        assert_eq!(DevicePosition::Front.raw(), 2);
        assert_eq!(FocusMode::ContinuousAutoFocus.raw(), 2);
        assert_eq!(ExposureSetting::Custom.raw(), 3);
        assert_eq!(FlashSetting::Auto.raw(), 2);
    }

    #[test]
    fn test_exposure_range_clamp() {
        let range = ExposureRange::default();
        let (duration, iso) = range.clamp(Duration::from_secs(2), 10.0);
        assert_eq!(duration, range.max_duration);
        assert_eq!(iso, range.min_iso);
    }
}
