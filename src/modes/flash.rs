use serde::{Deserialize, Serialize};
use std::fmt;

use super::invalid;
use crate::error::CameraError;
use crate::platform::FlashSetting;

/// Flash behavior requested by the host.
///
/// `Off`, `On` and `Auto` apply when a still is captured. `Torch` keeps the
/// illuminator lit continuously and suppresses the still-capture flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
    Torch,
}

impl FlashMode {
    pub fn from_host(value: i64) -> Result<Self, CameraError> {
        match value {
            0 => Ok(FlashMode::Off),
            1 => Ok(FlashMode::On),
            2 => Ok(FlashMode::Auto),
            3 => Ok(FlashMode::Torch),
            other => Err(invalid("flash mode", other)),
        }
    }

    pub fn host_value(self) -> i64 {
        match self {
            FlashMode::Off => 0,
            FlashMode::On => 1,
            FlashMode::Auto => 2,
            FlashMode::Torch => 3,
        }
    }

    /// Still-capture flash for this mode, `None` for torch.
    pub fn still_flash(self) -> Option<FlashSetting> {
        match self {
            FlashMode::Off => Some(FlashSetting::Off),
            FlashMode::On => Some(FlashSetting::On),
            FlashMode::Auto => Some(FlashSetting::Auto),
            FlashMode::Torch => None,
        }
    }

    pub fn is_torch(self) -> bool {
        self == FlashMode::Torch
    }
}

impl fmt::Display for FlashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlashMode::Off => "off",
            FlashMode::On => "on",
            FlashMode::Auto => "auto",
            FlashMode::Torch => "torch",
        };
        f.write_str(name)
    }
}
