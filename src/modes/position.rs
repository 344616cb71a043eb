use serde::{Deserialize, Serialize};
use std::fmt;

use super::invalid;
use crate::error::CameraError;
use crate::platform::DevicePosition;

/// Which physical camera to bind.
///
/// Host encoding: `0 = Front`, `1 = Back`. The framework numbers them the
/// other way around, see [`CameraPosition::device_position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    Front,
    #[default]
    Back,
}

impl CameraPosition {
    pub fn from_host(value: i64) -> Result<Self, CameraError> {
        match value {
            0 => Ok(CameraPosition::Front),
            1 => Ok(CameraPosition::Back),
            other => Err(invalid("camera type", other)),
        }
    }

    pub fn host_value(self) -> i64 {
        match self {
            CameraPosition::Front => 0,
            CameraPosition::Back => 1,
        }
    }

    pub fn device_position(self) -> DevicePosition {
        match self {
            CameraPosition::Front => DevicePosition::Front,
            CameraPosition::Back => DevicePosition::Back,
        }
    }

    pub fn from_device_position(position: DevicePosition) -> Option<Self> {
        match position {
            DevicePosition::Front => Some(CameraPosition::Front),
            DevicePosition::Back => Some(CameraPosition::Back),
            DevicePosition::Unspecified => None,
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPosition::Front => f.write_str("front"),
            CameraPosition::Back => f.write_str("back"),
        }
    }
}
