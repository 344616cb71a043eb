//! Camera setting enumerations shared by the host and the native side.
//!
//! Each enumeration has a stable host integer encoding (`from_host` /
//! `host_value`) and a mapping onto the capture framework's constants.
//! Unknown host integers are rejected with [`CameraError::InvalidArgument`].

mod exposure;
mod flash;
mod focus;
mod position;
pub mod white_balance;

pub use exposure::{ExposureMode, ExposureParams};
pub use flash::FlashMode;
pub use focus::AutoFocusMode;
pub use position::CameraPosition;
pub use white_balance::WhiteBalancePreset;

use crate::error::CameraError;

fn invalid(setting: &str, value: i64) -> CameraError {
    CameraError::InvalidArgument(format!("{value} is not a valid {setting}"))
}
