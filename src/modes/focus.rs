use serde::{Deserialize, Serialize};
use std::fmt;

use super::invalid;
use crate::error::CameraError;
use crate::platform::FocusMode;

/// Autofocus behavior. `Locked` pins focus at the last converged distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoFocusMode {
    Locked,
    Continuous,
}

impl AutoFocusMode {
    pub fn from_host(value: i64) -> Result<Self, CameraError> {
        match value {
            0 => Ok(AutoFocusMode::Locked),
            1 => Ok(AutoFocusMode::Continuous),
            other => Err(invalid("autofocus mode", other)),
        }
    }

    pub fn host_value(self) -> i64 {
        match self {
            AutoFocusMode::Locked => 0,
            AutoFocusMode::Continuous => 1,
        }
    }

    pub fn focus_mode(self) -> FocusMode {
        match self {
            AutoFocusMode::Locked => FocusMode::Locked,
            AutoFocusMode::Continuous => FocusMode::ContinuousAutoFocus,
        }
    }
}

impl fmt::Display for AutoFocusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoFocusMode::Locked => f.write_str("locked"),
            AutoFocusMode::Continuous => f.write_str("continuous"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuous_maps_to_continuous_autofocus() {
        let mode = AutoFocusMode::from_host(1).unwrap();
        assert_eq!(mode.focus_mode(), FocusMode::ContinuousAutoFocus);
        assert_eq!(mode.focus_mode().raw(), 2);
        assert!(AutoFocusMode::from_host(2).is_err());
    }
}
