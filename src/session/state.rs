use serde::{Deserialize, Serialize};
use std::fmt;

use crate::modes::{
    AutoFocusMode, CameraPosition, ExposureMode, ExposureParams, FlashMode, WhiteBalancePreset,
};
use crate::platform::{ExposureSetting, FlashSetting, FocusMode, TorchMode, WhiteBalanceSetting};

/// Lifecycle state of the capture session.
///
/// ```text
/// uninitialized → configured → running ⇄ stopped
///                      ↑__________________|
/// any → torn-down
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Configured,
    Running,
    Stopped,
    TornDown,
}

impl SessionState {
    pub fn is_running(self) -> bool {
        self == SessionState::Running
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Configured => "configured",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
            SessionState::TornDown => "torn-down",
        };
        f.write_str(name)
    }
}

/// Settings last requested by the host.
///
/// Recorded even while no device is bound and re-applied whenever a new
/// input is bound.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredSettings {
    pub flash: FlashMode,
    /// Last Off/On/Auto request; kept while the torch is requested.
    pub still_flash: FlashSetting,
    pub focus: Option<AutoFocusMode>,
    pub white_balance: Option<WhiteBalancePreset>,
    pub exposure: Option<ExposureMode>,
    pub exposure_params: Option<ExposureParams>,
}

/// Settings as read back from the bound device and still output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSettings {
    /// Flash the next still capture will fire.
    pub still_flash: FlashSetting,
    pub torch: TorchMode,
    pub focus: Option<FocusMode>,
    pub white_balance: Option<WhiteBalanceSetting>,
    pub exposure: Option<ExposureSetting>,
}

/// Monotonic session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub configurations: u64,
    pub input_switches: u64,
    pub input_rejections: u64,
    pub lock_failures: u64,
    pub captures_requested: u64,
    pub captures_completed: u64,
    pub captures_failed: u64,
    pub capture_timeouts: u64,
    pub runtime_errors: u64,
    pub recoveries: u64,
    pub fatal_errors: u64,
}

/// Consistent view of the session published at the end of each work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Position used when `start` finds no input bound.
    pub preset_position: CameraPosition,
    pub bound_position: Option<CameraPosition>,
    pub device_id: Option<String>,
    pub observer_armed: bool,
    pub pending_captures: usize,
    pub desired: DesiredSettings,
    pub effective: EffectiveSettings,
    pub stats: SessionStats,
}

impl SessionSnapshot {
    pub fn new(preset_position: CameraPosition) -> Self {
        Self {
            state: SessionState::Uninitialized,
            preset_position,
            bound_position: None,
            device_id: None,
            observer_armed: false,
            pending_captures: 0,
            desired: DesiredSettings::default(),
            effective: EffectiveSettings::default(),
            stats: SessionStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(SessionState::TornDown.to_string(), "torn-down");
        assert_eq!(
            serde_json::to_string(&SessionState::TornDown).unwrap(),
            "\"torn-down\""
        );
        assert!(SessionState::Running.is_running());
        assert!(!SessionState::Stopped.is_running());
    }

    #[test]
    fn test_initial_snapshot() {
        let snapshot = SessionSnapshot::new(CameraPosition::Front);
        assert_eq!(snapshot.state, SessionState::Uninitialized);
        assert_eq!(snapshot.bound_position, None);
        assert_eq!(snapshot.desired.flash, FlashMode::Off);
        assert_eq!(snapshot.stats, SessionStats::default());
    }
}
