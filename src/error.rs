//! Error taxonomy surfaced to the host.
//!
//! Every failure originates inside a session queue work item and travels back
//! through the completion of the request that caused it. Runtime failures with
//! no originating request are reported as session events instead.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::platform::PlatformError;
use crate::queue::QueueError;

/// Errors reported by the camera manager.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CameraError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no video device available: {0}")]
    DeviceUnavailable(String),
    #[error("session rejected input for {0}; previous input kept")]
    InputRejected(String),
    #[error("could not lock device for configuration: {0}")]
    DeviceLocked(String),
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),
    #[error("custom exposure requested without parameters; continuous exposure applied")]
    ExposureParamsMissing,
    #[error("still capture did not complete within {0:?}")]
    CaptureTimeout(Duration),
    #[error("request did not settle within {0:?}")]
    RequestTimeout(Duration),
    #[error("unrecoverable session error: {0}")]
    Fatal(String),
    #[error("capture session is not running")]
    NotRunning,
    #[error("still capture failed: {0}")]
    CaptureFailed(String),
    #[error("failed to store picture: {0}")]
    Storage(String),
    #[error("camera session has been torn down")]
    TornDown,
    #[error("session queue is closed")]
    QueueClosed,
}

/// Stable tag identifying an error class across the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidArgument,
    DeviceUnavailable,
    InputRejected,
    DeviceLocked,
    UnsupportedMode,
    ExposureParamsMissing,
    CaptureTimeout,
    RequestTimeout,
    Fatal,
    NotRunning,
    CaptureFailed,
    Storage,
    TornDown,
    QueueClosed,
}

impl CameraError {
    /// Returns the host-facing tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CameraError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            CameraError::InputRejected(_) => ErrorKind::InputRejected,
            CameraError::DeviceLocked(_) => ErrorKind::DeviceLocked,
            CameraError::UnsupportedMode(_) => ErrorKind::UnsupportedMode,
            CameraError::ExposureParamsMissing => ErrorKind::ExposureParamsMissing,
            CameraError::CaptureTimeout(_) => ErrorKind::CaptureTimeout,
            CameraError::RequestTimeout(_) => ErrorKind::RequestTimeout,
            CameraError::Fatal(_) => ErrorKind::Fatal,
            CameraError::NotRunning => ErrorKind::NotRunning,
            CameraError::CaptureFailed(_) => ErrorKind::CaptureFailed,
            CameraError::Storage(_) => ErrorKind::Storage,
            CameraError::TornDown => ErrorKind::TornDown,
            CameraError::QueueClosed => ErrorKind::QueueClosed,
        }
    }

    /// Returns true if the session was stopped because of this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CameraError::Fatal(_))
    }

    /// Returns true for reports where the request was still (partly) honored
    /// and the session state is unaffected.
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            CameraError::UnsupportedMode(_) | CameraError::ExposureParamsMissing
        )
    }
}

impl From<PlatformError> for CameraError {
    fn from(error: PlatformError) -> Self {
        match error {
            PlatformError::LockUnavailable(device) => CameraError::DeviceLocked(device),
            PlatformError::NotLocked(device) => {
                CameraError::DeviceLocked(format!("{device} mutated without lock"))
            }
            PlatformError::Unsupported(what) => CameraError::UnsupportedMode(what),
            PlatformError::InputOpenFailed(reason) => CameraError::DeviceUnavailable(reason),
            PlatformError::CaptureFailed(reason) => CameraError::CaptureFailed(reason),
            other => CameraError::Fatal(other.to_string()),
        }
    }
}

impl From<QueueError> for CameraError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::Closed(_) => CameraError::QueueClosed,
            QueueError::Spawn(..) => CameraError::Fatal(error.to_string()),
        }
    }
}

/// Tagged error value handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CameraError> for HostError {
    fn from(error: &CameraError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_errors_map_to_taxonomy() {
        let locked: CameraError = PlatformError::LockUnavailable("back".into()).into();
        assert_eq!(locked.kind(), ErrorKind::DeviceLocked);

        let unsupported: CameraError = PlatformError::Unsupported("torch".into()).into();
        assert_eq!(unsupported.kind(), ErrorKind::UnsupportedMode);

        let reset: CameraError = PlatformError::MediaServicesReset.into();
        assert!(reset.is_fatal());
    }

    #[test]
    fn test_host_error_serializes_tag() {
        let host = HostError::from(&CameraError::InvalidArgument("white balance 99".into()));
        let json = serde_json::to_string(&host).unwrap();
        assert!(json.contains("\"kind\":\"invalidArgument\""));
        assert!(json.contains("white balance 99"));
    }

    #[test]
    fn test_advisory_errors() {
        assert!(CameraError::ExposureParamsMissing.is_advisory());
        assert!(CameraError::UnsupportedMode("focus".into()).is_advisory());
        assert!(!CameraError::DeviceLocked("back".into()).is_advisory());
        assert!(!CameraError::ExposureParamsMissing.is_fatal());
    }
}
