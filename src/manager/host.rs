//! Host bridge calls.
//!
//! The host speaks in small integers. A [`HostCall`] is the deserialized form
//! of one bridge invocation, for example
//! `{"method": "setFlashMode", "args": 3}`. [`CameraManager::dispatch`]
//! validates the integers before anything is queued, so an invalid value
//! fails synchronously and leaves the session untouched.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::CameraManager;
use crate::error::{CameraError, HostError};
use crate::modes::{
    AutoFocusMode, CameraPosition, ExposureMode, ExposureParams, FlashMode, WhiteBalancePreset,
};
use crate::queue::Completion;
use crate::session::{PictureOptions, PictureResult};

/// One host bridge invocation.
///
/// Serialized as `{"method": ..., "args": ...}`. On input, `args` may be
/// left out for calls that take none or whose argument has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "method",
    content = "args",
    rename_all = "camelCase",
    try_from = "RawHostCall"
)]
pub enum HostCall {
    SetType(i64),
    SetFlashMode(i64),
    SetAutoFocus(i64),
    SetWhiteBalance(i64),
    SetExposureMode(ExposureArgs),
    TakePicture(PictureOptions),
    Start,
    Stop,
}

const METHODS: &[&str] = &[
    "setType",
    "setFlashMode",
    "setAutoFocus",
    "setWhiteBalance",
    "setExposureMode",
    "takePicture",
    "start",
    "stop",
];

impl HostCall {
    pub fn method(&self) -> &'static str {
        match self {
            HostCall::SetType(_) => "setType",
            HostCall::SetFlashMode(_) => "setFlashMode",
            HostCall::SetAutoFocus(_) => "setAutoFocus",
            HostCall::SetWhiteBalance(_) => "setWhiteBalance",
            HostCall::SetExposureMode(_) => "setExposureMode",
            HostCall::TakePicture(_) => "takePicture",
            HostCall::Start => "start",
            HostCall::Stop => "stop",
        }
    }
}

/// Arguments of `setExposureMode`: a bare mode integer, or the mode with
/// custom exposure parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExposureArgs {
    Mode(i64),
    WithParams {
        mode: i64,
        #[serde(default)]
        params: Option<ExposureParams>,
    },
}

impl ExposureArgs {
    pub fn mode(&self) -> i64 {
        match *self {
            ExposureArgs::Mode(mode) | ExposureArgs::WithParams { mode, .. } => mode,
        }
    }

    pub fn params(&self) -> Option<ExposureParams> {
        match *self {
            ExposureArgs::Mode(_) => None,
            ExposureArgs::WithParams { params, .. } => params,
        }
    }
}

#[derive(Deserialize)]
struct RawHostCall {
    method: String,
    #[serde(default)]
    args: serde_json::Value,
}

impl TryFrom<RawHostCall> for HostCall {
    type Error = serde_json::Error;

    fn try_from(raw: RawHostCall) -> Result<Self, Self::Error> {
        use serde::de::Error as _;

        let args = raw.args;
        let call = match raw.method.as_str() {
            "setType" => HostCall::SetType(serde_json::from_value(args)?),
            "setFlashMode" => HostCall::SetFlashMode(serde_json::from_value(args)?),
            "setAutoFocus" => HostCall::SetAutoFocus(serde_json::from_value(args)?),
            "setWhiteBalance" => HostCall::SetWhiteBalance(serde_json::from_value(args)?),
            "setExposureMode" => HostCall::SetExposureMode(serde_json::from_value(args)?),
            "takePicture" if args.is_null() => HostCall::TakePicture(PictureOptions::default()),
            "takePicture" => HostCall::TakePicture(serde_json::from_value(args)?),
            "start" => HostCall::Start,
            "stop" => HostCall::Stop,
            other => return Err(serde_json::Error::unknown_variant(other, METHODS)),
        };
        Ok(call)
    }
}

/// Successful outcome of a host call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HostReply {
    Done,
    Picture(PictureResult),
}

/// Pending outcome of a dispatched host call.
#[derive(Debug)]
pub enum HostCompletion {
    Done(Completion<()>),
    Picture(Completion<PictureResult>),
}

impl HostCompletion {
    pub fn wait(self) -> Result<HostReply, CameraError> {
        match self {
            HostCompletion::Done(completion) => completion.wait().map(|()| HostReply::Done),
            HostCompletion::Picture(completion) => completion.wait().map(HostReply::Picture),
        }
    }

    /// Waits at most `timeout`. A picture still pending afterwards is a
    /// capture timeout; any other request is a request timeout.
    pub fn wait_timeout(self, timeout: Duration) -> Result<HostReply, CameraError> {
        match self {
            HostCompletion::Done(completion) => match completion.wait_timeout(timeout) {
                Ok(result) => result.map(|()| HostReply::Done),
                Err(_) => Err(CameraError::RequestTimeout(timeout)),
            },
            HostCompletion::Picture(completion) => match completion.wait_timeout(timeout) {
                Ok(result) => result.map(HostReply::Picture),
                Err(_) => Err(CameraError::CaptureTimeout(timeout)),
            },
        }
    }
}

/// Serialized answer to one host call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostResponse {
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<HostReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<HostError>,
}

impl HostResponse {
    pub fn new(method: &'static str, outcome: Result<HostReply, CameraError>) -> Self {
        match outcome {
            Ok(reply) => Self {
                method,
                result: Some(reply),
                error: None,
            },
            Err(error) => Self {
                method,
                result: None,
                error: Some(HostError::from(&error)),
            },
        }
    }
}

impl CameraManager {
    /// Validates and queues a host call.
    pub fn dispatch(&self, call: HostCall) -> Result<HostCompletion, CameraError> {
        tracing::debug!(method = call.method(), "Host call");
        let completion = match call {
            HostCall::SetType(value) => {
                HostCompletion::Done(self.set_camera_position(CameraPosition::from_host(value)?))
            }
            HostCall::SetFlashMode(value) => {
                HostCompletion::Done(self.set_flash_mode(FlashMode::from_host(value)?))
            }
            HostCall::SetAutoFocus(value) => {
                HostCompletion::Done(self.set_auto_focus(AutoFocusMode::from_host(value)?))
            }
            HostCall::SetWhiteBalance(value) => HostCompletion::Done(
                self.set_white_balance(WhiteBalancePreset::from_host(value)?),
            ),
            HostCall::SetExposureMode(args) => {
                let mode = ExposureMode::from_host(args.mode())?;
                let params = args.params();
                if let Some(params) = &params {
                    params.validate()?;
                }
                HostCompletion::Done(self.set_exposure_mode(mode, params))
            }
            HostCall::TakePicture(options) => {
                options.validate()?;
                HostCompletion::Picture(self.take_picture(options))
            }
            HostCall::Start => HostCompletion::Done(self.start()),
            HostCall::Stop => HostCompletion::Done(self.stop()),
        };
        Ok(completion)
    }

    /// Dispatches a call and waits for its outcome.
    pub fn call(&self, call: HostCall) -> HostResponse {
        let method = call.method();
        let outcome = self.dispatch(call).and_then(HostCompletion::wait);
        HostResponse::new(method, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_calls() {
        let call: HostCall = serde_json::from_str(r#"{"method":"setType","args":1}"#).unwrap();
        assert_eq!(call, HostCall::SetType(1));

        let call: HostCall =
            serde_json::from_str(r#"{"method":"setWhiteBalance","args":99}"#).unwrap();
        assert_eq!(call, HostCall::SetWhiteBalance(99));
    }

    #[test]
    fn test_parse_unit_and_struct_calls() {
        let call: HostCall = serde_json::from_str(r#"{"method":"start"}"#).unwrap();
        assert_eq!(call, HostCall::Start);

        let call: HostCall =
            serde_json::from_str(r#"{"method":"setExposureMode","args":{"mode":2}}"#).unwrap();
        assert_eq!(
            call,
            HostCall::SetExposureMode(ExposureArgs::WithParams {
                mode: 2,
                params: None
            })
        );

        let call: HostCall = serde_json::from_str(
            r#"{"method":"takePicture","args":{"quality":0.8,"base64":true}}"#,
        )
        .unwrap();
        match call {
            HostCall::TakePicture(options) => {
                assert_eq!(options.quality, Some(0.8));
                assert!(options.base64);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_parse_bare_exposure_mode() {
        let call: HostCall =
            serde_json::from_str(r#"{"method":"setExposureMode","args":2}"#).unwrap();
        assert_eq!(call, HostCall::SetExposureMode(ExposureArgs::Mode(2)));

        let HostCall::SetExposureMode(args) = call else {
            panic!("unexpected call {call:?}");
        };
        assert_eq!(args.mode(), 2);
        assert_eq!(args.params(), None);
    }

    #[test]
    fn test_parse_exposure_mode_with_params() {
        let call: HostCall = serde_json::from_str(
            r#"{"method":"setExposureMode","args":{"mode":2,"params":{"durationSeconds":0.02,"iso":400.0}}}"#,
        )
        .unwrap();
        let HostCall::SetExposureMode(args) = call else {
            panic!("unexpected call {call:?}");
        };
        assert_eq!(args.mode(), 2);
        assert!(args.params().is_some());
    }

    #[test]
    fn test_take_picture_args_are_optional() {
        let call: HostCall = serde_json::from_str(r#"{"method":"takePicture"}"#).unwrap();
        assert_eq!(call, HostCall::TakePicture(PictureOptions::default()));

        let call: HostCall =
            serde_json::from_str(r#"{"method":"takePicture","args":null}"#).unwrap();
        assert_eq!(call, HostCall::TakePicture(PictureOptions::default()));
    }

    #[test]
    fn test_call_round_trips_through_json() {
        let call = HostCall::SetExposureMode(ExposureArgs::Mode(1));
        let json = serde_json::to_string(&call).unwrap();
        assert_eq!(json, r#"{"method":"setExposureMode","args":1}"#);
        assert_eq!(serde_json::from_str::<HostCall>(&json).unwrap(), call);
    }

    #[test]
    fn test_missing_integer_args_rejected() {
        assert!(serde_json::from_str::<HostCall>(r#"{"method":"setFlashMode"}"#).is_err());
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(serde_json::from_str::<HostCall>(r#"{"method":"record"}"#).is_err());
    }

    #[test]
    fn test_wait_timeout_labels_by_request() {
        let (_setter, pending) = crate::queue::completion::<()>();
        let outcome = HostCompletion::Done(pending).wait_timeout(Duration::from_millis(10));
        assert!(matches!(outcome, Err(CameraError::RequestTimeout(_))));
        assert_eq!(
            outcome.unwrap_err().kind(),
            crate::error::ErrorKind::RequestTimeout
        );

        let (_capture, pending) = crate::queue::completion::<PictureResult>();
        let outcome = HostCompletion::Picture(pending).wait_timeout(Duration::from_millis(10));
        assert!(matches!(outcome, Err(CameraError::CaptureTimeout(_))));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = HostResponse::new(
            "setWhiteBalance",
            Err(CameraError::InvalidArgument("99 is not a valid white balance preset".into())),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["method"], "setWhiteBalance");
        assert_eq!(json["error"]["kind"], "invalidArgument");
        assert!(json.get("result").is_none());
    }
}
