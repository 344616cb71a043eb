//! Capture framework boundary.
//!
//! The session controller drives hardware exclusively through the traits in
//! this module. A real backend wraps the operating system's capture
//! framework; [`MockPlatform`] is a complete in-memory implementation used by
//! tests, the CLI and benchmarks.

mod mock;
mod types;

pub use mock::{CaptureEvent, MockDevice, MockPlatform};
pub use types::{
    DevicePosition, EncodedImage, ExposureRange, ExposureSetting, FlashSetting, FocusMode,
    MediaType, MetadataObject, StillSettings, TemperatureAndTint, TorchMode, WhiteBalanceGains,
    WhiteBalanceSetting,
};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::modes::white_balance;

/// Errors raised by the capture framework.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlatformError {
    #[error("device {0} is locked by another client")]
    LockUnavailable(String),
    #[error("device {0} is not locked for configuration")]
    NotLocked(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("failed to open device input: {0}")]
    InputOpenFailed(String),
    #[error("failed to create capture session: {0}")]
    SessionUnavailable(String),
    #[error("still capture failed: {0}")]
    CaptureFailed(String),
    #[error("media services were reset")]
    MediaServicesReset,
    #[error("session runtime error: {0}")]
    Runtime(String),
}

/// Callback receiving runtime errors from a running session.
pub type RuntimeErrorHandler = Arc<dyn Fn(PlatformError) + Send + Sync>;

/// Callback receiving metadata objects recognized by the session.
pub type MetadataHandler = Arc<dyn Fn(Vec<MetadataObject>) + Send + Sync>;

/// Callback completing an asynchronous still capture.
pub type StillCaptureCallback = Box<dyn FnOnce(Result<EncodedImage, PlatformError>) + Send>;

/// Registration handle for a runtime error observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(pub u64);

/// A physical capture device.
///
/// Devices are shared handles; mutating methods must only be called while
/// the configuration lock is held.
pub trait CaptureDevice: Send + Sync {
    fn unique_id(&self) -> &str;

    fn media_type(&self) -> MediaType;

    fn position(&self) -> DevicePosition;

    fn has_torch(&self) -> bool;

    fn has_flash(&self) -> bool;

    /// Attempts to take the exclusive configuration lock without blocking.
    fn try_lock_for_configuration(&self) -> Result<(), PlatformError>;

    fn unlock_for_configuration(&self);

    fn torch_mode(&self) -> TorchMode;

    fn set_torch_mode(&self, mode: TorchMode) -> Result<(), PlatformError>;

    fn is_focus_mode_supported(&self, mode: FocusMode) -> bool;

    fn focus_mode(&self) -> FocusMode;

    fn set_focus_mode(&self, mode: FocusMode) -> Result<(), PlatformError>;

    fn is_white_balance_mode_supported(&self, mode: WhiteBalanceSetting) -> bool;

    fn white_balance_mode(&self) -> WhiteBalanceSetting;

    fn set_white_balance_mode(&self, mode: WhiteBalanceSetting) -> Result<(), PlatformError>;

    /// Largest gain any channel accepts. The smallest is always 1.0.
    fn max_white_balance_gain(&self) -> f32;

    fn white_balance_gains(&self) -> WhiteBalanceGains;

    /// Locks white balance at the given gains.
    fn set_white_balance_gains_locked(&self, gains: WhiteBalanceGains)
        -> Result<(), PlatformError>;

    /// Converts a temperature/tint pair into device gains.
    ///
    /// Backends with a calibrated transform override this; the default uses
    /// a generic sRGB sensor model.
    fn gains_for_temperature_and_tint(&self, value: TemperatureAndTint) -> WhiteBalanceGains {
        white_balance::chromatic_adaptation_gains(value)
    }

    fn is_exposure_mode_supported(&self, mode: ExposureSetting) -> bool;

    fn exposure_mode(&self) -> ExposureSetting;

    fn set_exposure_mode(&self, mode: ExposureSetting) -> Result<(), PlatformError>;

    fn exposure_range(&self) -> ExposureRange;

    /// Switches to custom exposure with the given duration and ISO.
    fn set_custom_exposure(&self, duration: Duration, iso: f32) -> Result<(), PlatformError>;
}

/// Binding between a device and a session.
#[derive(Clone)]
pub struct DeviceInput {
    id: u64,
    device: Arc<dyn CaptureDevice>,
}

impl DeviceInput {
    pub fn new(id: u64, device: Arc<dyn CaptureDevice>) -> Self {
        Self { id, device }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> &Arc<dyn CaptureDevice> {
        &self.device
    }
}

impl std::fmt::Debug for DeviceInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInput")
            .field("id", &self.id)
            .field("device", &self.device.unique_id())
            .field("position", &self.device.position())
            .finish()
    }
}

/// Session sink producing one encoded frame per request.
pub trait StillImageOutput: Send + Sync {
    /// Flash recorded in the output's default capture settings.
    fn flash_mode(&self) -> FlashSetting;

    fn set_flash_mode(&self, mode: FlashSetting);

    /// Requests a frame. `callback` runs exactly once, on a framework thread,
    /// unless the framework stalls.
    fn capture_still(&self, settings: StillSettings, callback: StillCaptureCallback);
}

/// Rendering surface showing the session's live feed.
pub trait PreviewSurface: Send + Sync {
    fn connect(&self, session: &str);

    fn disconnect(&self);

    /// Label of the session currently feeding this surface.
    fn connected_session(&self) -> Option<String>;
}

/// Platform capture session routing frames from inputs to outputs.
pub trait CaptureSession: Send {
    fn label(&self) -> &str;

    fn begin_configuration(&mut self);

    fn commit_configuration(&mut self);

    fn can_add_input(&self, input: &DeviceInput) -> bool;

    fn add_input(&mut self, input: &DeviceInput);

    fn remove_input(&mut self, input: &DeviceInput);

    fn add_output(&mut self, output: Arc<dyn StillImageOutput>) -> Result<(), PlatformError>;

    fn attach_preview(&mut self, surface: &Arc<dyn PreviewSurface>);

    fn detach_preview(&mut self);

    fn start_running(&mut self);

    fn stop_running(&mut self);

    fn is_running(&self) -> bool;

    fn add_runtime_error_observer(&mut self, handler: RuntimeErrorHandler) -> ObserverToken;

    fn remove_runtime_error_observer(&mut self, token: ObserverToken);

    fn set_metadata_handler(&mut self, handler: Option<MetadataHandler>);
}

/// Entry point into a capture framework.
pub trait CapturePlatform: Send + Sync {
    fn devices_with_media_type(&self, media: MediaType) -> Vec<Arc<dyn CaptureDevice>>;

    fn create_session(&self) -> Result<Box<dyn CaptureSession>, PlatformError>;

    fn open_input(&self, device: &Arc<dyn CaptureDevice>) -> Result<DeviceInput, PlatformError>;

    fn create_still_image_output(&self) -> Arc<dyn StillImageOutput>;

    fn create_preview_layer(&self) -> Arc<dyn PreviewSurface>;
}
