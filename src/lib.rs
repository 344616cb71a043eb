//! Camera Session Library
//!
//! A camera manager that exposes a platform capture pipeline to an embedding
//! host. Host requests arrive from arbitrary threads as small integers; the
//! manager validates them, serializes them onto a single session queue, and
//! drives the capture session through a strict lifecycle:
//!
//! ```text
//! uninitialized → configured → running ⇄ stopped → torn-down
//! ```
//!
//! # Architecture
//!
//! ```text
//! host → manager (validate, translate) → queue (FIFO, one worker)
//!                                            ↓
//!                                      session controller → platform
//!                                            ↓
//!                                 snapshot / events → host
//! ```
//!
//! # Design Principles
//!
//! - **Single writer**: the session controller is owned by the queue worker
//! - **Bracketed changes**: every session mutation sits between begin/commit
//! - **Non-blocking host calls**: results arrive through completions
//! - **Bounded recovery**: one automatic restart per observer arming
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use camera_session::{
//!     CameraManager, CameraPosition, FlashMode, ManagerConfig, MockPlatform, PictureOptions,
//! };
//!
//! let manager = CameraManager::new(Arc::new(MockPlatform::new()), ManagerConfig::default())
//!     .expect("manager");
//!
//! manager.set_camera_position(CameraPosition::Back);
//! manager.set_flash_mode(FlashMode::Auto);
//! manager.start().wait().expect("start");
//!
//! let picture = manager
//!     .take_picture(PictureOptions::with_quality(0.8))
//!     .wait()
//!     .expect("picture");
//! println!("{}x{} {:?}", picture.width, picture.height, picture.uri);
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod modes;
pub mod platform;
pub mod queue;
pub mod session;

// Re-export commonly used types at crate root
pub use config::{ConfigError, FileConfig, ManagerConfig};
pub use error::{CameraError, ErrorKind, HostError};
pub use manager::{
    CameraManager, CameraView, ExposureArgs, HostCall, HostReply, HostResponse, PreviewLayer,
};
pub use modes::{
    AutoFocusMode, CameraPosition, ExposureMode, ExposureParams, FlashMode, WhiteBalancePreset,
};
pub use platform::{CapturePlatform, MockPlatform, PlatformError};
pub use queue::{Completion, SerialQueue};
pub use session::{PictureOptions, PictureResult, SessionEvent, SessionSnapshot, SessionState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
