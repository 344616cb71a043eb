//! Host-facing camera manager.
//!
//! [`CameraManager`] translates host requests into session queue work,
//! publishes the preview layer, and keeps a weak registry of the views that
//! display it.

mod facade;
mod host;
mod preview;
mod view;

pub use facade::CameraManager;
pub use host::{ExposureArgs, HostCall, HostCompletion, HostReply, HostResponse};
pub use preview::PreviewLayer;
pub use view::{CameraView, ViewRegistry};
