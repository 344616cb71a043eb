//! Prometheus metrics exporter for capture session monitoring.
//!
//! # Metrics Exposed
//!
//! ## Session
//! - `camera_session_running` - Session running (1) or not (0)
//! - `camera_session_input_bound` - Video input bound (1) or not (0)
//! - `camera_session_queue_depth` - Work items on the session queue
//! - `camera_session_pending_captures` - Still captures in flight
//!
//! ## Configuration
//! - `camera_session_configurations_total`
//! - `camera_session_input_rejections_total`
//! - `camera_session_lock_failures_total`
//!
//! ## Capture
//! - `camera_session_captures_completed_total`
//! - `camera_session_captures_failed_total`
//! - `camera_session_capture_timeouts_total`
//!
//! ## Runtime errors
//! - `camera_session_runtime_errors_total`
//! - `camera_session_recoveries_total`
//! - `camera_session_fatal_errors_total`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use camera_session::{CameraManager, ManagerConfig, MockPlatform};
//! use camera_session::metrics::MetricsRegistry;
//!
//! let manager = CameraManager::new(Arc::new(MockPlatform::new()), ManagerConfig::in_memory())
//!     .expect("manager");
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.update(&manager.metrics_snapshot());
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
