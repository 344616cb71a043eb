//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

use crate::session::{SessionSnapshot, SessionState};

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of session state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Whether the capture session is running.
    pub running: bool,
    /// Whether a video input is bound.
    pub input_bound: bool,
    /// Work items queued or scheduled on the session queue.
    pub queue_depth: usize,
    /// Still captures waiting for the framework.
    pub pending_captures: usize,
    pub configurations: u64,
    pub input_rejections: u64,
    pub lock_failures: u64,
    pub captures_completed: u64,
    pub captures_failed: u64,
    pub capture_timeouts: u64,
    pub runtime_errors: u64,
    pub recoveries: u64,
    pub fatal_errors: u64,
}

impl MetricsSnapshot {
    /// Creates a snapshot from a published session snapshot.
    pub fn from_session(session: &SessionSnapshot, queue_depth: usize) -> Self {
        let stats = &session.stats;
        Self {
            running: session.state == SessionState::Running,
            input_bound: session.bound_position.is_some(),
            queue_depth,
            pending_captures: session.pending_captures,
            configurations: stats.configurations,
            input_rejections: stats.input_rejections,
            lock_failures: stats.lock_failures,
            captures_completed: stats.captures_completed,
            captures_failed: stats.captures_failed,
            capture_timeouts: stats.capture_timeouts,
            runtime_errors: stats.runtime_errors,
            recoveries: stats.recoveries,
            fatal_errors: stats.fatal_errors,
        }
    }
}

/// Prometheus metrics registry for capture session monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    // Session gauges
    running: IntGauge,
    input_bound: IntGauge,
    queue_depth: IntGauge,
    pending_captures: IntGauge,

    // Configuration counters
    configurations: IntCounter,
    input_rejections: IntCounter,
    lock_failures: IntCounter,

    // Capture counters
    captures_completed: IntCounter,
    captures_failed: IntCounter,
    capture_timeouts: IntCounter,

    // Runtime error counters
    runtime_errors: IntCounter,
    recoveries: IntCounter,
    fatal_errors: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all session metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let running = IntGauge::new(
            "camera_session_running",
            "Capture session running (1=running, 0=not running)",
        )?;
        let input_bound = IntGauge::new(
            "camera_session_input_bound",
            "Video input bound to the session (1=bound, 0=none)",
        )?;
        let queue_depth = IntGauge::new(
            "camera_session_queue_depth",
            "Work items queued or scheduled on the session queue",
        )?;
        let pending_captures = IntGauge::new(
            "camera_session_pending_captures",
            "Still captures waiting for the capture framework",
        )?;

        let configurations = IntCounter::new(
            "camera_session_configurations_total",
            "Configuration changes applied to the session",
        )?;
        let input_rejections = IntCounter::new(
            "camera_session_input_rejections_total",
            "Camera switches rejected by the session",
        )?;
        let lock_failures = IntCounter::new(
            "camera_session_lock_failures_total",
            "Device configuration lock acquisitions that failed",
        )?;

        let captures_completed = IntCounter::new(
            "camera_session_captures_completed_total",
            "Still captures delivered to the host",
        )?;
        let captures_failed = IntCounter::new(
            "camera_session_captures_failed_total",
            "Still captures that failed",
        )?;
        let capture_timeouts = IntCounter::new(
            "camera_session_capture_timeouts_total",
            "Still captures that timed out",
        )?;

        let runtime_errors = IntCounter::new(
            "camera_session_runtime_errors_total",
            "Runtime errors reported by the capture framework",
        )?;
        let recoveries = IntCounter::new(
            "camera_session_recoveries_total",
            "Automatic restarts after a runtime error",
        )?;
        let fatal_errors = IntCounter::new(
            "camera_session_fatal_errors_total",
            "Runtime errors that stopped the session",
        )?;

        registry.register(Box::new(running.clone()))?;
        registry.register(Box::new(input_bound.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(pending_captures.clone()))?;
        registry.register(Box::new(configurations.clone()))?;
        registry.register(Box::new(input_rejections.clone()))?;
        registry.register(Box::new(lock_failures.clone()))?;
        registry.register(Box::new(captures_completed.clone()))?;
        registry.register(Box::new(captures_failed.clone()))?;
        registry.register(Box::new(capture_timeouts.clone()))?;
        registry.register(Box::new(runtime_errors.clone()))?;
        registry.register(Box::new(recoveries.clone()))?;
        registry.register(Box::new(fatal_errors.clone()))?;

        Ok(Self {
            registry,
            running,
            input_bound,
            queue_depth,
            pending_captures,
            configurations,
            input_rejections,
            lock_failures,
            captures_completed,
            captures_failed,
            capture_timeouts,
            runtime_errors,
            recoveries,
            fatal_errors,
        })
    }

    /// Updates all metrics from a snapshot of session state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.running.set(i64::from(snapshot.running));
        self.input_bound.set(i64::from(snapshot.input_bound));
        self.queue_depth.set(snapshot.queue_depth as i64);
        self.pending_captures.set(snapshot.pending_captures as i64);

        // Counters only move forward, by the difference to the snapshot.
        advance(&self.configurations, snapshot.configurations);
        advance(&self.input_rejections, snapshot.input_rejections);
        advance(&self.lock_failures, snapshot.lock_failures);
        advance(&self.captures_completed, snapshot.captures_completed);
        advance(&self.captures_failed, snapshot.captures_failed);
        advance(&self.capture_timeouts, snapshot.capture_timeouts);
        advance(&self.runtime_errors, snapshot.runtime_errors);
        advance(&self.recoveries, snapshot.recoveries);
        advance(&self.fatal_errors, snapshot.fatal_errors);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
