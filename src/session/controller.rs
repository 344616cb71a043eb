//! Capture session controller.
//!
//! [`SessionController`] is owned by the session queue worker. Every method
//! runs on that worker; other threads only see the [`SessionSnapshot`]
//! written by [`SessionController::publish`] at the end of each work item.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::capture::PendingCapture;
use super::observer::ObserverArming;
use super::{
    DesiredSettings, EffectiveSettings, EventEmitter, SessionEvent, SessionSnapshot, SessionState,
    SessionStats,
};
use crate::config::ManagerConfig;
use crate::error::CameraError;
use crate::modes::CameraPosition;
use crate::platform::{
    CaptureDevice, CapturePlatform, CaptureSession, DeviceInput, FlashSetting, MediaType,
    MetadataObject, PlatformError, PreviewSurface, StillImageOutput, TorchMode,
};
use crate::queue::QueueHandle;

/// Receives metadata objects recognized by the running session.
pub type MetadataSink = Arc<dyn Fn(&[MetadataObject]) + Send + Sync>;

/// Runs `apply` inside a begin/commit configuration bracket.
pub fn configure<R>(
    session: &mut dyn CaptureSession,
    apply: impl FnOnce(&mut dyn CaptureSession) -> R,
) -> R {
    session.begin_configuration();
    let result = apply(&mut *session);
    session.commit_configuration();
    result
}

/// Owns the platform session, its video input and its still output.
pub struct SessionController {
    pub(super) platform: Arc<dyn CapturePlatform>,
    pub(super) config: ManagerConfig,
    pub(super) queue: QueueHandle<SessionController>,
    pub(super) preview: Arc<dyn PreviewSurface>,
    pub(super) session: Option<Box<dyn CaptureSession>>,
    pub(super) input: Option<DeviceInput>,
    pub(super) still_output: Option<Arc<dyn StillImageOutput>>,
    pub(super) preset_position: CameraPosition,
    pub(super) desired: DesiredSettings,
    pub(super) state: SessionState,
    pub(super) observer: Option<ObserverArming>,
    pub(super) next_generation: u64,
    pub(super) pending: HashMap<u64, PendingCapture>,
    pub(super) next_capture: u64,
    pub(super) stats: SessionStats,
    metadata_sink: Arc<RwLock<Option<MetadataSink>>>,
    events: EventEmitter,
    outbox: Vec<SessionEvent>,
    published: Arc<RwLock<SessionSnapshot>>,
}

impl SessionController {
    pub fn new(
        platform: Arc<dyn CapturePlatform>,
        config: ManagerConfig,
        preview: Arc<dyn PreviewSurface>,
        events: EventEmitter,
        published: Arc<RwLock<SessionSnapshot>>,
        queue: QueueHandle<SessionController>,
    ) -> Self {
        Self {
            platform,
            preset_position: config.default_position,
            config,
            queue,
            preview,
            session: None,
            input: None,
            still_output: None,
            desired: DesiredSettings::default(),
            state: SessionState::Uninitialized,
            observer: None,
            next_generation: 0,
            pending: HashMap::new(),
            next_capture: 0,
            stats: SessionStats::default(),
            metadata_sink: Arc::new(RwLock::new(None)),
            events,
            outbox: Vec::new(),
            published,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn preset_position(&self) -> CameraPosition {
        self.preset_position
    }

    /// Binds the camera at `position` and, once bound, records it as the
    /// preset position.
    pub fn set_camera_position(&mut self, position: CameraPosition) -> Result<(), CameraError> {
        self.ensure_live()?;
        self.initialize_input(position)?;
        self.preset_position = position;
        Ok(())
    }

    /// Binds the video device at `position`, replacing any current input.
    ///
    /// On rejection the previous input is restored before the error is
    /// returned, so exactly zero or one input is bound afterwards.
    pub fn initialize_input(&mut self, position: CameraPosition) -> Result<(), CameraError> {
        debug_assert!(self.queue.is_current());
        self.ensure_live()?;

        let device = self.device_for(position)?;
        if let Some(current) = &self.input {
            if current.device().unique_id() == device.unique_id() {
                debug!(%position, "Requested camera already bound");
                return Ok(());
            }
        }

        self.ensure_session()?;
        let input = self.platform.open_input(&device)?;
        let previous = self.input.take();
        if let Some(previous) = &previous {
            self.release_torch(previous.device().as_ref());
        }

        let Some(session) = self.session.as_deref_mut() else {
            self.input = previous;
            return Err(CameraError::Fatal("capture session missing".into()));
        };

        let bound = configure(session, |session| {
            if let Some(previous) = &previous {
                session.remove_input(previous);
            }
            if session.can_add_input(&input) {
                session.add_input(&input);
                true
            } else {
                if let Some(previous) = &previous {
                    session.add_input(previous);
                }
                false
            }
        });

        if !bound {
            self.input = previous;
            self.stats.input_rejections += 1;
            if let Some(device) = self.bound_device() {
                self.reapply_flash(device.as_ref());
            }
            warn!(
                %position,
                device = device.unique_id(),
                "Session rejected input; previous input restored"
            );
            return Err(CameraError::InputRejected(format!(
                "{position} camera {}",
                device.unique_id()
            )));
        }

        let switched = previous.is_some();
        self.input = Some(input);
        if switched {
            self.stats.input_switches += 1;
        }
        self.stats.configurations += 1;
        info!(
            %position,
            device = device.unique_id(),
            switched,
            "Video input bound"
        );

        self.reapply_desired();
        self.mark_configured();
        Ok(())
    }

    /// Starts the session, binding the preset camera first if needed.
    pub fn start_session(&mut self) -> Result<(), CameraError> {
        debug_assert!(self.queue.is_current());
        self.ensure_live()?;
        if self.state == SessionState::Running {
            debug!("Capture session already running");
            return Ok(());
        }

        if self.input.is_none() {
            self.initialize_input(self.preset_position)?;
        }
        self.arm_observer()?;

        let session = self.session_mut()?;
        session.start_running();
        self.transition(SessionState::Running);
        info!(position = ?self.bound_position(), "Capture session started");
        Ok(())
    }

    /// Stops the session. The input stays bound.
    pub fn stop_session(&mut self) -> Result<(), CameraError> {
        debug_assert!(self.queue.is_current());
        self.ensure_live()?;
        if self.state != SessionState::Running {
            debug!(state = %self.state, "Capture session not running");
            return Ok(());
        }

        self.revoke_observer();
        if let Some(session) = self.session.as_deref_mut() {
            session.stop_running();
        }
        self.transition(SessionState::Stopped);
        info!("Capture session stopped");
        Ok(())
    }

    /// Releases the session and everything attached to it.
    pub fn teardown(&mut self) -> Result<(), CameraError> {
        if self.state == SessionState::TornDown {
            return Ok(());
        }

        self.revoke_observer();
        if let Some(device) = self.bound_device() {
            self.release_torch(device.as_ref());
        }
        let input = self.input.take();
        if let Some(mut session) = self.session.take() {
            if session.is_running() {
                session.stop_running();
            }
            configure(session.as_mut(), |session| {
                if let Some(input) = &input {
                    session.remove_input(input);
                }
            });
            session.detach_preview();
            session.set_metadata_handler(None);
        }
        self.still_output = None;
        *self.metadata_sink.write() = None;
        self.fail_pending_captures(&CameraError::TornDown);
        self.transition(SessionState::TornDown);
        info!("Capture session torn down");
        Ok(())
    }

    /// Installs or removes the metadata sink.
    pub fn set_metadata_sink(&mut self, sink: Option<MetadataSink>) -> Result<(), CameraError> {
        self.ensure_live()?;
        debug!(installed = sink.is_some(), "Metadata sink updated");
        *self.metadata_sink.write() = sink;
        Ok(())
    }

    /// Builds a snapshot of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let device = self.bound_device();
        let effective = EffectiveSettings {
            still_flash: self.effective_still_flash(),
            torch: device
                .as_ref()
                .map(|d| d.torch_mode())
                .unwrap_or_default(),
            focus: device.as_ref().map(|d| d.focus_mode()),
            white_balance: device.as_ref().map(|d| d.white_balance_mode()),
            exposure: device.as_ref().map(|d| d.exposure_mode()),
        };

        SessionSnapshot {
            state: self.state,
            preset_position: self.preset_position,
            bound_position: self.bound_position(),
            device_id: device.map(|d| d.unique_id().to_string()),
            observer_armed: self.observer.is_some(),
            pending_captures: self.pending.len(),
            desired: self.desired,
            effective,
            stats: self.stats,
        }
    }

    /// Publishes the snapshot, then delivers events raised by this work item.
    pub fn publish(&mut self) {
        *self.published.write() = self.snapshot();
        for event in std::mem::take(&mut self.outbox) {
            self.events.emit(&event);
        }
    }

    pub(super) fn ensure_live(&self) -> Result<(), CameraError> {
        if self.state == SessionState::TornDown {
            return Err(CameraError::TornDown);
        }
        Ok(())
    }

    /// Creates the platform session on first use.
    pub(super) fn ensure_session(&mut self) -> Result<(), CameraError> {
        if self.session.is_some() {
            return Ok(());
        }

        let mut session = self.platform.create_session()?;
        let output = self.platform.create_still_image_output();
        let preview = &self.preview;
        configure(session.as_mut(), |session| {
            session.add_output(Arc::clone(&output))?;
            session.attach_preview(preview);
            Ok::<(), PlatformError>(())
        })?;

        let sink = Arc::clone(&self.metadata_sink);
        let events = self.events.clone();
        session.set_metadata_handler(Some(Arc::new(move |objects: Vec<MetadataObject>| {
            if let Some(sink) = sink.read().clone() {
                sink(&objects);
            }
            events.emit(&SessionEvent::MetadataObjects { objects });
        })));

        info!(session = session.label(), "Capture session created");
        self.session = Some(session);
        self.still_output = Some(output);
        Ok(())
    }

    pub(super) fn session_mut(&mut self) -> Result<&mut dyn CaptureSession, CameraError> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(CameraError::Fatal("capture session missing".into())),
        }
    }

    pub(super) fn still_output(&self) -> Result<Arc<dyn StillImageOutput>, CameraError> {
        self.still_output
            .clone()
            .ok_or_else(|| CameraError::Fatal("still image output missing".into()))
    }

    pub(super) fn bound_device(&self) -> Option<Arc<dyn CaptureDevice>> {
        self.input.as_ref().map(|input| Arc::clone(input.device()))
    }

    pub(super) fn bound_position(&self) -> Option<CameraPosition> {
        self.input
            .as_ref()
            .and_then(|input| CameraPosition::from_device_position(input.device().position()))
    }

    /// Flash the next still capture fires; torch forces it off.
    pub(super) fn effective_still_flash(&self) -> FlashSetting {
        let torch_lit = self
            .bound_device()
            .is_some_and(|device| device.has_torch() && device.torch_mode() == TorchMode::On);
        match &self.still_output {
            Some(_) if torch_lit => FlashSetting::Off,
            Some(output) => output.flash_mode(),
            None => FlashSetting::Off,
        }
    }

    fn device_for(&self, position: CameraPosition) -> Result<Arc<dyn CaptureDevice>, CameraError> {
        let devices = self.platform.devices_with_media_type(MediaType::Video);
        let wanted = position.device_position();
        if let Some(device) = devices.iter().find(|d| d.position() == wanted) {
            return Ok(Arc::clone(device));
        }

        match devices.into_iter().next() {
            Some(device) if self.config.allow_position_fallback => {
                warn!(
                    %position,
                    device = device.unique_id(),
                    "No camera at requested position; using first available"
                );
                Ok(device)
            }
            _ => Err(CameraError::DeviceUnavailable(format!(
                "no {position} camera"
            ))),
        }
    }

    /// Queues a state change event for the end of the work item.
    pub(super) fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(%from, %to, "Session state changed");
        self.outbox.push(SessionEvent::StateChanged { from, to });
    }

    pub(super) fn emit(&mut self, event: SessionEvent) {
        self.outbox.push(event);
    }

    /// Configuration mutations settle a non-running, bound session in
    /// `configured`.
    pub(super) fn mark_configured(&mut self) {
        let settled = matches!(
            self.state,
            SessionState::Uninitialized | SessionState::Stopped
        );
        if settled && self.input.is_some() {
            self.transition(SessionState::Configured);
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.state == SessionState::TornDown {
            return;
        }
        self.revoke_observer();
        if let Some(session) = self.session.as_deref_mut() {
            if session.is_running() {
                session.stop_running();
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("input", &self.input)
            .field("preset_position", &self.preset_position)
            .field("pending_captures", &self.pending.len())
            .finish()
    }
}
