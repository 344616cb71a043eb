use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use super::{CameraView, PreviewLayer, ViewRegistry};
use crate::config::ManagerConfig;
use crate::error::CameraError;
use crate::metrics::MetricsSnapshot;
use crate::modes::{
    AutoFocusMode, CameraPosition, ExposureMode, ExposureParams, FlashMode, WhiteBalancePreset,
};
use crate::platform::CapturePlatform;
use crate::queue::{completion, Completion, SerialQueue};
use crate::session::{
    EventEmitter, EventListener, MetadataSink, PictureOptions, PictureResult, SessionController,
    SessionSnapshot, SessionState, Subscription,
};

/// Thread-safe entry point for the host.
///
/// Every operation returns immediately. Work that touches the capture
/// session is queued on the session queue, and its outcome is delivered
/// through the returned [`Completion`]. Requests from one thread are applied
/// in the order they were made.
pub struct CameraManager {
    queue: SerialQueue<SessionController>,
    preview: PreviewLayer,
    published: Arc<RwLock<SessionSnapshot>>,
    events: EventEmitter,
    views: ViewRegistry,
    config: ManagerConfig,
}

impl CameraManager {
    /// Creates the manager, its preview layer and its session queue.
    ///
    /// The capture session itself is created lazily by the first request
    /// that needs it.
    pub fn new(
        platform: Arc<dyn CapturePlatform>,
        config: ManagerConfig,
    ) -> Result<Self, CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::InvalidArgument(e.to_string()))?;

        let surface = platform.create_preview_layer();
        let published = Arc::new(RwLock::new(SessionSnapshot::new(config.default_position)));
        let events = EventEmitter::default();

        let queue = {
            let surface = Arc::clone(&surface);
            let published = Arc::clone(&published);
            let events = events.clone();
            let config = config.clone();
            SerialQueue::spawn(config.queue_label.clone(), move |handle| {
                SessionController::new(platform, config, surface, events, published, handle)
            })?
        };

        info!(
            queue = %config.queue_label,
            position = %config.default_position,
            photo_dir = ?config.photo_dir,
            "Camera manager created"
        );

        Ok(Self {
            queue,
            preview: PreviewLayer::new(surface),
            published,
            events,
            views: ViewRegistry::default(),
            config,
        })
    }

    /// Selects the camera and binds it to the session.
    pub fn set_camera_position(&self, position: CameraPosition) -> Completion<()> {
        self.enqueue("setType", move |c| c.set_camera_position(position))
    }

    pub fn set_flash_mode(&self, mode: FlashMode) -> Completion<()> {
        self.enqueue("setFlashMode", move |c| c.set_flash_mode(mode))
    }

    pub fn set_auto_focus(&self, mode: AutoFocusMode) -> Completion<()> {
        self.enqueue("setAutoFocus", move |c| c.set_auto_focus(mode))
    }

    pub fn set_white_balance(&self, preset: WhiteBalancePreset) -> Completion<()> {
        self.enqueue("setWhiteBalance", move |c| c.set_white_balance(preset))
    }

    pub fn set_exposure_mode(
        &self,
        mode: ExposureMode,
        params: Option<ExposureParams>,
    ) -> Completion<()> {
        if let Some(Err(error)) = params.as_ref().map(ExposureParams::validate) {
            return Completion::ready(Err(error));
        }
        self.enqueue("setExposureMode", move |c| c.set_exposure_mode(mode, params))
    }

    /// Captures one still picture with the current settings.
    pub fn take_picture(&self, options: PictureOptions) -> Completion<PictureResult> {
        if let Err(error) = options.validate() {
            return Completion::ready(Err(error));
        }
        let (completer, completion) = completion();
        let submitted = self.queue.submit(move |controller: &mut SessionController| {
            controller.capture_still(options, completer);
            controller.publish();
        });
        match submitted {
            Ok(()) => completion,
            Err(error) => Completion::ready(Err(error.into())),
        }
    }

    pub fn start(&self) -> Completion<()> {
        self.enqueue("start", |c| c.start_session())
    }

    pub fn stop(&self) -> Completion<()> {
        self.enqueue("stop", |c| c.stop_session())
    }

    /// Releases the capture session. Later requests fail with
    /// [`CameraError::TornDown`].
    pub fn teardown(&self) -> Completion<()> {
        self.enqueue("teardown", |c| c.teardown())
    }

    pub fn set_metadata_sink(&self, sink: Option<MetadataSink>) -> Completion<()> {
        self.enqueue("setMetadataSink", move |c| c.set_metadata_sink(sink))
    }

    /// Resolves once every request queued before it has been applied.
    pub fn flush(&self) -> Completion<()> {
        self.enqueue("flush", |_| Ok(()))
    }

    pub fn preview_layer(&self) -> PreviewLayer {
        self.preview.clone()
    }

    /// Last published session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.published.read().clone()
    }

    pub fn state(&self) -> SessionState {
        self.published.read().state
    }

    pub fn subscribe(&self, listener: EventListener) -> Subscription {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.events.unsubscribe(subscription)
    }

    /// Installs the preview layer on `view` and remembers it under `tag`.
    pub fn attach_view(&self, tag: i64, view: &Arc<dyn CameraView>) {
        self.views.attach(tag, view, self.preview_layer());
    }

    pub fn detach_view(&self, tag: i64) -> bool {
        self.views.detach(tag)
    }

    pub fn view(&self, tag: i64) -> Option<Arc<dyn CameraView>> {
        self.views.get(tag)
    }

    /// Work items queued or scheduled on the session queue.
    pub fn queue_depth(&self) -> usize {
        self.queue.pending()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::from_session(&self.snapshot(), self.queue_depth())
    }

    fn enqueue<T, F>(&self, operation: &'static str, op: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionController) -> Result<T, CameraError> + Send + 'static,
    {
        let (completer, completion) = completion();
        let submitted = self.queue.submit(move |controller: &mut SessionController| {
            let result = op(controller);
            controller.publish();
            completer.complete(result);
        });
        if let Err(error) = submitted {
            debug!(operation, %error, "Request rejected by closed session queue");
            return Completion::ready(Err(error.into()));
        }
        completion
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        self.queue.shutdown();
        debug!(queue = %self.config.queue_label, "Camera manager dropped");
    }
}

impl std::fmt::Debug for CameraManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraManager")
            .field("state", &self.state())
            .field("queue_depth", &self.queue_depth())
            .field("views", &self.views)
            .finish()
    }
}
