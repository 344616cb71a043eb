//! In-memory capture framework.
//!
//! Behaves like a small but strict hardware backend: device mutations
//! require the configuration lock, a session accepts a single video input,
//! and still captures are delivered asynchronously as real JPEG data.
//! Faults can be injected to exercise every failure path of the controller.

use super::{
    CaptureDevice, CapturePlatform, CaptureSession, DeviceInput, DevicePosition, EncodedImage,
    ExposureRange, ExposureSetting, FlashSetting, FocusMode, MediaType, MetadataHandler,
    MetadataObject, ObserverToken, PlatformError, PreviewSurface, RuntimeErrorHandler,
    StillCaptureCallback, StillImageOutput, StillSettings, TorchMode, WhiteBalanceGains,
    WhiteBalanceSetting,
};
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, ImageBuffer, Rgb};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Record of a still capture request as seen by the framework.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    /// Flash the still output was asked to fire.
    pub flash: FlashSetting,
    /// Torch state of the bound device at capture time.
    pub torch: TorchMode,
    pub jpeg_quality: u8,
    pub device: Option<String>,
}

#[derive(Debug)]
struct DeviceState {
    locked: bool,
    lock_count: u64,
    torch: TorchMode,
    focus: FocusMode,
    white_balance: WhiteBalanceSetting,
    gains: WhiteBalanceGains,
    exposure: ExposureSetting,
    duration: Duration,
    iso: f32,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            locked: false,
            lock_count: 0,
            torch: TorchMode::Off,
            focus: FocusMode::ContinuousAutoFocus,
            white_balance: WhiteBalanceSetting::ContinuousAutoWhiteBalance,
            gains: WhiteBalanceGains::unity(),
            exposure: ExposureSetting::ContinuousAutoExposure,
            duration: Duration::from_millis(10),
            iso: 100.0,
        }
    }
}

/// A simulated camera.
#[derive(Debug)]
pub struct MockDevice {
    id: String,
    position: DevicePosition,
    has_torch: bool,
    has_flash: bool,
    focus_modes: Vec<FocusMode>,
    exposure_modes: Vec<ExposureSetting>,
    white_balance_modes: Vec<WhiteBalanceSetting>,
    max_gain: f32,
    range: ExposureRange,
    lock_fails: AtomicBool,
    state: Mutex<DeviceState>,
}

impl MockDevice {
    /// Creates a fully featured device with torch, flash and every mode.
    pub fn new(id: impl Into<String>, position: DevicePosition) -> Self {
        Self {
            id: id.into(),
            position,
            has_torch: true,
            has_flash: true,
            focus_modes: vec![
                FocusMode::Locked,
                FocusMode::AutoFocus,
                FocusMode::ContinuousAutoFocus,
            ],
            exposure_modes: vec![
                ExposureSetting::Locked,
                ExposureSetting::AutoExpose,
                ExposureSetting::ContinuousAutoExposure,
                ExposureSetting::Custom,
            ],
            white_balance_modes: vec![
                WhiteBalanceSetting::Locked,
                WhiteBalanceSetting::AutoWhiteBalance,
                WhiteBalanceSetting::ContinuousAutoWhiteBalance,
            ],
            max_gain: 4.0,
            range: ExposureRange::default(),
            lock_fails: AtomicBool::new(false),
            state: Mutex::new(DeviceState::default()),
        }
    }

    pub fn without_torch(mut self) -> Self {
        self.has_torch = false;
        self
    }

    pub fn without_flash(mut self) -> Self {
        self.has_flash = false;
        self
    }

    pub fn with_focus_modes(mut self, modes: &[FocusMode]) -> Self {
        self.focus_modes = modes.to_vec();
        self
    }

    pub fn with_exposure_modes(mut self, modes: &[ExposureSetting]) -> Self {
        self.exposure_modes = modes.to_vec();
        self
    }

    pub fn with_max_gain(mut self, max_gain: f32) -> Self {
        self.max_gain = max_gain;
        self
    }

    /// Makes every following lock attempt fail (another client holds it).
    pub fn fail_locks(&self, fail: bool) {
        self.lock_fails.store(fail, Ordering::SeqCst);
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Number of successful lock acquisitions.
    pub fn lock_count(&self) -> u64 {
        self.state.lock().lock_count
    }

    pub fn custom_exposure(&self) -> (Duration, f32) {
        let state = self.state.lock();
        (state.duration, state.iso)
    }

    fn mutate(&self, apply: impl FnOnce(&mut DeviceState)) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if !state.locked {
            return Err(PlatformError::NotLocked(self.id.clone()));
        }
        apply(&mut state);
        Ok(())
    }
}

impl CaptureDevice for MockDevice {
    fn unique_id(&self) -> &str {
        &self.id
    }

    fn media_type(&self) -> MediaType {
        MediaType::Video
    }

    fn position(&self) -> DevicePosition {
        self.position
    }

    fn has_torch(&self) -> bool {
        self.has_torch
    }

    fn has_flash(&self) -> bool {
        self.has_flash
    }

    fn try_lock_for_configuration(&self) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if self.lock_fails.load(Ordering::SeqCst) || state.locked {
            return Err(PlatformError::LockUnavailable(self.id.clone()));
        }
        state.locked = true;
        state.lock_count += 1;
        Ok(())
    }

    fn unlock_for_configuration(&self) {
        self.state.lock().locked = false;
    }

    fn torch_mode(&self) -> TorchMode {
        self.state.lock().torch
    }

    fn set_torch_mode(&self, mode: TorchMode) -> Result<(), PlatformError> {
        if !self.has_torch && mode != TorchMode::Off {
            return Err(PlatformError::Unsupported(format!("torch on {}", self.id)));
        }
        self.mutate(|state| state.torch = mode)
    }

    fn is_focus_mode_supported(&self, mode: FocusMode) -> bool {
        self.focus_modes.contains(&mode)
    }

    fn focus_mode(&self) -> FocusMode {
        self.state.lock().focus
    }

    fn set_focus_mode(&self, mode: FocusMode) -> Result<(), PlatformError> {
        if !self.is_focus_mode_supported(mode) {
            return Err(PlatformError::Unsupported(format!("focus mode {mode:?}")));
        }
        self.mutate(|state| state.focus = mode)
    }

    fn is_white_balance_mode_supported(&self, mode: WhiteBalanceSetting) -> bool {
        self.white_balance_modes.contains(&mode)
    }

    fn white_balance_mode(&self) -> WhiteBalanceSetting {
        self.state.lock().white_balance
    }

    fn set_white_balance_mode(&self, mode: WhiteBalanceSetting) -> Result<(), PlatformError> {
        if !self.is_white_balance_mode_supported(mode) {
            return Err(PlatformError::Unsupported(format!(
                "white balance mode {mode:?}"
            )));
        }
        self.mutate(|state| state.white_balance = mode)
    }

    fn max_white_balance_gain(&self) -> f32 {
        self.max_gain
    }

    fn white_balance_gains(&self) -> WhiteBalanceGains {
        self.state.lock().gains
    }

    fn set_white_balance_gains_locked(
        &self,
        gains: WhiteBalanceGains,
    ) -> Result<(), PlatformError> {
        let in_range = |g: f32| (1.0..=self.max_gain).contains(&g);
        if !(in_range(gains.red) && in_range(gains.green) && in_range(gains.blue)) {
            return Err(PlatformError::Unsupported(format!(
                "white balance gains {gains:?} outside [1, {}]",
                self.max_gain
            )));
        }
        self.mutate(|state| {
            state.gains = gains;
            state.white_balance = WhiteBalanceSetting::Locked;
        })
    }

    fn is_exposure_mode_supported(&self, mode: ExposureSetting) -> bool {
        self.exposure_modes.contains(&mode)
    }

    fn exposure_mode(&self) -> ExposureSetting {
        self.state.lock().exposure
    }

    fn set_exposure_mode(&self, mode: ExposureSetting) -> Result<(), PlatformError> {
        if !self.is_exposure_mode_supported(mode) {
            return Err(PlatformError::Unsupported(format!("exposure mode {mode:?}")));
        }
        self.mutate(|state| state.exposure = mode)
    }

    fn exposure_range(&self) -> ExposureRange {
        self.range
    }

    fn set_custom_exposure(&self, duration: Duration, iso: f32) -> Result<(), PlatformError> {
        if !self.is_exposure_mode_supported(ExposureSetting::Custom) {
            return Err(PlatformError::Unsupported("custom exposure".into()));
        }
        let (duration, iso) = self.range.clamp(duration, iso);
        self.mutate(|state| {
            state.exposure = ExposureSetting::Custom;
            state.duration = duration;
            state.iso = iso;
        })
    }
}

struct World {
    running: bool,
    start_count: usize,
    stop_count: usize,
    sessions_created: usize,
    /// Inputs visible outside a configuration bracket.
    committed: Vec<DeviceInput>,
    configuring: usize,
    unbracketed_mutations: usize,
    rejected: HashSet<String>,
    observers: Vec<(u64, RuntimeErrorHandler)>,
    next_token: u64,
    next_input: u64,
    metadata: Option<MetadataHandler>,
    captures: Vec<CaptureEvent>,
    stall_captures: bool,
    stalled: Vec<StillCaptureCallback>,
    fail_next_capture: Option<PlatformError>,
    frame_size: (u32, u32),
}

impl Default for World {
    fn default() -> Self {
        Self {
            running: false,
            start_count: 0,
            stop_count: 0,
            sessions_created: 0,
            committed: Vec::new(),
            configuring: 0,
            unbracketed_mutations: 0,
            rejected: HashSet::new(),
            observers: Vec::new(),
            next_token: 0,
            next_input: 0,
            metadata: None,
            captures: Vec::new(),
            stall_captures: false,
            stalled: Vec::new(),
            fail_next_capture: None,
            frame_size: (64, 48),
        }
    }
}

struct MockSession {
    label: String,
    world: Arc<Mutex<World>>,
    inputs: Vec<DeviceInput>,
    outputs: Vec<Arc<dyn StillImageOutput>>,
    preview: Option<Weak<dyn PreviewSurface>>,
    depth: usize,
}

impl MockSession {
    fn note_mutation(&self) {
        let mut world = self.world.lock();
        if self.depth == 0 {
            world.unbracketed_mutations += 1;
            world.committed = self.inputs.clone();
        }
    }
}

impl CaptureSession for MockSession {
    fn label(&self) -> &str {
        &self.label
    }

    fn begin_configuration(&mut self) {
        self.depth += 1;
        self.world.lock().configuring = self.depth;
    }

    fn commit_configuration(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        let mut world = self.world.lock();
        world.configuring = self.depth;
        if self.depth == 0 {
            world.committed = self.inputs.clone();
        }
    }

    fn can_add_input(&self, input: &DeviceInput) -> bool {
        self.inputs.is_empty()
            && !self
                .world
                .lock()
                .rejected
                .contains(input.device().unique_id())
    }

    fn add_input(&mut self, input: &DeviceInput) {
        self.inputs.push(input.clone());
        self.note_mutation();
    }

    fn remove_input(&mut self, input: &DeviceInput) {
        self.inputs.retain(|bound| bound.id() != input.id());
        self.note_mutation();
    }

    fn add_output(&mut self, output: Arc<dyn StillImageOutput>) -> Result<(), PlatformError> {
        self.outputs.push(output);
        Ok(())
    }

    fn attach_preview(&mut self, surface: &Arc<dyn PreviewSurface>) {
        surface.connect(&self.label);
        self.preview = Some(Arc::downgrade(surface));
    }

    fn detach_preview(&mut self) {
        if let Some(surface) = self.preview.take().and_then(|weak| weak.upgrade()) {
            surface.disconnect();
        }
    }

    fn start_running(&mut self) {
        let mut world = self.world.lock();
        world.running = true;
        world.start_count += 1;
    }

    fn stop_running(&mut self) {
        let mut world = self.world.lock();
        world.running = false;
        world.stop_count += 1;
    }

    fn is_running(&self) -> bool {
        self.world.lock().running
    }

    fn add_runtime_error_observer(&mut self, handler: RuntimeErrorHandler) -> ObserverToken {
        let mut world = self.world.lock();
        world.next_token += 1;
        let token = world.next_token;
        world.observers.push((token, handler));
        ObserverToken(token)
    }

    fn remove_runtime_error_observer(&mut self, token: ObserverToken) {
        self.world.lock().observers.retain(|(id, _)| *id != token.0);
    }

    fn set_metadata_handler(&mut self, handler: Option<MetadataHandler>) {
        self.world.lock().metadata = handler;
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.detach_preview();
        let mut world = self.world.lock();
        world.running = false;
        world.committed.clear();
        world.observers.clear();
        world.metadata = None;
    }
}

struct MockStillOutput {
    world: Arc<Mutex<World>>,
    flash: Mutex<FlashSetting>,
}

impl StillImageOutput for MockStillOutput {
    fn flash_mode(&self) -> FlashSetting {
        *self.flash.lock()
    }

    fn set_flash_mode(&self, mode: FlashSetting) {
        *self.flash.lock() = mode;
    }

    fn capture_still(&self, settings: StillSettings, callback: StillCaptureCallback) {
        let mut world = self.world.lock();

        if let Some(error) = world.fail_next_capture.take() {
            drop(world);
            std::thread::spawn(move || callback(Err(error)));
            return;
        }
        if !world.running {
            drop(world);
            std::thread::spawn(move || {
                callback(Err(PlatformError::CaptureFailed(
                    "session is not running".into(),
                )))
            });
            return;
        }

        let device = world.committed.first().map(|input| Arc::clone(input.device()));
        world.captures.push(CaptureEvent {
            flash: settings.flash,
            torch: device.as_ref().map(|d| d.torch_mode()).unwrap_or_default(),
            jpeg_quality: settings.jpeg_quality,
            device: device.map(|d| d.unique_id().to_string()),
        });

        if world.stall_captures {
            world.stalled.push(callback);
            return;
        }

        let (width, height) = world.frame_size;
        let sequence = world.captures.len() as u32;
        drop(world);

        std::thread::spawn(move || {
            callback(encode_frame(width, height, sequence, settings.jpeg_quality))
        });
    }
}

/// Renders a synthetic gradient frame and encodes it as JPEG.
fn encode_frame(
    width: u32,
    height: u32,
    sequence: u32,
    quality: u8,
) -> Result<EncodedImage, PlatformError> {
    let frame = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            (sequence.wrapping_mul(40) % 256) as u8,
        ])
    });

    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100))
        .encode(frame.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| PlatformError::CaptureFailed(e.to_string()))?;

    Ok(EncodedImage {
        data,
        width,
        height,
    })
}

#[derive(Default)]
struct MockPreview {
    session: Mutex<Option<String>>,
}

impl PreviewSurface for MockPreview {
    fn connect(&self, session: &str) {
        *self.session.lock() = Some(session.to_string());
    }

    fn disconnect(&self) {
        *self.session.lock() = None;
    }

    fn connected_session(&self) -> Option<String> {
        self.session.lock().clone()
    }
}

/// In-memory capture framework with fault injection.
#[derive(Clone)]
pub struct MockPlatform {
    world: Arc<Mutex<World>>,
    devices: Arc<Vec<Arc<MockDevice>>>,
}

impl MockPlatform {
    /// A back camera with torch and flash, and a front camera without.
    pub fn new() -> Self {
        Self::with_devices(vec![
            MockDevice::new("mock-back", DevicePosition::Back),
            MockDevice::new("mock-front", DevicePosition::Front)
                .without_torch()
                .without_flash(),
        ])
    }

    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self {
            world: Arc::new(Mutex::new(World::default())),
            devices: Arc::new(devices.into_iter().map(Arc::new).collect()),
        }
    }

    /// A platform with no cameras attached.
    pub fn empty() -> Self {
        Self::with_devices(Vec::new())
    }

    pub fn device(&self, position: DevicePosition) -> Option<Arc<MockDevice>> {
        self.devices
            .iter()
            .find(|device| device.position == position)
            .cloned()
    }

    /// Makes sessions refuse inputs for the device at `position`.
    pub fn reject_inputs_for(&self, position: DevicePosition) {
        if let Some(device) = self.device(position) {
            self.world.lock().rejected.insert(device.id.clone());
        }
    }

    pub fn accept_all_inputs(&self) {
        self.world.lock().rejected.clear();
    }

    /// Stops the session and notifies every registered runtime error observer.
    ///
    /// Returns the number of observers notified.
    pub fn inject_runtime_error(&self, error: PlatformError) -> usize {
        let observers: Vec<RuntimeErrorHandler> = {
            let mut world = self.world.lock();
            world.running = false;
            world
                .observers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in &observers {
            handler(error.clone());
        }
        observers.len()
    }

    /// Holds capture callbacks instead of delivering them.
    pub fn stall_captures(&self, stall: bool) {
        self.world.lock().stall_captures = stall;
    }

    /// Delivers every stalled capture. Returns how many were released.
    pub fn release_stalled_captures(&self) -> usize {
        let (stalled, (width, height)) = {
            let mut world = self.world.lock();
            (std::mem::take(&mut world.stalled), world.frame_size)
        };
        let released = stalled.len();
        for (index, callback) in stalled.into_iter().enumerate() {
            callback(encode_frame(width, height, index as u32, 90));
        }
        released
    }

    pub fn fail_next_capture(&self, error: PlatformError) {
        self.world.lock().fail_next_capture = Some(error);
    }

    /// Delivers metadata objects to the session's handler, if any.
    pub fn emit_metadata(&self, objects: Vec<MetadataObject>) -> bool {
        let handler = self.world.lock().metadata.clone();
        match handler {
            Some(handler) => {
                handler(objects);
                true
            }
            None => false,
        }
    }

    pub fn set_frame_size(&self, width: u32, height: u32) {
        self.world.lock().frame_size = (width, height);
    }

    pub fn is_running(&self) -> bool {
        self.world.lock().running
    }

    pub fn start_count(&self) -> usize {
        self.world.lock().start_count
    }

    pub fn stop_count(&self) -> usize {
        self.world.lock().stop_count
    }

    pub fn sessions_created(&self) -> usize {
        self.world.lock().sessions_created
    }

    pub fn observer_count(&self) -> usize {
        self.world.lock().observers.len()
    }

    /// Positions of the inputs bound as of the last committed configuration.
    pub fn bound_positions(&self) -> Vec<DevicePosition> {
        self.world
            .lock()
            .committed
            .iter()
            .map(|input| input.device().position())
            .collect()
    }

    /// Current begin-configuration nesting depth.
    pub fn configuration_depth(&self) -> usize {
        self.world.lock().configuring
    }

    /// Input changes made outside a configuration bracket.
    pub fn unbracketed_mutations(&self) -> usize {
        self.world.lock().unbracketed_mutations
    }

    pub fn captures(&self) -> Vec<CaptureEvent> {
        self.world.lock().captures.clone()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePlatform for MockPlatform {
    fn devices_with_media_type(&self, media: MediaType) -> Vec<Arc<dyn CaptureDevice>> {
        if media != MediaType::Video {
            return Vec::new();
        }
        self.devices
            .iter()
            .map(|device| Arc::clone(device) as Arc<dyn CaptureDevice>)
            .collect()
    }

    fn create_session(&self) -> Result<Box<dyn CaptureSession>, PlatformError> {
        let label = {
            let mut world = self.world.lock();
            world.sessions_created += 1;
            format!("mock-session-{}", world.sessions_created)
        };
        tracing::debug!(session = %label, "MockPlatform created capture session");
        Ok(Box::new(MockSession {
            label,
            world: Arc::clone(&self.world),
            inputs: Vec::new(),
            outputs: Vec::new(),
            preview: None,
            depth: 0,
        }))
    }

    fn open_input(&self, device: &Arc<dyn CaptureDevice>) -> Result<DeviceInput, PlatformError> {
        let mut world = self.world.lock();
        world.next_input += 1;
        Ok(DeviceInput::new(world.next_input, Arc::clone(device)))
    }

    fn create_still_image_output(&self) -> Arc<dyn StillImageOutput> {
        Arc::new(MockStillOutput {
            world: Arc::clone(&self.world),
            flash: Mutex::new(FlashSetting::Off),
        })
    }

    fn create_preview_layer(&self) -> Arc<dyn PreviewSurface> {
        Arc::new(MockPreview::default())
    }
}
