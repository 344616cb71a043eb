//! Capture session lifecycle and configuration state machine.
//!
//! The [`SessionController`] owns the platform capture session, the bound
//! video input and the still image output. It lives on the session queue
//! worker, so every operation is serialized and runs to completion before
//! the next one starts. The outside world observes it through
//! [`SessionSnapshot`]s and [`SessionEvent`]s.

mod capture;
mod controller;
mod events;
mod observer;
mod picture;
mod settings;
mod state;

pub use controller::{configure, MetadataSink, SessionController};
pub use events::{EventEmitter, EventListener, SessionEvent, Subscription};
pub use picture::{assemble_picture, jpeg_quality, store_picture, PictureOptions, PictureResult};
pub use settings::DeviceLock;
pub use state::{DesiredSettings, EffectiveSettings, SessionSnapshot, SessionState, SessionStats};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::error::CameraError;
    use crate::modes::{CameraPosition, ExposureMode, FlashMode, WhiteBalancePreset};
    use crate::platform::{
        CaptureDevice, CapturePlatform, DevicePosition, ExposureSetting, FlashSetting, MockDevice, MockPlatform,
        PlatformError, TorchMode,
    };
    use crate::queue::{completion, SerialQueue};
    use parking_lot::RwLock;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        platform: MockPlatform,
        queue: SerialQueue<SessionController>,
        published: Arc<RwLock<SessionSnapshot>>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(ManagerConfig {
                photo_dir: None,
                ..Default::default()
            })
        }

        fn with_config(config: ManagerConfig) -> Self {
            Self::with_platform(MockPlatform::new(), config)
        }

        fn with_platform(platform: MockPlatform, config: ManagerConfig) -> Self {
            let published = Arc::new(RwLock::new(SessionSnapshot::new(config.default_position)));
            let shared: Arc<dyn CapturePlatform> = Arc::new(platform.clone());
            let preview = shared.create_preview_layer();
            let snapshot = Arc::clone(&published);
            let queue = SerialQueue::spawn("test.session", move |handle| {
                SessionController::new(
                    shared,
                    config,
                    preview,
                    EventEmitter::default(),
                    snapshot,
                    handle,
                )
            })
            .unwrap();
            Self {
                platform,
                queue,
                published,
            }
        }

        fn run<T: Send + 'static>(
            &self,
            op: impl FnOnce(&mut SessionController) -> Result<T, CameraError> + Send + 'static,
        ) -> Result<T, CameraError> {
            let (completer, completion) = completion();
            self.queue
                .submit(move |controller: &mut SessionController| {
                    let result = op(controller);
                    controller.publish();
                    completer.complete(result);
                })
                .unwrap();
            completion.wait()
        }

        fn snapshot(&self) -> SessionSnapshot {
            self.published.read().clone()
        }
    }

    #[test]
    fn test_first_input_configures_session() {
        let harness = Harness::new();
        assert_eq!(harness.snapshot().state, SessionState::Uninitialized);

        harness
            .run(|c| c.initialize_input(CameraPosition::Back))
            .unwrap();

        let snapshot = harness.snapshot();
        assert_eq!(snapshot.state, SessionState::Configured);
        assert_eq!(snapshot.bound_position, Some(CameraPosition::Back));
        assert_eq!(harness.platform.bound_positions(), vec![DevicePosition::Back]);
        assert_eq!(harness.platform.unbracketed_mutations(), 0);
    }

    #[test]
    fn test_start_binds_preset_camera() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();

        let snapshot = harness.snapshot();
        assert_eq!(snapshot.state, SessionState::Running);
        assert_eq!(snapshot.bound_position, Some(CameraPosition::Back));
        assert!(snapshot.observer_armed);
        assert!(harness.platform.is_running());
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();
        harness.run(|c| c.start_session()).unwrap();
        assert_eq!(harness.platform.start_count(), 1);

        harness.run(|c| c.stop_session()).unwrap();
        harness.run(|c| c.stop_session()).unwrap();
        assert_eq!(harness.platform.stop_count(), 1);

        let snapshot = harness.snapshot();
        assert_eq!(snapshot.state, SessionState::Stopped);
        assert!(!snapshot.observer_armed);
        assert_eq!(snapshot.bound_position, Some(CameraPosition::Back));
    }

    #[test]
    fn test_rejected_input_restores_previous() {
        let harness = Harness::new();
        harness
            .run(|c| c.initialize_input(CameraPosition::Back))
            .unwrap();
        harness.platform.reject_inputs_for(DevicePosition::Front);

        let result = harness.run(|c| c.initialize_input(CameraPosition::Front));
        assert!(matches!(result, Err(CameraError::InputRejected(_))));
        assert_eq!(harness.platform.bound_positions(), vec![DevicePosition::Back]);
        assert_eq!(harness.snapshot().stats.input_rejections, 1);
    }

    #[test]
    fn test_settings_before_input_are_applied_on_bind() {
        let harness = Harness::new();
        harness
            .run(|c| c.set_white_balance(WhiteBalancePreset::Cloudy))
            .unwrap();
        harness.run(|c| c.set_flash_mode(FlashMode::Torch)).unwrap();
        assert_eq!(harness.snapshot().state, SessionState::Uninitialized);

        harness
            .run(|c| c.initialize_input(CameraPosition::Back))
            .unwrap();

        let back = harness.platform.device(DevicePosition::Back).unwrap();
        assert_eq!(back.torch_mode(), TorchMode::On);
        assert_eq!(
            harness.snapshot().effective.white_balance,
            Some(crate::platform::WhiteBalanceSetting::Locked)
        );
    }

    #[test]
    fn test_switch_releases_torch_on_previous_camera() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();
        harness.run(|c| c.set_flash_mode(FlashMode::Torch)).unwrap();
        let back = harness.platform.device(DevicePosition::Back).unwrap();
        assert_eq!(back.torch_mode(), TorchMode::On);

        harness
            .run(|c| c.set_camera_position(CameraPosition::Front))
            .unwrap();
        assert_eq!(back.torch_mode(), TorchMode::Off);
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.state, SessionState::Running);
        assert_eq!(snapshot.preset_position, CameraPosition::Front);
    }

    #[test]
    fn test_lock_failure_is_reported_and_state_kept() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();
        let back = harness.platform.device(DevicePosition::Back).unwrap();
        back.fail_locks(true);

        let result = harness.run(|c| c.set_flash_mode(FlashMode::Torch));
        assert!(matches!(result, Err(CameraError::DeviceLocked(_))));
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.state, SessionState::Running);
        assert_eq!(snapshot.stats.lock_failures, 1);
        assert_eq!(snapshot.desired.flash, FlashMode::Off);
    }

    #[test]
    fn test_mutation_while_stopped_returns_to_configured() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();
        harness.run(|c| c.stop_session()).unwrap();
        harness
            .run(|c| c.set_exposure_mode(ExposureMode::Locked, None))
            .unwrap();

        let snapshot = harness.snapshot();
        assert_eq!(snapshot.state, SessionState::Configured);
        assert_eq!(snapshot.effective.exposure, Some(ExposureSetting::Locked));
    }

    #[test]
    fn test_stale_runtime_error_is_ignored() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();
        harness.run(|c| c.stop_session()).unwrap();

        harness
            .run(|c| {
                c.handle_runtime_error(1, PlatformError::Runtime("late".into()));
                Ok(())
            })
            .unwrap();
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.state, SessionState::Stopped);
        assert_eq!(snapshot.stats.runtime_errors, 0);
    }

    #[test]
    fn test_capture_requires_running_session() {
        let harness = Harness::new();
        harness
            .run(|c| c.initialize_input(CameraPosition::Back))
            .unwrap();

        let (completer, completion) = completion();
        harness
            .queue
            .submit(move |c: &mut SessionController| {
                c.capture_still(PictureOptions::default(), completer)
            })
            .unwrap();
        assert_eq!(completion.wait().unwrap_err(), CameraError::NotRunning);
    }

    #[test]
    fn test_capture_timeout_then_late_result_discarded() {
        let harness = Harness::with_config(ManagerConfig {
            capture_timeout_ms: 50,
            photo_dir: None,
            ..Default::default()
        });
        harness.run(|c| c.start_session()).unwrap();
        harness.platform.stall_captures(true);

        let (completer, completion) = completion();
        harness
            .queue
            .submit(move |c: &mut SessionController| {
                c.capture_still(PictureOptions::default(), completer)
            })
            .unwrap();

        let result = completion.wait_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(result, Err(CameraError::CaptureTimeout(_))));

        assert_eq!(harness.platform.release_stalled_captures(), 1);
        harness.run(|_| Ok(())).unwrap();
        let stats = harness.snapshot().stats;
        assert_eq!(stats.capture_timeouts, 1);
        assert_eq!(stats.captures_completed, 0);
        assert_eq!(harness.snapshot().pending_captures, 0);
    }

    #[test]
    fn test_torch_suppresses_still_flash() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();
        harness.run(|c| c.set_flash_mode(FlashMode::On)).unwrap();
        assert_eq!(harness.snapshot().effective.still_flash, FlashSetting::On);

        harness.run(|c| c.set_flash_mode(FlashMode::Torch)).unwrap();
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.effective.still_flash, FlashSetting::Off);
        assert_eq!(snapshot.effective.torch, TorchMode::On);

        harness.run(|c| c.set_flash_mode(FlashMode::Auto)).unwrap();
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.effective.still_flash, FlashSetting::Auto);
        assert_eq!(snapshot.effective.torch, TorchMode::Off);
    }

    fn capture_flash(harness: &Harness) -> FlashSetting {
        let (completer, completion) = completion();
        harness
            .queue
            .submit(move |c: &mut SessionController| {
                c.capture_still(PictureOptions::default(), completer)
            })
            .unwrap();
        completion.wait().unwrap();
        harness.platform.captures().last().unwrap().flash
    }

    #[test]
    fn test_flash_not_carried_to_camera_without_flash() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();
        harness.run(|c| c.set_flash_mode(FlashMode::On)).unwrap();
        assert_eq!(capture_flash(&harness), FlashSetting::On);

        harness
            .run(|c| c.set_camera_position(CameraPosition::Front))
            .unwrap();
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.effective.still_flash, FlashSetting::Off);
        assert_eq!(snapshot.desired.flash, FlashMode::On);
        assert_eq!(capture_flash(&harness), FlashSetting::Off);

        harness
            .run(|c| c.set_camera_position(CameraPosition::Back))
            .unwrap();
        assert_eq!(capture_flash(&harness), FlashSetting::On);
    }

    #[test]
    fn test_still_flash_returns_when_torch_cannot_follow() {
        let platform = MockPlatform::with_devices(vec![
            MockDevice::new("back", DevicePosition::Back),
            MockDevice::new("front", DevicePosition::Front).without_torch(),
        ]);
        let harness = Harness::with_platform(platform, ManagerConfig::in_memory());
        harness.run(|c| c.start_session()).unwrap();
        harness.run(|c| c.set_flash_mode(FlashMode::On)).unwrap();
        harness.run(|c| c.set_flash_mode(FlashMode::Torch)).unwrap();
        assert_eq!(capture_flash(&harness), FlashSetting::Off);
        assert_eq!(harness.snapshot().desired.still_flash, FlashSetting::On);

        harness
            .run(|c| c.set_camera_position(CameraPosition::Front))
            .unwrap();
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.desired.flash, FlashMode::Torch);
        assert_eq!(snapshot.effective.torch, TorchMode::Off);
        assert_eq!(snapshot.effective.still_flash, FlashSetting::On);
        assert_eq!(capture_flash(&harness), FlashSetting::On);
    }

    #[test]
    fn test_empty_platform_reports_device_unavailable() {
        let harness = Harness::with_platform(MockPlatform::empty(), ManagerConfig::in_memory());

        let result = harness.run(|c| c.set_camera_position(CameraPosition::Front));
        assert!(matches!(result, Err(CameraError::DeviceUnavailable(_))));
        let result = harness.run(|c| c.start_session());
        assert!(matches!(result, Err(CameraError::DeviceUnavailable(_))));

        let snapshot = harness.snapshot();
        assert_eq!(snapshot.state, SessionState::Uninitialized);
        assert_eq!(snapshot.bound_position, None);
        assert_eq!(snapshot.preset_position, CameraPosition::Back);
        assert_eq!(harness.platform.sessions_created(), 0);
        assert!(!harness.platform.is_running());
    }

    #[test]
    fn test_missing_position_without_fallback_keeps_preset() {
        let platform =
            MockPlatform::with_devices(vec![MockDevice::new("back", DevicePosition::Back)]);
        let harness = Harness::with_platform(platform, ManagerConfig::in_memory());
        harness.run(|c| c.start_session()).unwrap();

        let result = harness.run(|c| c.set_camera_position(CameraPosition::Front));
        assert!(matches!(result, Err(CameraError::DeviceUnavailable(_))));
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.preset_position, CameraPosition::Back);
        assert_eq!(snapshot.bound_position, Some(CameraPosition::Back));
        assert_eq!(snapshot.state, SessionState::Running);
    }

    #[test]
    fn test_position_fallback_binds_first_device() {
        let platform =
            MockPlatform::with_devices(vec![MockDevice::new("back", DevicePosition::Back)]);
        let harness = Harness::with_platform(
            platform,
            ManagerConfig {
                allow_position_fallback: true,
                default_position: CameraPosition::Front,
                ..ManagerConfig::in_memory()
            },
        );

        harness.run(|c| c.start_session()).unwrap();
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.state, SessionState::Running);
        assert_eq!(snapshot.bound_position, Some(CameraPosition::Back));
        assert_eq!(snapshot.device_id.as_deref(), Some("back"));
        assert_eq!(harness.platform.bound_positions(), vec![DevicePosition::Back]);
    }

    #[test]
    fn test_rejected_switch_keeps_preset() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();
        harness.platform.reject_inputs_for(DevicePosition::Front);

        let result = harness.run(|c| c.set_camera_position(CameraPosition::Front));
        assert!(matches!(result, Err(CameraError::InputRejected(_))));
        let snapshot = harness.snapshot();
        assert_eq!(snapshot.preset_position, CameraPosition::Back);
        assert_eq!(snapshot.bound_position, Some(CameraPosition::Back));
    }

    #[test]
    fn test_teardown_is_terminal() {
        let harness = Harness::new();
        harness.run(|c| c.start_session()).unwrap();
        harness.run(|c| c.teardown()).unwrap();
        harness.run(|c| c.teardown()).unwrap();

        assert!(!harness.platform.is_running());
        assert!(harness.platform.bound_positions().is_empty());
        assert_eq!(harness.platform.observer_count(), 0);
        assert_eq!(harness.snapshot().state, SessionState::TornDown);
        assert_eq!(
            harness.run(|c| c.start_session()),
            Err(CameraError::TornDown)
        );
    }
}
