//! Device configuration setters.
//!
//! Hardware settings are changed under the device's exclusive configuration
//! lock, held by [`DeviceLock`] for exactly the duration of the change, and
//! inside a session configuration bracket. Lock acquisition never blocks: a
//! busy device fails the request with [`CameraError::DeviceLocked`].

use tracing::{debug, warn};

use super::SessionController;
use crate::error::CameraError;
use crate::modes::white_balance::clamp_gains;
use crate::modes::{AutoFocusMode, ExposureMode, ExposureParams, FlashMode, WhiteBalancePreset};
use crate::platform::{
    CaptureDevice, ExposureSetting, FlashSetting, TorchMode, WhiteBalanceSetting,
};

/// Configuration lock held on a device; released on drop.
pub struct DeviceLock<'a> {
    device: &'a dyn CaptureDevice,
}

impl<'a> DeviceLock<'a> {
    pub fn acquire(device: &'a dyn CaptureDevice) -> Result<Self, CameraError> {
        device.try_lock_for_configuration()?;
        Ok(Self { device })
    }
}

impl Drop for DeviceLock<'_> {
    fn drop(&mut self) {
        self.device.unlock_for_configuration();
    }
}

impl SessionController {
    /// Off/On/Auto set the still flash; Torch lights the torch instead.
    pub fn set_flash_mode(&mut self, mode: FlashMode) -> Result<(), CameraError> {
        self.ensure_live()?;
        let Some(device) = self.bound_device() else {
            self.record_flash(mode);
            debug!(flash = %mode, "Flash mode recorded; no camera bound");
            return Ok(());
        };

        let result = self.bracketed(|controller| controller.apply_flash(device.as_ref(), mode));
        if result.is_ok() {
            self.record_flash(mode);
        }
        self.settle("flash", result)
    }

    fn record_flash(&mut self, mode: FlashMode) {
        self.desired.flash = mode;
        if let Some(flash) = mode.still_flash() {
            self.desired.still_flash = flash;
        }
    }

    pub fn set_auto_focus(&mut self, mode: AutoFocusMode) -> Result<(), CameraError> {
        self.ensure_live()?;
        let Some(device) = self.bound_device() else {
            self.desired.focus = Some(mode);
            debug!(focus = %mode, "Focus mode recorded; no camera bound");
            return Ok(());
        };

        let result = self.bracketed(|_| apply_focus(device.as_ref(), mode));
        if result.is_ok() {
            self.desired.focus = Some(mode);
        }
        self.settle("focus", result)
    }

    pub fn set_white_balance(&mut self, preset: WhiteBalancePreset) -> Result<(), CameraError> {
        self.ensure_live()?;
        let Some(device) = self.bound_device() else {
            self.desired.white_balance = Some(preset);
            debug!(white_balance = %preset, "White balance recorded; no camera bound");
            return Ok(());
        };

        let result = self.bracketed(|_| apply_white_balance(device.as_ref(), preset));
        if result.is_ok() {
            self.desired.white_balance = Some(preset);
        }
        self.settle("white balance", result)
    }

    /// Custom exposure without parameters falls back to continuous exposure
    /// and reports [`CameraError::ExposureParamsMissing`].
    pub fn set_exposure_mode(
        &mut self,
        mode: ExposureMode,
        params: Option<ExposureParams>,
    ) -> Result<(), CameraError> {
        self.ensure_live()?;
        if let Some(params) = &params {
            params.validate()?;
        }

        let (effective, params, missing) = match (mode, params) {
            (ExposureMode::Custom, None) => (ExposureMode::Continuous, None, true),
            (ExposureMode::Custom, Some(params)) => (ExposureMode::Custom, Some(params), false),
            (other, _) => (other, None, false),
        };

        let Some(device) = self.bound_device() else {
            self.desired.exposure = Some(effective);
            self.desired.exposure_params = params;
            debug!(exposure = %effective, "Exposure mode recorded; no camera bound");
            return if missing {
                Err(CameraError::ExposureParamsMissing)
            } else {
                Ok(())
            };
        };

        let result = self.bracketed(|_| apply_exposure(device.as_ref(), effective, params));
        if result.is_ok() {
            self.desired.exposure = Some(effective);
            self.desired.exposure_params = params;
        }
        self.settle("exposure", result)?;

        if missing {
            warn!("Custom exposure requested without parameters; using continuous exposure");
            return Err(CameraError::ExposureParamsMissing);
        }
        Ok(())
    }

    /// Applies recorded settings to a newly bound device. Failures are logged.
    pub(super) fn reapply_desired(&mut self) {
        let Some(device) = self.bound_device() else {
            return;
        };
        let device = device.as_ref();
        let desired = self.desired;

        self.bracketed(|controller| {
            controller.reapply_flash(device);
            if let Some(focus) = desired.focus {
                if let Err(error) = apply_focus(device, focus) {
                    warn!(%error, %focus, "Could not re-apply focus mode");
                }
            }
            if let Some(preset) = desired.white_balance {
                if let Err(error) = apply_white_balance(device, preset) {
                    warn!(%error, white_balance = %preset, "Could not re-apply white balance");
                }
            }
            if let Some(exposure) = desired.exposure {
                if let Err(error) = apply_exposure(device, exposure, desired.exposure_params) {
                    warn!(%error, %exposure, "Could not re-apply exposure mode");
                }
            }
        });
    }

    /// Re-applies the recorded flash mode to a newly bound device.
    ///
    /// When the device cannot honor it, the still output falls back to the
    /// recorded still flash, or to Off on a device without a flash unit.
    pub(super) fn reapply_flash(&self, device: &dyn CaptureDevice) {
        let flash = self.desired.flash;
        let Err(error) = self.apply_flash(device, flash) else {
            return;
        };
        warn!(%error, %flash, "Could not re-apply flash mode");

        let fallback = if device.has_flash() {
            self.desired.still_flash
        } else {
            FlashSetting::Off
        };
        match self.still_output() {
            Ok(output) => output.set_flash_mode(fallback),
            Err(error) => warn!(%error, "Still output unavailable for flash fallback"),
        }
    }

    /// Turns the torch off on a device that is about to be unbound.
    pub(super) fn release_torch(&self, device: &dyn CaptureDevice) {
        if !device.has_torch() || device.torch_mode() == TorchMode::Off {
            return;
        }
        let released = DeviceLock::acquire(device).and_then(|_lock| {
            device
                .set_torch_mode(TorchMode::Off)
                .map_err(CameraError::from)
        });
        if let Err(error) = released {
            warn!(%error, device = device.unique_id(), "Could not turn torch off");
        }
    }

    fn apply_flash(&self, device: &dyn CaptureDevice, mode: FlashMode) -> Result<(), CameraError> {
        let output = self.still_output()?;
        match mode.still_flash() {
            Some(flash) => {
                if flash != FlashSetting::Off && !device.has_flash() {
                    return Err(CameraError::UnsupportedMode(format!(
                        "{} has no flash",
                        device.unique_id()
                    )));
                }
                if device.has_torch() && device.torch_mode() != TorchMode::Off {
                    let _lock = DeviceLock::acquire(device)?;
                    device.set_torch_mode(TorchMode::Off)?;
                }
                output.set_flash_mode(flash);
            }
            None => {
                if !device.has_torch() {
                    return Err(CameraError::UnsupportedMode(format!(
                        "{} has no torch",
                        device.unique_id()
                    )));
                }
                let _lock = DeviceLock::acquire(device)?;
                device.set_torch_mode(TorchMode::On)?;
                let pending = if device.has_flash() {
                    self.desired.still_flash
                } else {
                    FlashSetting::Off
                };
                output.set_flash_mode(pending);
            }
        }
        Ok(())
    }

    fn bracketed<R>(&mut self, apply: impl FnOnce(&Self) -> R) -> R {
        if let Some(session) = self.session.as_deref_mut() {
            session.begin_configuration();
        }
        let result = apply(&*self);
        if let Some(session) = self.session.as_deref_mut() {
            session.commit_configuration();
        }
        result
    }

    fn settle(
        &mut self,
        setting: &'static str,
        result: Result<(), CameraError>,
    ) -> Result<(), CameraError> {
        match &result {
            Ok(()) => {
                self.stats.configurations += 1;
                self.mark_configured();
                debug!(setting, "Configuration applied");
            }
            Err(error) => {
                if matches!(error, CameraError::DeviceLocked(_)) {
                    self.stats.lock_failures += 1;
                }
                warn!(setting, %error, "Configuration not applied");
            }
        }
        result
    }
}

fn apply_focus(device: &dyn CaptureDevice, mode: AutoFocusMode) -> Result<(), CameraError> {
    let target = mode.focus_mode();
    if !device.is_focus_mode_supported(target) {
        return Err(CameraError::UnsupportedMode(format!(
            "focus mode {mode} on {}",
            device.unique_id()
        )));
    }
    let _lock = DeviceLock::acquire(device)?;
    device.set_focus_mode(target)?;
    Ok(())
}

fn apply_white_balance(
    device: &dyn CaptureDevice,
    preset: WhiteBalancePreset,
) -> Result<(), CameraError> {
    let setting = preset.white_balance_setting();
    if !device.is_white_balance_mode_supported(setting) {
        return Err(CameraError::UnsupportedMode(format!(
            "white balance {preset} on {}",
            device.unique_id()
        )));
    }

    match preset.temperature_and_tint() {
        None => {
            let _lock = DeviceLock::acquire(device)?;
            device.set_white_balance_mode(WhiteBalanceSetting::ContinuousAutoWhiteBalance)?;
        }
        Some(value) => {
            let gains = clamp_gains(
                device.gains_for_temperature_and_tint(value),
                device.max_white_balance_gain(),
            );
            debug!(
                %preset,
                temperature = value.temperature,
                red = gains.red,
                green = gains.green,
                blue = gains.blue,
                "White balance gains computed"
            );
            let _lock = DeviceLock::acquire(device)?;
            device.set_white_balance_gains_locked(gains)?;
        }
    }
    Ok(())
}

fn apply_exposure(
    device: &dyn CaptureDevice,
    mode: ExposureMode,
    params: Option<ExposureParams>,
) -> Result<(), CameraError> {
    let setting = mode.exposure_setting();
    if !device.is_exposure_mode_supported(setting) {
        return Err(CameraError::UnsupportedMode(format!(
            "exposure mode {mode} on {}",
            device.unique_id()
        )));
    }

    match (setting, params) {
        (ExposureSetting::Custom, Some(params)) => {
            let (duration, iso) = device
                .exposure_range()
                .clamp(params.duration(), params.iso);
            let _lock = DeviceLock::acquire(device)?;
            device.set_custom_exposure(duration, iso)?;
        }
        _ => {
            let _lock = DeviceLock::acquire(device)?;
            device.set_exposure_mode(setting)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{DevicePosition, MockDevice};

    #[test]
    fn test_device_lock_releases_on_drop() {
        let device = MockDevice::new("cam", DevicePosition::Back);
        {
            let _lock = DeviceLock::acquire(&device).unwrap();
            assert!(device.is_locked());
            assert!(DeviceLock::acquire(&device).is_err());
        }
        assert!(!device.is_locked());
        assert_eq!(device.lock_count(), 1);
    }

    #[test]
    fn test_busy_device_reports_device_locked() {
        let device = MockDevice::new("cam", DevicePosition::Back);
        device.fail_locks(true);
        assert!(matches!(
            DeviceLock::acquire(&device),
            Err(CameraError::DeviceLocked(_))
        ));
    }

    #[test]
    fn test_focus_unsupported_keeps_prior_mode() {
        let device = MockDevice::new("cam", DevicePosition::Back)
            .with_focus_modes(&[crate::platform::FocusMode::ContinuousAutoFocus]);
        let result = apply_focus(&device, AutoFocusMode::Locked);
        assert!(matches!(result, Err(CameraError::UnsupportedMode(_))));
        assert_eq!(
            device.focus_mode(),
            crate::platform::FocusMode::ContinuousAutoFocus
        );
        assert_eq!(device.lock_count(), 0);
    }

    #[test]
    fn test_white_balance_preset_locks_gains_in_range() {
        let device = MockDevice::new("cam", DevicePosition::Back).with_max_gain(2.0);
        apply_white_balance(&device, WhiteBalancePreset::Incandescent).unwrap();
        let gains = device.white_balance_gains();
        assert_eq!(device.white_balance_mode(), WhiteBalanceSetting::Locked);
        assert!(gains.max_channel() <= 2.0 + f32::EPSILON);
        assert!(gains.min_channel() >= 1.0);
        assert!(gains.blue > gains.red);

        apply_white_balance(&device, WhiteBalancePreset::Auto).unwrap();
        assert_eq!(
            device.white_balance_mode(),
            WhiteBalanceSetting::ContinuousAutoWhiteBalance
        );
    }

    #[test]
    fn test_custom_exposure_is_clamped() {
        let device = MockDevice::new("cam", DevicePosition::Back);
        let params = ExposureParams::new(std::time::Duration::from_secs(3), 10_000.0);
        apply_exposure(&device, ExposureMode::Custom, Some(params)).unwrap();

        let range = device.exposure_range();
        assert_eq!(device.exposure_mode(), ExposureSetting::Custom);
        assert_eq!(device.custom_exposure(), (range.max_duration, range.max_iso));
    }
}
