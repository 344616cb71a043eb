//! White balance presets and their conversion to device gains.
//!
//! Presets other than `Auto` name a fixed illuminant. Applying one is a
//! three step pipeline:
//!
//! ```text
//! preset → temperature/tint → RGB gains (chromatic adaptation) → clamp → device
//! ```
//!
//! The device owns the adaptation transform because it depends on the
//! sensor's spectral response. [`chromatic_adaptation_gains`] is the generic
//! fallback: it places the illuminant on the Planckian locus, converts it to
//! linear sRGB and returns the per-channel gains that neutralize it.
//!
//! Devices only accept gains in `[1.0, max_gain]`. [`clamp_gains`] fits a
//! gain triple into that range by scaling all channels by the same factor,
//! which preserves hue. Only when no uniform factor fits are individual
//! channels clipped.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::invalid;
use crate::error::CameraError;
use crate::platform::{TemperatureAndTint, WhiteBalanceGains, WhiteBalanceSetting};

/// Lowest temperature the locus approximation covers.
const MIN_TEMPERATURE: f32 = 1667.0;
/// Highest temperature the locus approximation covers.
const MAX_TEMPERATURE: f32 = 25000.0;
/// Chromaticity shift per tint unit along the y axis.
const TINT_STEP: f64 = 0.0002;

/// White balance preset requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteBalancePreset {
    Auto,
    Sunny,
    Cloudy,
    Flash,
    Shadow,
    Incandescent,
    Fluorescent,
}

impl WhiteBalancePreset {
    pub fn from_host(value: i64) -> Result<Self, CameraError> {
        match value {
            0 => Ok(WhiteBalancePreset::Auto),
            1 => Ok(WhiteBalancePreset::Sunny),
            2 => Ok(WhiteBalancePreset::Cloudy),
            3 => Ok(WhiteBalancePreset::Flash),
            4 => Ok(WhiteBalancePreset::Shadow),
            5 => Ok(WhiteBalancePreset::Incandescent),
            6 => Ok(WhiteBalancePreset::Fluorescent),
            other => Err(invalid("white balance preset", other)),
        }
    }

    pub fn host_value(self) -> i64 {
        match self {
            WhiteBalancePreset::Auto => 0,
            WhiteBalancePreset::Sunny => 1,
            WhiteBalancePreset::Cloudy => 2,
            WhiteBalancePreset::Flash => 3,
            WhiteBalancePreset::Shadow => 4,
            WhiteBalancePreset::Incandescent => 5,
            WhiteBalancePreset::Fluorescent => 6,
        }
    }

    /// Fixed illuminant for this preset, `None` for `Auto`.
    pub fn temperature_and_tint(self) -> Option<TemperatureAndTint> {
        let temperature = match self {
            WhiteBalancePreset::Auto => return None,
            WhiteBalancePreset::Sunny => 5200.0,
            WhiteBalancePreset::Cloudy => 6000.0,
            WhiteBalancePreset::Shadow => 7000.0,
            WhiteBalancePreset::Incandescent => 3000.0,
            WhiteBalancePreset::Fluorescent => 4200.0,
            WhiteBalancePreset::Flash => 5500.0,
        };
        Some(TemperatureAndTint {
            temperature,
            tint: 0.0,
        })
    }

    /// Framework white balance mode used to realize this preset.
    pub fn white_balance_setting(self) -> WhiteBalanceSetting {
        match self {
            WhiteBalancePreset::Auto => WhiteBalanceSetting::ContinuousAutoWhiteBalance,
            _ => WhiteBalanceSetting::Locked,
        }
    }
}

impl fmt::Display for WhiteBalancePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WhiteBalancePreset::Auto => "auto",
            WhiteBalancePreset::Sunny => "sunny",
            WhiteBalancePreset::Cloudy => "cloudy",
            WhiteBalancePreset::Flash => "flash",
            WhiteBalancePreset::Shadow => "shadow",
            WhiteBalancePreset::Incandescent => "incandescent",
            WhiteBalancePreset::Fluorescent => "fluorescent",
        };
        f.write_str(name)
    }
}

/// CIE 1931 chromaticity of a blackbody radiator (Kim et al. cubic fit).
fn planckian_xy(temperature: f64) -> (f64, f64) {
    let t = temperature;
    let t2 = t * t;
    let t3 = t2 * t;

    let x = if t <= 4000.0 {
        -0.266_123_9e9 / t3 - 0.234_358_9e6 / t2 + 0.877_695_6e3 / t + 0.179_910
    } else {
        -3.025_846_9e9 / t3 + 2.107_037_9e6 / t2 + 0.222_634_7e3 / t + 0.240_390
    };

    let x2 = x * x;
    let x3 = x2 * x;
    let y = if t <= 2222.0 {
        -1.106_381_4 * x3 - 1.348_110_20 * x2 + 2.185_558_32 * x - 0.202_196_83
    } else if t <= 4000.0 {
        -0.954_947_6 * x3 - 1.374_185_93 * x2 + 2.091_370_15 * x - 0.167_488_67
    } else {
        3.081_758_0 * x3 - 5.873_386_70 * x2 + 3.751_129_97 * x - 0.370_014_83
    };

    (x, y)
}

/// Converts an illuminant into gains that render it neutral.
///
/// The result is normalized so the weakest channel has gain 1.0. Positive
/// tint shifts the illuminant toward green.
pub fn chromatic_adaptation_gains(value: TemperatureAndTint) -> WhiteBalanceGains {
    let temperature = f64::from(value.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE));
    let (x, y) = planckian_xy(temperature);
    let y = y + f64::from(value.tint) * TINT_STEP;

    // Illuminant in XYZ with unit luminance.
    let big_x = x / y;
    let big_z = (1.0 - x - y) / y;

    // XYZ to linear sRGB (D65 primaries).
    let r = 3.2406 * big_x - 1.5372 - 0.4986 * big_z;
    let g = -0.9689 * big_x + 1.8758 + 0.0415 * big_z;
    let b = 0.0557 * big_x - 0.2040 + 1.0570 * big_z;

    if r <= 0.0 || g <= 0.0 || b <= 0.0 {
        return WhiteBalanceGains::unity();
    }

    let gains = WhiteBalanceGains::new((g / r) as f32, 1.0, (g / b) as f32);
    let floor = gains.min_channel();
    gains.scaled(1.0 / floor)
}

/// Fits gains into the device range `[1.0, max_gain]`.
///
/// A single uniform factor is applied first so the channel ratios (and
/// therefore hue) survive. Channels that still fall outside the range after
/// that are clipped individually.
pub fn clamp_gains(gains: WhiteBalanceGains, max_gain: f32) -> WhiteBalanceGains {
    let max_gain = max_gain.max(1.0);
    let channels = [gains.red, gains.green, gains.blue];
    if channels.iter().any(|g| !g.is_finite() || *g <= 0.0) {
        return WhiteBalanceGains::unity();
    }

    let high = gains.max_channel();
    let low = gains.min_channel();

    let factor = if high > max_gain {
        max_gain / high
    } else if low < 1.0 {
        (1.0 / low).min(max_gain / high)
    } else {
        1.0
    };

    let scaled = gains.scaled(factor);
    WhiteBalanceGains::new(
        scaled.red.clamp(1.0, max_gain),
        scaled.green.clamp(1.0, max_gain),
        scaled.blue.clamp(1.0, max_gain),
    )
}
