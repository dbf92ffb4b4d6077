//! Session Parameters
//!
//! Immutable input of one ejection session plus the intensity → amplitude
//! table. Validation happens here, before any session state exists.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ParamLimits;
use crate::error::{ClearwaveError, Result};

/// Fixed high leg of every tone pair
pub const HIGH_FREQUENCY_HZ: f64 = 2000.0;

/// Default base frequency offered to the user
pub const DEFAULT_BASE_FREQUENCY_HZ: f64 = 165.0;

/// Default session length
pub const DEFAULT_DURATION_MS: u64 = 30_000;

/// Output strength selected by the user
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    #[default]
    Medium,
    High,
}

/// Intensity → linear amplitude
pub const AMPLITUDE_TABLE: [(Intensity, f32); 3] = [
    (Intensity::Low, 0.3),
    (Intensity::Medium, 0.6),
    (Intensity::High, 0.9),
];

impl Intensity {
    /// Amplitude (and clip volume) for this level
    pub fn amplitude(self) -> f32 {
        match self {
            Intensity::Low => AMPLITUDE_TABLE[0].1,
            Intensity::Medium => AMPLITUDE_TABLE[1].1,
            Intensity::High => AMPLITUDE_TABLE[2].1,
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intensity::Low => write!(f, "low"),
            Intensity::Medium => write!(f, "medium"),
            Intensity::High => write!(f, "high"),
        }
    }
}

impl TryFrom<u8> for Intensity {
    type Error = ClearwaveError;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Intensity::Low),
            1 => Ok(Intensity::Medium),
            2 => Ok(Intensity::High),
            other => Err(ClearwaveError::invalid_intensity(other)),
        }
    }
}

impl FromStr for Intensity {
    type Err = ClearwaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "0" => Ok(Intensity::Low),
            "medium" | "1" => Ok(Intensity::Medium),
            "high" | "2" => Ok(Intensity::High),
            _ => Err(ClearwaveError::invalid_intensity(s)),
        }
    }
}

/// Validated input of one session
///
/// Deserialized values pass through the same checks as `new`, against the
/// default limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSessionParams")]
pub struct SessionParams {
    base_frequency_hz: f64,
    high_frequency_hz: f64,
    total_duration_ms: u64,
    intensity: Intensity,
}

impl SessionParams {
    /// Validate caller input against `limits`
    ///
    /// # Errors
    /// `InvalidParams` if the frequency is not finite or outside the range, or
    /// the duration is outside the range.
    pub fn new(
        base_frequency_hz: f64,
        total_duration_ms: u64,
        intensity: Intensity,
        limits: &ParamLimits,
    ) -> Result<Self> {
        let params = Self {
            base_frequency_hz,
            high_frequency_hz: HIGH_FREQUENCY_HZ,
            total_duration_ms,
            intensity,
        };
        params.check(limits)?;
        Ok(params)
    }

    /// Re-check these params against `limits`
    ///
    /// # Errors
    /// `InvalidParams` if the base frequency is not finite or outside the
    /// range, the high frequency is not the fixed reference, or the duration
    /// is outside the range.
    pub fn check(&self, limits: &ParamLimits) -> Result<()> {
        let base = self.base_frequency_hz;
        if !base.is_finite() || base < limits.min_frequency_hz || base > limits.max_frequency_hz {
            return Err(ClearwaveError::frequency_out_of_range(
                base,
                limits.min_frequency_hz,
                limits.max_frequency_hz,
            ));
        }

        if self.high_frequency_hz != HIGH_FREQUENCY_HZ {
            return Err(ClearwaveError::InvalidParams {
                reason: format!(
                    "high frequency must be {} Hz, got {}",
                    HIGH_FREQUENCY_HZ, self.high_frequency_hz
                ),
            });
        }

        let total = self.total_duration_ms;
        if total < limits.min_duration_ms || total > limits.max_duration_ms {
            return Err(ClearwaveError::duration_out_of_range(
                total,
                limits.min_duration_ms,
                limits.max_duration_ms,
            ));
        }

        Ok(())
    }

    pub fn base_frequency_hz(&self) -> f64 {
        self.base_frequency_hz
    }

    pub fn high_frequency_hz(&self) -> f64 {
        self.high_frequency_hz
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.total_duration_ms)
    }

    pub fn intensity(&self) -> Intensity {
        self.intensity
    }

    pub fn amplitude(&self) -> f32 {
        self.intensity.amplitude()
    }
}

/// Wire form of `SessionParams`, before validation
#[derive(Debug, Deserialize)]
struct RawSessionParams {
    base_frequency_hz: f64,
    #[serde(default = "default_high_frequency")]
    high_frequency_hz: f64,
    total_duration_ms: u64,
    #[serde(default)]
    intensity: Intensity,
}

fn default_high_frequency() -> f64 {
    HIGH_FREQUENCY_HZ
}

impl TryFrom<RawSessionParams> for SessionParams {
    type Error = ClearwaveError;

    fn try_from(raw: RawSessionParams) -> Result<Self> {
        let params = Self {
            base_frequency_hz: raw.base_frequency_hz,
            high_frequency_hz: raw.high_frequency_hz,
            total_duration_ms: raw.total_duration_ms,
            intensity: raw.intensity,
        };
        params.check(&ParamLimits::default())?;
        Ok(params)
    }
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            base_frequency_hz: DEFAULT_BASE_FREQUENCY_HZ,
            high_frequency_hz: HIGH_FREQUENCY_HZ,
            total_duration_ms: DEFAULT_DURATION_MS,
            intensity: Intensity::Medium,
        }
    }
}
