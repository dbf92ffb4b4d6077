//! Engine configuration
//!
//! All timing constants of the ejection cycle live here so that a platform
//! collaborator can tune them from a JSON file without touching the engine.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClearwaveError, Result};

/// Sample rate used for synthesized tones (44.1kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Progress polling cadence in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Clip played by the first tier
pub const DEFAULT_CLIP_ID: &str = "water-eject-165hz";

/// Timing of one base/high tone pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleTiming {
    /// Upper bound for a single leg; a leg is `min(total / 2, max_leg_ms)`
    pub max_leg_ms: u64,
    /// Silence between the base leg and the high leg
    pub gap_ms: u64,
    /// Silence after the high leg before the next pair
    pub pause_ms: u64,
}

impl Default for CycleTiming {
    fn default() -> Self {
        Self {
            max_leg_ms: 15_000,
            gap_ms: 100,
            pause_ms: 5_000,
        }
    }
}

impl CycleTiming {
    pub fn gap(&self) -> Duration {
        Duration::from_millis(self.gap_ms)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

/// Accepted ranges for caller-supplied session parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamLimits {
    pub min_frequency_hz: f64,
    pub max_frequency_hz: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
}

impl Default for ParamLimits {
    fn default() -> Self {
        Self {
            min_frequency_hz: 165.0,
            max_frequency_hz: 2000.0,
            min_duration_ms: 1_000,
            max_duration_ms: 120_000,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate for synthesized legs
    pub sample_rate: u32,
    /// ProgressTracker cadence
    pub poll_interval_ms: u64,
    /// Tone cycle timing
    pub cycle: CycleTiming,
    /// Parameter validation ranges
    pub limits: ParamLimits,
    /// Identifier of the pre-recorded looping clip
    pub clip_id: String,
    /// Haptic on/off durations in milliseconds, repeated while a session runs
    pub haptic_pattern_ms: Vec<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            cycle: CycleTiming::default(),
            limits: ParamLimits::default(),
            clip_id: DEFAULT_CLIP_ID.to_string(),
            haptic_pattern_ms: vec![200, 100],
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(config_error("sample_rate must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(config_error("poll_interval_ms must be > 0"));
        }
        if self.cycle.max_leg_ms == 0 {
            return Err(config_error("cycle.max_leg_ms must be > 0"));
        }

        let limits = &self.limits;
        if !(limits.min_frequency_hz > 0.0 && limits.min_frequency_hz <= limits.max_frequency_hz)
        {
            return Err(config_error(format!(
                "frequency limits {}..={} are not a valid range",
                limits.min_frequency_hz, limits.max_frequency_hz
            )));
        }
        if limits.min_duration_ms == 0 || limits.min_duration_ms > limits.max_duration_ms {
            return Err(config_error(format!(
                "duration limits {}..={} are not a valid range",
                limits.min_duration_ms, limits.max_duration_ms
            )));
        }

        if self.clip_id.trim().is_empty() {
            return Err(config_error("clip_id must not be empty"));
        }
        if self.haptic_pattern_ms.iter().all(|&ms| ms == 0) {
            return Err(config_error("haptic_pattern_ms needs at least one non-zero step"));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn config_error(reason: impl Into<String>) -> ClearwaveError {
    ClearwaveError::Config {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.cycle.pause_ms, 5000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{ "cycle": { "pause_ms": 0 }, "clip_id": "short" }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(
            config.cycle,
            CycleTiming {
                max_leg_ms: 15_000,
                gap_ms: 100,
                pause_ms: 0,
            }
        );
        assert_eq!(config.clip_id, "short");
        assert_eq!(config.limits, ParamLimits::default());
    }

    #[test]
    fn test_rejects_inverted_duration_limits() {
        let mut config = EngineConfig::default();
        config.limits.min_duration_ms = 10_000;
        config.limits.max_duration_ms = 5_000;

        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_rejects_silent_haptic_pattern() {
        let mut config = EngineConfig::default();
        config.haptic_pattern_ms = vec![0, 0];
        assert!(config.validate().is_err());

        config.haptic_pattern_ms.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}
