//! Error handling for ClearWave
//!
//! Device failures are recovered by tier fallback inside the engine and never
//! reach the caller of `start()`. Only parameter validation errors are
//! surfaced to the control surface.

use thiserror::Error;

use crate::device::DeviceError;

/// Result type alias for ClearWave operations
pub type Result<T> = std::result::Result<T, ClearwaveError>;

/// Main error type for ClearWave operations
#[derive(Error, Debug)]
pub enum ClearwaveError {
    // Parameter Errors
    #[error("Invalid session parameters: {reason}")]
    InvalidParams { reason: String },

    // Device Errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    // Engine Errors
    #[error("Playback engine is no longer running")]
    EngineStopped,

    // Configuration Errors
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl ClearwaveError {
    /// Frequency outside the accepted base-frequency range
    pub fn frequency_out_of_range(frequency_hz: f64, min_hz: f64, max_hz: f64) -> Self {
        ClearwaveError::InvalidParams {
            reason: format!(
                "frequency {} Hz outside {}..={} Hz",
                frequency_hz, min_hz, max_hz
            ),
        }
    }

    /// Duration outside the accepted session length range
    pub fn duration_out_of_range(duration_ms: u64, min_ms: u64, max_ms: u64) -> Self {
        ClearwaveError::InvalidParams {
            reason: format!(
                "duration {} ms outside {}..={} ms",
                duration_ms, min_ms, max_ms
            ),
        }
    }

    /// Unknown intensity level
    pub fn invalid_intensity(value: impl std::fmt::Display) -> Self {
        ClearwaveError::InvalidParams {
            reason: format!("unknown intensity '{}' (expected low, medium or high)", value),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ClearwaveError::InvalidParams { .. } => "INVALID_PARAMS",
            ClearwaveError::Device(e) => e.error_code(),
            ClearwaveError::EngineStopped => "ENGINE_STOPPED",
            ClearwaveError::Config { .. } => "CONFIG_ERROR",
            ClearwaveError::Io(_) => "IO_ERROR",
            ClearwaveError::Serialization(_) => "SERIALIZATION_ERROR",
            ClearwaveError::Wav(_) => "WAV_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Device errors are recovered by falling back to the next tier.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ClearwaveError::Device(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ClearwaveError::frequency_out_of_range(10.0, 165.0, 2000.0);
        assert_eq!(err.error_code(), "INVALID_PARAMS");

        let err: ClearwaveError = DeviceError::Unavailable("no session".to_string()).into();
        assert_eq!(err.error_code(), "DEVICE_UNAVAILABLE");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_messages_name_the_bad_value() {
        let err = ClearwaveError::duration_out_of_range(5, 1000, 120_000);
        assert!(err.to_string().contains("5 ms"));

        let err = ClearwaveError::invalid_intensity("loud");
        assert!(err.to_string().contains("'loud'"));
    }

    #[test]
    fn test_only_device_errors_recoverable() {
        assert!(!ClearwaveError::EngineStopped.is_recoverable());
        assert!(!ClearwaveError::frequency_out_of_range(10.0, 165.0, 2000.0).is_recoverable());
        assert!(ClearwaveError::from(DeviceError::PlaybackFailed("x".into())).is_recoverable());
    }
}
