//! Device Capability Ports
//!
//! The engine never talks to a platform audio or haptic API directly. It is
//! handed implementations of these two traits and owns them for the lifetime
//! of the `Ejector`.
//!
//! - `console`: log-only devices for the CLI
//! - `wav`: playback device that renders every leg to a WAV file
//! - `mock`: scripted devices that record calls (tests)

pub mod console;
pub mod mock;
pub mod wav;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::tone::ToneBuffer;

pub use console::{ConsolePlayback, ConsoleVibration};
pub use mock::{MockPlayback, MockVibration, PlaybackCall, PlaybackScript, VibrationCall};
pub use wav::WavRenderPlayback;

/// Errors reported by a platform device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The platform audio session cannot be configured
    #[error("audio device unavailable: {0}")]
    Unavailable(String),

    /// A specific buffer or clip call failed mid-session
    #[error("playback failed: {0}")]
    PlaybackFailed(String),
}

impl DeviceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            DeviceError::Unavailable(_) => "DEVICE_UNAVAILABLE",
            DeviceError::PlaybackFailed(_) => "PLAYBACK_FAILED",
        }
    }
}

/// Identifier of a pre-encoded looping clip
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipId(String);

impl ClipId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Alternating on/off haptic step durations in milliseconds
///
/// The first step is "on", the second "off", and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HapticPattern(Vec<u64>);

impl HapticPattern {
    pub fn new(steps_ms: Vec<u64>) -> Self {
        Self(steps_ms)
    }

    pub fn steps_ms(&self) -> &[u64] {
        &self.0
    }

    /// Length of one pass through the pattern
    pub fn period_ms(&self) -> u64 {
        self.0.iter().sum()
    }
}

/// Platform audio output
///
/// Any call may fail; the orchestrator treats a failure as a tier failure.
/// `play_buffer` returns once the buffer has been handed to the platform, not
/// when it has finished sounding.
#[async_trait]
pub trait PlaybackDevice: Send + Sync {
    /// Open the audio session for speaker playback
    async fn configure_for_playback(&self) -> Result<(), DeviceError>;

    /// Queue one synthesized tone
    async fn play_buffer(&self, buffer: ToneBuffer) -> Result<(), DeviceError>;

    /// Start a pre-recorded clip looping at the given volume (0.0 - 1.0)
    async fn play_looped_clip(&self, clip: &ClipId, volume: f32) -> Result<(), DeviceError>;

    /// Silence any current output
    async fn stop(&self);

    /// Release the audio session
    async fn release(&self);
}

/// Coarse on/off haptic generator, assumed always available
pub trait VibrationDevice: Send + Sync {
    fn vibrate(&self, pattern: &HapticPattern, repeat: bool);

    fn cancel(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haptic_pattern_period() {
        let pattern = HapticPattern::new(vec![200, 100]);
        assert_eq!(pattern.period_ms(), 300);
        assert_eq!(pattern.steps_ms(), &[200, 100]);
    }

    #[test]
    fn test_device_error_codes() {
        assert_eq!(
            DeviceError::PlaybackFailed("x".into()).error_code(),
            "PLAYBACK_FAILED"
        );
        assert_eq!(ClipId::new("clip").to_string(), "clip");
    }
}
