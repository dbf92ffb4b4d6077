//! Log-only devices
//!
//! Stand-ins for the platform audio and haptic APIs when the engine runs on
//! a host without them (the CLI). Every call is reported through `tracing`.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::info;

use super::{ClipId, DeviceError, HapticPattern, PlaybackDevice, VibrationDevice};
use crate::engine::tone::ToneBuffer;

/// Playback device that logs instead of sounding
#[derive(Debug)]
pub struct ConsolePlayback {
    has_clips: bool,
    legs: AtomicUsize,
}

impl ConsolePlayback {
    pub fn new() -> Self {
        Self {
            has_clips: true,
            legs: AtomicUsize::new(0),
        }
    }

    /// A device without a clip library, which forces the synthesized tier
    pub fn without_clips() -> Self {
        Self {
            has_clips: false,
            legs: AtomicUsize::new(0),
        }
    }

    pub fn legs_played(&self) -> usize {
        self.legs.load(Ordering::Relaxed)
    }
}

impl Default for ConsolePlayback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackDevice for ConsolePlayback {
    async fn configure_for_playback(&self) -> Result<(), DeviceError> {
        info!("[speaker] audio session configured for playback");
        Ok(())
    }

    async fn play_buffer(&self, buffer: ToneBuffer) -> Result<(), DeviceError> {
        let leg = self.legs.fetch_add(1, Ordering::Relaxed);
        info!(
            "[speaker] leg {}: {:.0} Hz for {} ms (amplitude {:.1}, {} samples)",
            leg,
            buffer.frequency_hz(),
            buffer.duration_ms(),
            buffer.amplitude(),
            buffer.num_samples()
        );
        Ok(())
    }

    async fn play_looped_clip(&self, clip: &ClipId, volume: f32) -> Result<(), DeviceError> {
        if !self.has_clips {
            return Err(DeviceError::Unavailable(format!("clip '{}' not bundled", clip)));
        }
        info!("[speaker] looping clip '{}' at volume {:.1}", clip, volume);
        Ok(())
    }

    async fn stop(&self) {
        info!("[speaker] stopped");
    }

    async fn release(&self) {
        info!("[speaker] audio session released");
    }
}

/// Vibration device that logs instead of vibrating
#[derive(Debug, Default)]
pub struct ConsoleVibration;

impl ConsoleVibration {
    pub fn new() -> Self {
        Self
    }
}

impl VibrationDevice for ConsoleVibration {
    fn vibrate(&self, pattern: &HapticPattern, repeat: bool) {
        info!(
            "[haptic] vibrating {:?} ms{}",
            pattern.steps_ms(),
            if repeat { " (repeating)" } else { "" }
        );
    }

    fn cancel(&self) {
        info!("[haptic] cancelled");
    }
}
