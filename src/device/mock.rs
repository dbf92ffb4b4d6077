//! Mock device implementations for testing
//!
//! These devices produce no output. They follow a failure script and record
//! every call so tests can assert on the exact device traffic of a session.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{ClipId, DeviceError, HapticPattern, PlaybackDevice, VibrationDevice};
use crate::engine::tone::ToneBuffer;

/// Which playback calls should fail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackScript {
    pub fail_configure: bool,
    pub fail_clip: bool,
    /// Accept this many buffers, then fail every later one
    pub fail_buffer_after: Option<usize>,
}

impl PlaybackScript {
    /// Every audio call fails
    pub fn broken() -> Self {
        Self {
            fail_configure: false,
            fail_clip: true,
            fail_buffer_after: Some(0),
        }
    }
}

/// A recorded playback call
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCall {
    Configure,
    Buffer {
        frequency_hz: f64,
        duration_ms: u64,
        num_samples: usize,
        amplitude: f32,
    },
    Clip {
        clip: ClipId,
        volume: f32,
    },
    Stop,
    Release,
}

/// Scripted playback device
#[derive(Debug, Default)]
pub struct MockPlayback {
    script: PlaybackScript,
    calls: Mutex<Vec<PlaybackCall>>,
}

impl MockPlayback {
    pub fn new(script: PlaybackScript) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds
    pub fn healthy() -> Self {
        Self::new(PlaybackScript::default())
    }

    /// Clip and buffer playback always fail
    pub fn broken() -> Self {
        Self::new(PlaybackScript::broken())
    }

    fn log(&self) -> MutexGuard<'_, Vec<PlaybackCall>> {
        // A panicking test thread must not hide the log from the others
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn calls(&self) -> Vec<PlaybackCall> {
        self.log().clone()
    }

    /// Frequencies of every buffer handed to the device, in order
    pub fn played_frequencies(&self) -> Vec<f64> {
        self.log()
            .iter()
            .filter_map(|call| match call {
                PlaybackCall::Buffer { frequency_hz, .. } => Some(*frequency_hz),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&PlaybackCall) -> bool) -> usize {
        self.log().iter().filter(|call| matches(call)).count()
    }

    pub fn release_count(&self) -> usize {
        self.count(|call| matches!(call, PlaybackCall::Release))
    }

    pub fn stop_count(&self) -> usize {
        self.count(|call| matches!(call, PlaybackCall::Stop))
    }

    pub fn clip_count(&self) -> usize {
        self.count(|call| matches!(call, PlaybackCall::Clip { .. }))
    }
}

#[async_trait]
impl PlaybackDevice for MockPlayback {
    async fn configure_for_playback(&self) -> Result<(), DeviceError> {
        self.log().push(PlaybackCall::Configure);
        if self.script.fail_configure {
            return Err(DeviceError::Unavailable("mock audio session refused".into()));
        }
        Ok(())
    }

    async fn play_buffer(&self, buffer: ToneBuffer) -> Result<(), DeviceError> {
        let mut log = self.log();
        let accepted = log
            .iter()
            .filter(|call| matches!(call, PlaybackCall::Buffer { .. }))
            .count();
        if let Some(limit) = self.script.fail_buffer_after {
            if accepted >= limit {
                return Err(DeviceError::PlaybackFailed(format!(
                    "mock rejected buffer #{}",
                    accepted
                )));
            }
        }
        log.push(PlaybackCall::Buffer {
            frequency_hz: buffer.frequency_hz(),
            duration_ms: buffer.duration_ms(),
            num_samples: buffer.num_samples(),
            amplitude: buffer.amplitude(),
        });
        Ok(())
    }

    async fn play_looped_clip(&self, clip: &ClipId, volume: f32) -> Result<(), DeviceError> {
        if self.script.fail_clip {
            return Err(DeviceError::PlaybackFailed(format!("mock has no clip '{}'", clip)));
        }
        self.log().push(PlaybackCall::Clip {
            clip: clip.clone(),
            volume,
        });
        Ok(())
    }

    async fn stop(&self) {
        self.log().push(PlaybackCall::Stop);
    }

    async fn release(&self) {
        self.log().push(PlaybackCall::Release);
    }
}

/// A recorded vibration call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VibrationCall {
    Vibrate { pattern: HapticPattern, repeat: bool },
    Cancel,
}

/// Recording vibration device
#[derive(Debug, Default)]
pub struct MockVibration {
    calls: Mutex<Vec<VibrationCall>>,
}

impl MockVibration {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<VibrationCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn calls(&self) -> Vec<VibrationCall> {
        self.log().clone()
    }

    pub fn vibrate_count(&self) -> usize {
        self.log()
            .iter()
            .filter(|call| matches!(call, VibrationCall::Vibrate { .. }))
            .count()
    }

    pub fn cancel_count(&self) -> usize {
        self.log()
            .iter()
            .filter(|call| matches!(call, VibrationCall::Cancel))
            .count()
    }

    /// True if the last call left the motor running
    pub fn is_vibrating(&self) -> bool {
        matches!(self.log().last(), Some(VibrationCall::Vibrate { .. }))
    }
}

impl VibrationDevice for MockVibration {
    fn vibrate(&self, pattern: &HapticPattern, repeat: bool) {
        self.log().push(VibrationCall::Vibrate {
            pattern: pattern.clone(),
            repeat,
        });
    }

    fn cancel(&self) {
        self.log().push(VibrationCall::Cancel);
    }
}
