//! WAV-rendering playback device
//!
//! Writes every leg it is handed to `leg-NNN-<freq>hz.wav` in a directory.
//! It holds no clip library, so a session against it always runs the
//! synthesized tier.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ClipId, DeviceError, PlaybackDevice};
use crate::engine::io::export_tone;
use crate::engine::tone::ToneBuffer;

#[derive(Debug)]
pub struct WavRenderPlayback {
    dir: PathBuf,
    legs: AtomicUsize,
}

impl WavRenderPlayback {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            legs: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn leg_path(&self, index: usize, frequency_hz: f64) -> PathBuf {
        self.dir
            .join(format!("leg-{:03}-{:.0}hz.wav", index, frequency_hz))
    }
}

#[async_trait]
impl PlaybackDevice for WavRenderPlayback {
    async fn configure_for_playback(&self) -> Result<(), DeviceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DeviceError::Unavailable(format!("{}: {}", self.dir.display(), e)))?;
        info!("Rendering legs to {}", self.dir.display());
        Ok(())
    }

    async fn play_buffer(&self, buffer: ToneBuffer) -> Result<(), DeviceError> {
        let index = self.legs.fetch_add(1, Ordering::Relaxed);
        let path = self.leg_path(index, buffer.frequency_hz());

        // hound writes synchronously
        let written = path.clone();
        tokio::task::spawn_blocking(move || export_tone(&buffer, &written))
            .await
            .map_err(|e| DeviceError::PlaybackFailed(format!("render task failed: {}", e)))?
            .map_err(|e| DeviceError::PlaybackFailed(e.to_string()))?;

        debug!("Rendered {}", path.display());
        Ok(())
    }

    async fn play_looped_clip(&self, clip: &ClipId, _volume: f32) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable(format!(
            "no clip library when rendering (requested '{}')",
            clip
        )))
    }

    async fn stop(&self) {}

    async fn release(&self) {
        debug!("Rendered {} legs", self.legs.load(Ordering::Relaxed));
    }
}
