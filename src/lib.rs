//! ClearWave - Speaker Water-Ejection Playback Engine
//!
//! Plays a low/high tone sequence through the device speaker to push water
//! out of the grille, degrading gracefully when audio is unavailable:
//! 1. Pre-recorded looping clip
//! 2. Synthesized base/high frequency cycle
//! 3. Haptic pattern only
//!
//! # Architecture
//!
//! An `Ejector` handle talks to a single session owner task. Devices are
//! injected as trait objects (`PlaybackDevice`, `VibrationDevice`), so the
//! same engine runs against platform audio, the console, a WAV renderer,
//! or test mocks.

pub mod cli;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::{Ejector, EngineEvent, EnginePhase, Intensity, SessionParams, SessionStatus, Tier};
pub use error::{ClearwaveError, Result};
