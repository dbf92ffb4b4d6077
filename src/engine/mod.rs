//! Playback Engine Module
//!
//! Session model and the pieces that drive it:
//! - Tone synthesis and WAV rendering
//! - Session parameters and state machine types
//! - Frequency cycle scheduling
//! - Progress tracking
//! - The fallback orchestrator that owns the active session

pub mod io;
pub mod orchestrator;
pub mod params;
pub mod progress;
pub mod scheduler;
pub mod session;
pub mod tone;

pub use io::{export_tone, read_tone_samples};
pub use orchestrator::Ejector;
pub use params::{
    Intensity, SessionParams, DEFAULT_BASE_FREQUENCY_HZ, DEFAULT_DURATION_MS, HIGH_FREQUENCY_HZ,
};
pub use progress::{CompletionLatch, ProgressReport, ProgressTracker};
pub use scheduler::{CyclePlan, CycleReport, FrequencyCycleScheduler, LegKind, ScheduledLeg};
pub use session::{
    CompletionSource, EngineEvent, EnginePhase, Session, SessionId, SessionState, SessionStatus,
    Tier,
};
pub use tone::{ToneBuffer, ToneSynthesizer};
