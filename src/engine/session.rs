//! Session State Machine Types
//!
//! Phases of the fallback state machine, the tier that produced output, and
//! the snapshot published to UI collaborators.
//!
//! ```text
//! Idle → AttemptingClip → RunningClip
//!                       ↘ AttemptingSynth → RunningSynth
//!                                         ↘ RunningVibrationOnly
//! Running* → Completed | Stopped
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::engine::params::SessionParams;

pub type SessionId = Uuid;

/// Output strategy. Ordered: a session only ever moves to a later tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Pre-recorded looping clip
    Clip,
    /// Alternating base/high synthesized legs
    SynthesizedCycle,
    /// Haptic pattern only
    VibrationOnly,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Clip => write!(f, "clip"),
            Tier::SynthesizedCycle => write!(f, "synthesized-cycle"),
            Tier::VibrationOnly => write!(f, "vibration-only"),
        }
    }
}

/// Internal state of the fallback orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    /// No session has run yet
    #[default]
    Idle,
    AttemptingClip,
    RunningClip,
    AttemptingSynth,
    RunningSynth,
    RunningVibrationOnly,
    /// Last session reached its full duration
    Completed,
    /// Last session was cancelled by `stop()` or replaced by a new `start()`
    Stopped,
}

impl EnginePhase {
    /// Phase reached once `tier` is producing output
    pub fn running(tier: Tier) -> Self {
        match tier {
            Tier::Clip => EnginePhase::RunningClip,
            Tier::SynthesizedCycle => EnginePhase::RunningSynth,
            Tier::VibrationOnly => EnginePhase::RunningVibrationOnly,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(
            self,
            EnginePhase::RunningClip | EnginePhase::RunningSynth | EnginePhase::RunningVibrationOnly
        )
    }

    /// True while a session exists (attempting a tier or running)
    pub fn is_active(self) -> bool {
        !matches!(
            self,
            EnginePhase::Idle | EnginePhase::Completed | EnginePhase::Stopped
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EnginePhase::Completed | EnginePhase::Stopped)
    }

    /// Coarse projection for the UI collaborator
    pub fn session_state(self) -> SessionState {
        match self {
            EnginePhase::Idle => SessionState::Idle,
            EnginePhase::Completed => SessionState::Completed,
            EnginePhase::Stopped => SessionState::Stopped,
            _ => SessionState::Running,
        }
    }
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnginePhase::Idle => "Idle",
            EnginePhase::AttemptingClip => "AttemptingClip",
            EnginePhase::RunningClip => "RunningClip",
            EnginePhase::AttemptingSynth => "AttemptingSynth",
            EnginePhase::RunningSynth => "RunningSynth",
            EnginePhase::RunningVibrationOnly => "RunningVibrationOnly",
            EnginePhase::Completed => "Completed",
            EnginePhase::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Session state as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Running => write!(f, "running"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Which trigger ended a session that ran to its full duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSource {
    /// The 100ms progress poll observed progress >= 1
    Poll,
    /// The hard deadline timer fired
    Deadline,
}

/// Snapshot published on every state or progress change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionStatus {
    /// Current (or, in a terminal phase, last) session
    pub session_id: Option<SessionId>,
    pub phase: EnginePhase,
    pub tier: Option<Tier>,
    /// Normalized elapsed time in [0, 1]
    pub progress: f64,
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionStatus {
    pub fn state(&self) -> SessionState {
        self.phase.session_state()
    }
}

/// Lifecycle events broadcast to any number of listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    SessionStarted {
        session_id: SessionId,
        params: SessionParams,
        timestamp: DateTime<Utc>,
    },
    PhaseChanged {
        session_id: SessionId,
        phase: EnginePhase,
        timestamp: DateTime<Utc>,
    },
    TierFailed {
        session_id: SessionId,
        tier: Tier,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    SessionCompleted {
        session_id: SessionId,
        source: CompletionSource,
        timestamp: DateTime<Utc>,
    },
    SessionStopped {
        session_id: SessionId,
        progress: f64,
        timestamp: DateTime<Utc>,
    },
}

/// One user-initiated run, from `start()` to a terminal phase
///
/// Elapsed time is derived from a monotonic clock and never stored.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    params: SessionParams,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    phase: EnginePhase,
    tier: Option<Tier>,
    progress: f64,
}

impl Session {
    pub fn new(params: SessionParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            params,
            started_at: Instant::now(),
            started_wall: Utc::now(),
            phase: EnginePhase::AttemptingClip,
            tier: None,
            progress: 0.0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn tier(&self) -> Option<Tier> {
        self.tier
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Move to a new phase; the tier is derived from running phases
    pub fn set_phase(&mut self, phase: EnginePhase) {
        self.phase = phase;
        self.tier = match phase {
            EnginePhase::RunningClip => Some(Tier::Clip),
            EnginePhase::RunningSynth => Some(Tier::SynthesizedCycle),
            EnginePhase::RunningVibrationOnly => Some(Tier::VibrationOnly),
            _ => self.tier,
        };
    }

    /// Record a progress sample. Progress never decreases within a session.
    pub fn record_progress(&mut self, progress: f64) {
        self.progress = self.progress.max(progress.clamp(0.0, 1.0));
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: Some(self.id),
            phase: self.phase,
            tier: self.tier,
            progress: self.progress,
            started_at: Some(self.started_wall),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_attempts_clip_first() {
        let session = Session::new(SessionParams::default());
        assert_eq!(session.phase(), EnginePhase::AttemptingClip);
        assert_eq!(session.tier(), None);
        assert_eq!(session.progress(), 0.0);
    }

    #[test]
    fn test_running_phase_sets_tier() {
        let mut session = Session::new(SessionParams::default());
        session.set_phase(EnginePhase::AttemptingSynth);
        assert_eq!(session.tier(), None);

        session.set_phase(EnginePhase::RunningSynth);
        assert_eq!(session.tier(), Some(Tier::SynthesizedCycle));

        // The tier survives into the terminal phase
        session.set_phase(EnginePhase::Stopped);
        assert_eq!(session.tier(), Some(Tier::SynthesizedCycle));
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let mut session = Session::new(SessionParams::default());
        session.record_progress(0.4);
        session.record_progress(0.2);
        assert_eq!(session.progress(), 0.4);

        session.record_progress(1.7);
        assert_eq!(session.progress(), 1.0);
    }

    #[test]
    fn test_phase_projection() {
        assert_eq!(EnginePhase::Idle.session_state(), SessionState::Idle);
        assert_eq!(
            EnginePhase::AttemptingSynth.session_state(),
            SessionState::Running
        );
        assert_eq!(
            EnginePhase::RunningVibrationOnly.session_state(),
            SessionState::Running
        );
        assert_eq!(EnginePhase::Completed.session_state(), SessionState::Completed);
        assert_eq!(EnginePhase::Stopped.session_state(), SessionState::Stopped);
    }

    #[test]
    fn test_phase_queries() {
        assert!(EnginePhase::RunningClip.is_running());
        assert!(!EnginePhase::AttemptingClip.is_running());
        assert!(EnginePhase::AttemptingClip.is_active());
        assert!(!EnginePhase::Completed.is_active());
        assert!(EnginePhase::Stopped.is_terminal());
    }

    #[test]
    fn test_tier_order() {
        assert!(Tier::Clip < Tier::SynthesizedCycle);
        assert!(Tier::SynthesizedCycle < Tier::VibrationOnly);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", EnginePhase::RunningSynth), "RunningSynth");
        assert_eq!(format!("{}", Tier::VibrationOnly), "vibration-only");
    }
}
