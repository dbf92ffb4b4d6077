//! Fallback Orchestrator
//!
//! `Ejector` is the control surface handed to the UI collaborator. Behind it a
//! single owner task holds the one active `Session` together with the
//! playback and vibration devices. Every public operation is a command on an
//! ordered channel, so a `stop()` that arrives while a `start()` is tearing
//! down the previous session simply waits its turn.
//!
//! Tier selection on `start()`:
//! 1. Clip: configure the audio session, loop the pre-recorded clip
//! 2. Synthesized cycle: configure again, run the `FrequencyCycleScheduler`
//!    until its first leg is accepted
//! 3. Vibration only: cannot fail
//!
//! The haptic pattern runs alongside whichever audio tier is active and is
//! the sole output in tier 3. Timer tasks (progress poll, deadline, cycle
//! scheduler) report back as notices tagged with their session id; notices
//! from a session that is no longer active are ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, ParamLimits};
use crate::device::{ClipId, DeviceError, HapticPattern, PlaybackDevice, VibrationDevice};
use crate::engine::params::{Intensity, SessionParams};
use crate::engine::progress::{ProgressReport, ProgressTracker};
use crate::engine::scheduler::{CyclePlan, FrequencyCycleScheduler};
use crate::engine::session::{
    CompletionSource, EngineEvent, EnginePhase, Session, SessionId, SessionStatus, Tier,
};
use crate::engine::tone::ToneSynthesizer;
use crate::error::{ClearwaveError, Result};

const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 64;

enum Command {
    Start {
        params: SessionParams,
        reply: oneshot::Sender<SessionId>,
    },
    Stop {
        reply: oneshot::Sender<Option<SessionId>>,
    },
    PendingTasks {
        reply: oneshot::Sender<usize>,
    },
}

enum Notice {
    Progress(ProgressReport),
    CycleFailed {
        session_id: SessionId,
        error: DeviceError,
    },
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Completed(CompletionSource),
    Stopped,
}

/// Control surface of the playback engine
///
/// Dropping the handle shuts the owner task down, which tears down any
/// active session first.
pub struct Ejector {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
    events: broadcast::Sender<EngineEvent>,
    limits: ParamLimits,
    owner: Option<JoinHandle<()>>,
}

impl Ejector {
    /// Spawn the session owner on the current tokio runtime
    ///
    /// # Errors
    /// `Config` if `config` does not validate.
    ///
    /// # Panics
    /// If called outside a tokio runtime.
    pub fn new(
        playback: Arc<dyn PlaybackDevice>,
        vibration: Arc<dyn VibrationDevice>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let limits = config.limits.clone();

        let owner = SessionOwner {
            playback,
            vibration,
            synthesizer: ToneSynthesizer::new(config.sample_rate),
            haptic_pattern: HapticPattern::new(config.haptic_pattern_ms.clone()),
            clip: ClipId::new(config.clip_id.clone()),
            config,
            status: status_tx,
            events: event_tx.clone(),
            notices: notice_tx,
            active: None,
        };
        let handle = tokio::spawn(owner.run(command_rx, notice_rx));

        Ok(Self {
            commands: command_tx,
            status: status_rx,
            events: event_tx,
            limits,
            owner: Some(handle),
        })
    }

    /// Limits applied by `start` and `start_with`
    pub fn limits(&self) -> &ParamLimits {
        &self.limits
    }

    /// Start a session, replacing any active one
    ///
    /// Always reaches a running phase; device failures degrade the tier
    /// instead of surfacing here.
    ///
    /// # Errors
    /// `InvalidParams` if `params` fall outside this engine's limits. Nothing
    /// is sent to the session owner in that case.
    pub async fn start(&self, params: SessionParams) -> Result<SessionId> {
        params.check(&self.limits)?;
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { params, reply }).await?;
        rx.await.map_err(|_| ClearwaveError::EngineStopped)
    }

    /// Validate raw control-surface input, then start
    ///
    /// # Errors
    /// `InvalidParams` before any session state is touched.
    pub async fn start_with(
        &self,
        frequency_hz: f64,
        duration_ms: u64,
        intensity: Intensity,
    ) -> Result<SessionId> {
        let params = SessionParams::new(frequency_hz, duration_ms, intensity, &self.limits)?;
        self.start(params).await
    }

    /// Stop the active session, if any. Safe to call in any state.
    ///
    /// Returns the id of the session that was stopped.
    pub async fn stop(&self) -> Result<Option<SessionId>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply }).await?;
        rx.await.map_err(|_| ClearwaveError::EngineStopped)
    }

    /// Timer and scheduler tasks still alive for the active session
    pub async fn pending_tasks(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::PendingTasks { reply }).await?;
        rx.await.map_err(|_| ClearwaveError::EngineStopped)
    }

    /// Latest status snapshot
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// `(state, progress)` updates
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Wait until no session is active and return the final status
    pub async fn wait_until_finished(&self) -> Result<SessionStatus> {
        let mut rx = self.status.clone();
        loop {
            {
                let status = rx.borrow_and_update();
                if !status.phase.is_active() {
                    return Ok(status.clone());
                }
            }
            rx.changed()
                .await
                .map_err(|_| ClearwaveError::EngineStopped)?;
        }
    }

    /// Tear down any active session and wait for the owner task to exit
    pub async fn shutdown(mut self) -> Result<()> {
        let owner = self.owner.take();
        drop(self);
        if let Some(owner) = owner {
            owner.await.map_err(|_| ClearwaveError::EngineStopped)?;
        }
        Ok(())
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClearwaveError::EngineStopped)
    }
}

struct ActiveSession {
    session: Session,
    running: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    haptics_active: bool,
}

impl ActiveSession {
    fn new(session: Session) -> Self {
        Self {
            session,
            running: Arc::new(AtomicBool::new(true)),
            tasks: Vec::new(),
            haptics_active: false,
        }
    }

    fn id(&self) -> SessionId {
        self.session.id()
    }

    fn pending_tasks(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }
}

/// Sole owner of the session and the devices
struct SessionOwner {
    playback: Arc<dyn PlaybackDevice>,
    vibration: Arc<dyn VibrationDevice>,
    config: EngineConfig,
    synthesizer: ToneSynthesizer,
    haptic_pattern: HapticPattern,
    clip: ClipId,
    status: watch::Sender<SessionStatus>,
    events: broadcast::Sender<EngineEvent>,
    notices: mpsc::UnboundedSender<Notice>,
    active: Option<ActiveSession>,
}

impl SessionOwner {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut notices: mpsc::UnboundedReceiver<Notice>,
    ) {
        debug!("Session owner started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(notice) = notices.recv() => self.handle_notice(notice).await,
            }
        }

        if let Some(active) = self.active.take() {
            self.teardown(active, Outcome::Stopped).await;
        }
        debug!("Session owner exited");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { params, reply } => {
                let id = self.start(params).await;
                let _ = reply.send(id);
            }
            Command::Stop { reply } => {
                let stopped = match self.active.take() {
                    Some(active) => {
                        let id = active.id();
                        self.teardown(active, Outcome::Stopped).await;
                        Some(id)
                    }
                    None => {
                        debug!("Stop with no active session");
                        None
                    }
                };
                let _ = reply.send(stopped);
            }
            Command::PendingTasks { reply } => {
                let pending = self.active.as_ref().map_or(0, ActiveSession::pending_tasks);
                let _ = reply.send(pending);
            }
        }
    }

    async fn handle_notice(&mut self, notice: Notice) {
        match notice {
            Notice::Progress(ProgressReport::Progress {
                session_id,
                progress,
            }) => {
                if let Some(active) = self.active_matching(session_id) {
                    active.session.record_progress(progress);
                    let status = active.session.status();
                    self.status.send_replace(status);
                }
            }
            Notice::Progress(ProgressReport::Complete { session_id, source }) => {
                match self.active.take() {
                    Some(active) if active.id() == session_id => {
                        self.teardown(active, Outcome::Completed(source)).await;
                    }
                    other => {
                        debug!("Ignoring completion of inactive session {}", session_id);
                        self.active = other;
                    }
                }
            }
            Notice::CycleFailed { session_id, error } => {
                let Some(mut active) = self.active.take() else {
                    return;
                };
                if active.id() == session_id && active.session.phase() == EnginePhase::RunningSynth
                {
                    self.tier_failed(&active, Tier::SynthesizedCycle, &error);
                    self.playback.stop().await;
                    self.enter_running(&mut active, Tier::VibrationOnly);
                } else {
                    debug!("Ignoring cycle failure of session {}: {}", session_id, error);
                }
                self.active = Some(active);
            }
        }
    }

    fn active_matching(&mut self, session_id: SessionId) -> Option<&mut ActiveSession> {
        self.active
            .as_mut()
            .filter(|active| active.id() == session_id)
    }

    async fn start(&mut self, params: SessionParams) -> SessionId {
        if let Some(previous) = self.active.take() {
            info!("Replacing active session {}", previous.id());
            self.teardown(previous, Outcome::Stopped).await;
        }

        let mut active = ActiveSession::new(Session::new(params));
        let id = active.id();
        info!(
            "Session {} starting: {:.0} Hz / {} Hz for {} ms at {} intensity",
            id,
            params.base_frequency_hz(),
            params.high_frequency_hz(),
            params.total_duration_ms(),
            params.intensity()
        );
        self.emit(EngineEvent::SessionStarted {
            session_id: id,
            params,
            timestamp: Utc::now(),
        });
        self.publish_phase(&active);

        match self.attempt_clip(&params).await {
            Ok(()) => self.enter_running(&mut active, Tier::Clip),
            Err(error) => {
                self.tier_failed(&active, Tier::Clip, &error);
                active.session.set_phase(EnginePhase::AttemptingSynth);
                self.publish_phase(&active);

                match self.attempt_synth(&mut active).await {
                    Ok(()) => self.enter_running(&mut active, Tier::SynthesizedCycle),
                    Err(error) => {
                        self.tier_failed(&active, Tier::SynthesizedCycle, &error);
                        active.running.store(false, Ordering::Release);
                        self.playback.stop().await;
                        self.enter_running(&mut active, Tier::VibrationOnly);
                    }
                }
            }
        }

        let tracker = ProgressTracker::new(
            id,
            active.session.started_at(),
            params.total_duration(),
            self.config.poll_interval(),
        );
        let notices = self.notices.clone();
        active.tasks.extend(tracker.spawn(move |report| {
            let _ = notices.send(Notice::Progress(report));
        }));

        self.active = Some(active);
        id
    }

    async fn attempt_clip(&self, params: &SessionParams) -> std::result::Result<(), DeviceError> {
        self.playback.configure_for_playback().await?;
        self.playback
            .play_looped_clip(&self.clip, params.amplitude())
            .await
    }

    /// Spawn the cycle scheduler and wait until its first leg is accepted
    async fn attempt_synth(
        &self,
        active: &mut ActiveSession,
    ) -> std::result::Result<(), DeviceError> {
        self.playback.configure_for_playback().await?;

        let plan = CyclePlan::new(active.session.params(), &self.config.cycle);
        let scheduler = FrequencyCycleScheduler::new(plan, self.synthesizer);
        let (started_tx, started_rx) = oneshot::channel();

        let session_id = active.id();
        let started_at = active.session.started_at();
        let playback = Arc::clone(&self.playback);
        let running = Arc::clone(&active.running);
        let notices = self.notices.clone();

        active.tasks.push(tokio::spawn(async move {
            match scheduler
                .run(playback.as_ref(), &running, started_at, Some(started_tx))
                .await
            {
                Ok(report) => debug!(
                    "Cycle scheduler for {} finished after {} legs",
                    session_id,
                    report.legs.len()
                ),
                Err(error) => {
                    let _ = notices.send(Notice::CycleFailed { session_id, error });
                }
            }
        }));

        started_rx.await.map_err(|_| {
            DeviceError::PlaybackFailed("cycle scheduler ended before its first leg".into())
        })
    }

    fn enter_running(&self, active: &mut ActiveSession, tier: Tier) {
        // Haptics are layered under the audio tiers and are all of tier 3
        if !active.haptics_active {
            self.vibration.vibrate(&self.haptic_pattern, true);
            active.haptics_active = true;
        }
        active.session.set_phase(EnginePhase::running(tier));
        info!("Session {} running on {} tier", active.id(), tier);
        self.publish_phase(active);
    }

    fn tier_failed(&self, active: &ActiveSession, tier: Tier, error: &DeviceError) {
        warn!(
            "Session {}: {} tier failed, falling back: {}",
            active.id(),
            tier,
            error
        );
        self.emit(EngineEvent::TierFailed {
            session_id: active.id(),
            tier,
            reason: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Cancel every task of the session and release both devices
    async fn teardown(&mut self, mut active: ActiveSession, outcome: Outcome) {
        active.running.store(false, Ordering::Release);
        for task in active.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }

        self.playback.stop().await;
        self.playback.release().await;
        self.vibration.cancel();

        let id = active.id();
        match outcome {
            Outcome::Completed(source) => {
                active.session.record_progress(1.0);
                active.session.set_phase(EnginePhase::Completed);
                info!("Session {} completed ({:?})", id, source);
                self.emit(EngineEvent::SessionCompleted {
                    session_id: id,
                    source,
                    timestamp: Utc::now(),
                });
            }
            Outcome::Stopped => {
                active.session.set_phase(EnginePhase::Stopped);
                info!(
                    "Session {} stopped at {:.0}%",
                    id,
                    active.session.progress() * 100.0
                );
                self.emit(EngineEvent::SessionStopped {
                    session_id: id,
                    progress: active.session.progress(),
                    timestamp: Utc::now(),
                });
            }
        }
        self.publish_phase(&active);
    }

    fn publish_phase(&self, active: &ActiveSession) {
        self.status.send_replace(active.session.status());
        self.emit(EngineEvent::PhaseChanged {
            session_id: active.id(),
            phase: active.session.phase(),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MockPlayback, MockVibration, PlaybackCall, PlaybackScript};
    use tokio::time::{self, Duration};

    fn ejector(playback: &Arc<MockPlayback>, vibration: &Arc<MockVibration>) -> Ejector {
        let mut config = EngineConfig::default();
        // Keep synthesized legs small
        config.sample_rate = 1000;
        Ejector::new(playback.clone(), vibration.clone(), config).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_status_is_idle() {
        let playback = Arc::new(MockPlayback::healthy());
        let vibration = Arc::new(MockVibration::new());
        let ejector = ejector(&playback, &vibration);

        let status = ejector.status();
        assert_eq!(status.phase, EnginePhase::Idle);
        assert_eq!(status.session_id, None);
        assert_eq!(ejector.pending_tasks().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clip_tier_layers_haptics() {
        let playback = Arc::new(MockPlayback::healthy());
        let vibration = Arc::new(MockVibration::new());
        let ejector = ejector(&playback, &vibration);

        ejector
            .start_with(165.0, 30_000, Intensity::High)
            .await
            .unwrap();

        assert_eq!(ejector.status().phase, EnginePhase::RunningClip);
        assert_eq!(ejector.status().tier, Some(Tier::Clip));
        assert!(playback.calls().contains(&PlaybackCall::Clip {
            clip: ClipId::new(crate::config::DEFAULT_CLIP_ID),
            volume: 0.9,
        }));
        assert!(vibration.is_vibrating());
        // poll + deadline timers
        assert_eq!(ejector.pending_tasks().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clip_failure_falls_to_synth() {
        let playback = Arc::new(MockPlayback::new(PlaybackScript {
            fail_clip: true,
            ..PlaybackScript::default()
        }));
        let vibration = Arc::new(MockVibration::new());
        let ejector = ejector(&playback, &vibration);
        let mut events = ejector.subscribe_events();

        ejector
            .start_with(440.0, 30_000, Intensity::Low)
            .await
            .unwrap();

        assert_eq!(ejector.status().phase, EnginePhase::RunningSynth);
        assert_eq!(playback.played_frequencies(), vec![440.0]);
        // scheduler + poll + deadline
        assert_eq!(ejector.pending_tasks().await.unwrap(), 3);

        let mut failed_tiers = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::TierFailed { tier, .. } = event {
                failed_tiers.push(tier);
            }
        }
        assert_eq!(failed_tiers, vec![Tier::Clip]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mid_session_cycle_failure_degrades_to_vibration() {
        let playback = Arc::new(MockPlayback::new(PlaybackScript {
            fail_clip: true,
            fail_buffer_after: Some(1),
            ..PlaybackScript::default()
        }));
        let vibration = Arc::new(MockVibration::new());
        let ejector = ejector(&playback, &vibration);

        ejector
            .start_with(165.0, 60_000, Intensity::Medium)
            .await
            .unwrap();
        assert_eq!(ejector.status().phase, EnginePhase::RunningSynth);

        // The high leg is due at 15.1s and is rejected
        time::sleep(Duration::from_millis(16_000)).await;
        let status = ejector.status();
        assert_eq!(status.phase, EnginePhase::RunningVibrationOnly);
        assert_eq!(status.tier, Some(Tier::VibrationOnly));
        assert!(vibration.is_vibrating());
        assert_eq!(vibration.vibrate_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_session_is_noop() {
        let playback = Arc::new(MockPlayback::healthy());
        let vibration = Arc::new(MockVibration::new());
        let ejector = ejector(&playback, &vibration);

        assert_eq!(ejector.stop().await.unwrap(), None);
        assert_eq!(ejector.status().phase, EnginePhase::Idle);
        assert_eq!(playback.release_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_params_touch_nothing() {
        let playback = Arc::new(MockPlayback::healthy());
        let vibration = Arc::new(MockVibration::new());
        let ejector = ejector(&playback, &vibration);

        let err = ejector
            .start_with(20.0, 30_000, Intensity::Medium)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMS");
        assert_eq!(ejector.status(), SessionStatus::default());
        assert!(playback.calls().is_empty());
        assert!(vibration.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rechecks_params_against_engine_limits() {
        let playback = Arc::new(MockPlayback::new(PlaybackScript {
            fail_clip: true,
            ..PlaybackScript::default()
        }));
        let vibration = Arc::new(MockVibration::new());
        let mut config = EngineConfig::default();
        config.sample_rate = 1000;
        config.limits.max_duration_ms = 10_000;
        let ejector = Ejector::new(playback.clone(), vibration.clone(), config).unwrap();

        // Valid under the default limits, too long for this engine
        let err = ejector.start(SessionParams::default()).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMS");
        assert_eq!(ejector.status(), SessionStatus::default());
        assert!(playback.calls().is_empty());
        assert!(vibration.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_devices() {
        let playback = Arc::new(MockPlayback::healthy());
        let vibration = Arc::new(MockVibration::new());
        let ejector = ejector(&playback, &vibration);

        ejector
            .start_with(165.0, 30_000, Intensity::Medium)
            .await
            .unwrap();
        ejector.shutdown().await.unwrap();

        assert_eq!(playback.release_count(), 1);
        assert!(!vibration.is_vibrating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.poll_interval_ms = 0;

        let result = Ejector::new(
            Arc::new(MockPlayback::healthy()),
            Arc::new(MockVibration::new()),
            config,
        );
        assert!(matches!(result, Err(ClearwaveError::Config { .. })));
    }
}
