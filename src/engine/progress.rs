//! Progress Tracking
//!
//! Polls elapsed time against the session length at a fixed cadence and
//! reports normalized progress. Completion has two independent triggers: the
//! poll observing `progress >= 1`, and a hard deadline timer armed for the
//! full session length. A shared `CompletionLatch` makes sure only the first
//! of the two is reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::debug;

use crate::engine::session::{CompletionSource, SessionId};

/// One-shot flag shared by the poll and deadline triggers
#[derive(Debug, Clone, Default)]
pub struct CompletionLatch(Arc<AtomicBool>);

impl CompletionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for exactly one caller, ever
    pub fn fire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_fired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Reports sent back to the session owner
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressReport {
    Progress {
        session_id: SessionId,
        progress: f64,
    },
    Complete {
        session_id: SessionId,
        source: CompletionSource,
    },
}

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub progress: f64,
    /// True only on the poll that first observed completion
    pub completed: bool,
}

/// Elapsed-time tracker for one session
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    session_id: SessionId,
    started_at: Instant,
    total: Duration,
    cadence: Duration,
    last: f64,
    latch: CompletionLatch,
}

impl ProgressTracker {
    pub fn new(session_id: SessionId, started_at: Instant, total: Duration, cadence: Duration) -> Self {
        Self {
            session_id,
            started_at,
            total,
            cadence,
            last: 0.0,
            latch: CompletionLatch::new(),
        }
    }

    pub fn latch(&self) -> CompletionLatch {
        self.latch.clone()
    }

    pub fn deadline(&self) -> Instant {
        self.started_at + self.total
    }

    /// `clamp((now - started_at) / total, 0, 1)`
    pub fn progress_at(&self, now: Instant) -> f64 {
        if self.total.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f64() / self.total.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Sample progress at `now`
    ///
    /// Successive samples never decrease. `completed` is set on the first
    /// sample that reaches 1.0, unless the deadline trigger got there first.
    pub fn poll(&mut self, now: Instant) -> ProgressSample {
        self.last = self.last.max(self.progress_at(now));
        let completed = self.last >= 1.0 && self.latch.fire();
        ProgressSample {
            progress: self.last,
            completed,
        }
    }

    /// Spawn the poll loop and the deadline timer
    ///
    /// Both tasks exit on their own once the session is complete; the owner
    /// aborts them earlier on `stop()`.
    pub fn spawn<F>(self, report: F) -> Vec<JoinHandle<()>>
    where
        F: Fn(ProgressReport) + Send + Sync + 'static,
    {
        let report = Arc::new(report);
        let session_id = self.session_id;
        let deadline = self.deadline();
        let latch = self.latch();

        let deadline_report = Arc::clone(&report);
        let deadline_task = tokio::spawn(async move {
            time::sleep_until(deadline).await;
            if latch.fire() {
                debug!("Deadline timer completed session {}", session_id);
                deadline_report(ProgressReport::Complete {
                    session_id,
                    source: CompletionSource::Deadline,
                });
            }
        });

        let poll_task = tokio::spawn(poll_loop(self, report));

        vec![poll_task, deadline_task]
    }
}

async fn poll_loop<F>(mut tracker: ProgressTracker, report: Arc<F>)
where
    F: Fn(ProgressReport) + Send + Sync + 'static,
{
    let mut interval = time::interval(tracker.cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let sample = tracker.poll(Instant::now());
        report(ProgressReport::Progress {
            session_id: tracker.session_id,
            progress: sample.progress,
        });

        if sample.completed {
            debug!("Progress poll completed session {}", tracker.session_id);
            report(ProgressReport::Complete {
                session_id: tracker.session_id,
                source: CompletionSource::Poll,
            });
            break;
        }
        if sample.progress >= 1.0 {
            // Deadline timer already reported completion
            break;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn tracker(total_ms: u64) -> ProgressTracker {
        ProgressTracker::new(
            Uuid::new_v4(),
            Instant::now(),
            Duration::from_millis(total_ms),
            Duration::from_millis(100),
        )
    }

    #[test]
    fn test_latch_fires_once() {
        let latch = CompletionLatch::new();
        let other = latch.clone();

        assert!(!latch.is_fired());
        assert!(latch.fire());
        assert!(!other.fire());
        assert!(other.is_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_at_is_clamped() {
        let tracker = tracker(2000);
        let start = Instant::now();

        assert_eq!(tracker.progress_at(start), 0.0);
        assert_abs_diff_eq!(tracker.progress_at(start + Duration::from_millis(500)), 0.25);
        assert_eq!(tracker.progress_at(start + Duration::from_secs(10)), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_completion_signalled_once() {
        let mut tracker = tracker(1000);
        let start = Instant::now();

        let before = tracker.poll(start + Duration::from_millis(900));
        assert!(!before.completed);

        let first = tracker.poll(start + Duration::from_millis(1000));
        let second = tracker.poll(start + Duration::from_millis(1100));
        assert!(first.completed);
        assert!(!second.completed);
        assert_eq!(second.progress, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_and_deadline_at_same_instant_complete_once() {
        let mut tracker = tracker(1000);
        let deadline_latch = tracker.latch();
        let at_deadline = tracker.deadline();

        // Deadline timer wins the race; the poll must not signal again
        assert!(deadline_latch.fire());
        let sample = tracker.poll(at_deadline);
        assert_eq!(sample.progress, 1.0);
        assert!(!sample.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_tasks_report_exactly_one_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracker = tracker(1000);
        let handles = tracker.spawn(move |report| {
            let _ = tx.send(report);
        });

        time::sleep(Duration::from_millis(1500)).await;
        for handle in handles {
            assert!(handle.is_finished());
        }

        let mut progress = Vec::new();
        let mut completions = 0;
        while let Ok(report) = rx.try_recv() {
            match report {
                ProgressReport::Progress { progress: p, .. } => progress.push(p),
                ProgressReport::Complete { .. } => completions += 1,
            }
        }

        assert_eq!(completions, 1);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(progress.len() >= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_when_polling_is_starved() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Cadence longer than the session: only the deadline can complete it in time
        let tracker = ProgressTracker::new(
            Uuid::new_v4(),
            Instant::now(),
            Duration::from_millis(1000),
            Duration::from_secs(60),
        );
        let _handles = tracker.spawn(move |report| {
            let _ = tx.send(report);
        });

        time::sleep(Duration::from_millis(1001)).await;

        let mut sources = Vec::new();
        while let Ok(report) = rx.try_recv() {
            if let ProgressReport::Complete { source, .. } = report {
                sources.push(source);
            }
        }
        assert_eq!(sources, vec![CompletionSource::Deadline]);
    }
}
