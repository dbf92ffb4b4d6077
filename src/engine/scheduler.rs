//! Frequency Cycle Scheduler
//!
//! Drives the synthesized tier: base leg, short gap, high leg, long pause,
//! repeated while the session is running and its duration has not elapsed.
//!
//! The loop is an explicit step machine with one exit condition, checked
//! before every leg. A leg already handed to the device is not recalled on
//! cancellation; the orchestrator silences the device itself.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::{self, Duration, Instant};
use tracing::debug;

use crate::config::CycleTiming;
use crate::device::{DeviceError, PlaybackDevice};
use crate::engine::params::SessionParams;
use crate::engine::tone::ToneSynthesizer;

/// Which half of a tone pair a leg belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegKind {
    Base,
    High,
}

/// A leg in the planned timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduledLeg {
    pub index: usize,
    pub pair: usize,
    pub kind: LegKind,
    pub frequency_hz: f64,
    /// Offset from session start, in milliseconds
    pub offset_ms: u64,
    pub duration_ms: u64,
}

/// Fixed cycle geometry of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CyclePlan {
    pub base_frequency_hz: f64,
    pub high_frequency_hz: f64,
    pub amplitude: f32,
    pub leg_ms: u64,
    pub gap_ms: u64,
    pub pause_ms: u64,
    pub total_ms: u64,
}

impl CyclePlan {
    /// Leg length is `min(total / 2, max_leg_ms)`, fixed for every pair
    pub fn new(params: &SessionParams, timing: &CycleTiming) -> Self {
        let leg_ms = (params.total_duration_ms() / 2)
            .min(timing.max_leg_ms)
            .max(1);

        Self {
            base_frequency_hz: params.base_frequency_hz(),
            high_frequency_hz: params.high_frequency_hz(),
            amplitude: params.amplitude(),
            leg_ms,
            gap_ms: timing.gap_ms,
            pause_ms: timing.pause_ms,
            total_ms: params.total_duration_ms(),
        }
    }

    /// Length of one base/gap/high/pause round
    pub fn pair_period_ms(&self) -> u64 {
        2 * self.leg_ms + self.gap_ms + self.pause_ms
    }

    pub fn frequency(&self, kind: LegKind) -> f64 {
        match kind {
            LegKind::Base => self.base_frequency_hz,
            LegKind::High => self.high_frequency_hz,
        }
    }

    /// Every leg that would start before the session ends, assuming device
    /// calls take no time
    pub fn timeline(&self) -> Vec<ScheduledLeg> {
        let mut legs = Vec::new();
        let mut pair = 0;

        loop {
            let pair_start = pair as u64 * self.pair_period_ms();
            let high_start = pair_start + self.leg_ms + self.gap_ms;

            for (kind, offset_ms) in [(LegKind::Base, pair_start), (LegKind::High, high_start)] {
                if offset_ms >= self.total_ms {
                    return legs;
                }
                legs.push(ScheduledLeg {
                    index: legs.len(),
                    pair,
                    kind,
                    frequency_hz: self.frequency(kind),
                    offset_ms,
                    duration_ms: self.leg_ms,
                });
            }
            pair += 1;
        }
    }
}

/// A leg actually handed to the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayedLeg {
    pub kind: LegKind,
    pub frequency_hz: f64,
    pub offset: Duration,
}

/// Summary returned when the scheduler exits normally
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub legs: Vec<PlayedLeg>,
    /// True if the loop exited because the session stopped running
    pub cancelled: bool,
}

impl CycleReport {
    /// Number of complete base+high pairs issued
    pub fn pairs(&self) -> usize {
        self.legs.iter().filter(|l| l.kind == LegKind::High).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Leg(LegKind),
    Gap,
    Pause,
}

/// Runs a `CyclePlan` against a playback device
#[derive(Debug, Clone)]
pub struct FrequencyCycleScheduler {
    plan: CyclePlan,
    synthesizer: ToneSynthesizer,
}

impl FrequencyCycleScheduler {
    pub fn new(plan: CyclePlan, synthesizer: ToneSynthesizer) -> Self {
        Self { plan, synthesizer }
    }

    pub fn plan(&self) -> &CyclePlan {
        &self.plan
    }

    /// Issue legs until `running` clears or the session duration elapses
    ///
    /// `started_at` is the session start; `on_first_leg` (if any) is signalled
    /// once the first leg was accepted by the device.
    ///
    /// # Errors
    /// The first failing `play_buffer` aborts the loop.
    pub async fn run(
        &self,
        device: &dyn PlaybackDevice,
        running: &AtomicBool,
        started_at: Instant,
        mut on_first_leg: Option<oneshot::Sender<()>>,
    ) -> Result<CycleReport, DeviceError> {
        let total = Duration::from_millis(self.plan.total_ms);
        let leg = Duration::from_millis(self.plan.leg_ms);
        let mut report = CycleReport::default();
        let mut step = Step::Leg(LegKind::Base);

        loop {
            match step {
                Step::Leg(kind) => {
                    if !running.load(Ordering::Acquire) {
                        report.cancelled = true;
                        break;
                    }
                    let offset = started_at.elapsed();
                    if offset >= total {
                        break;
                    }

                    let frequency_hz = self.plan.frequency(kind);
                    let buffer =
                        self.synthesizer
                            .synthesize(frequency_hz, self.plan.leg_ms, self.plan.amplitude);
                    debug!(
                        "Leg {} ({:?}) at {:.0} Hz, offset {:?}",
                        report.legs.len(),
                        kind,
                        frequency_hz,
                        offset
                    );
                    device.play_buffer(buffer).await?;

                    report.legs.push(PlayedLeg {
                        kind,
                        frequency_hz,
                        offset,
                    });
                    if let Some(tx) = on_first_leg.take() {
                        let _ = tx.send(());
                    }

                    time::sleep(leg).await;
                    step = match kind {
                        LegKind::Base => Step::Gap,
                        LegKind::High => Step::Pause,
                    };
                }
                Step::Gap => {
                    time::sleep(Duration::from_millis(self.plan.gap_ms)).await;
                    step = Step::Leg(LegKind::High);
                }
                Step::Pause => {
                    time::sleep(Duration::from_millis(self.plan.pause_ms)).await;
                    step = Step::Leg(LegKind::Base);
                }
            }
        }

        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================
