//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::device::{ConsolePlayback, ConsoleVibration, PlaybackDevice, WavRenderPlayback};
use crate::engine::io::export_tone;
use crate::engine::params::{Intensity, SessionParams};
use crate::engine::scheduler::CyclePlan;
use crate::engine::session::SessionStatus;
use crate::engine::tone::ToneSynthesizer;
use crate::engine::Ejector;

/// Load the engine configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration: {}", path.display());
            EngineConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Run one session to completion, stopping early on Ctrl-C.
pub async fn run_session(
    config: EngineConfig,
    frequency_hz: f64,
    duration_ms: u64,
    intensity: Intensity,
    render_dir: Option<&Path>,
    no_clip: bool,
) -> Result<SessionStatus> {
    let playback: Arc<dyn PlaybackDevice> = match render_dir {
        Some(dir) => Arc::new(WavRenderPlayback::new(dir)),
        None if no_clip => Arc::new(ConsolePlayback::without_clips()),
        None => Arc::new(ConsolePlayback::new()),
    };

    let ejector = Ejector::new(playback, Arc::new(ConsoleVibration::new()), config)
        .context("Failed to create playback engine")?;
    let mut status_rx = ejector.subscribe();

    let session_id = ejector
        .start_with(frequency_hz, duration_ms, intensity)
        .await
        .context("Failed to start session")?;
    println!("Session {} started", session_id);

    let mut last_decile = None;
    let final_status = loop {
        tokio::select! {
            changed = status_rx.changed() => {
                changed.context("Playback engine exited unexpectedly")?;
                let status = status_rx.borrow_and_update().clone();
                if !status.phase.is_active() {
                    break status;
                }

                let decile = (status.progress * 10.0).floor() as u32;
                if last_decile != Some(decile) {
                    let tier = status.tier.map(|t| t.to_string()).unwrap_or_default();
                    println!("{:>3}%  {}  {}", decile * 10, status.phase, tier);
                    last_decile = Some(decile);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                warn!("Interrupted, stopping session");
                ejector.stop().await?;
            }
        }
    };

    ejector.shutdown().await?;

    println!(
        "Session {} {} at {:.0}%",
        session_id,
        final_status.state(),
        final_status.progress * 100.0
    );
    Ok(final_status)
}

/// Synthesize a single tone and export it as WAV.
pub fn synth(
    config: &EngineConfig,
    frequency_hz: f64,
    duration_ms: u64,
    intensity: Intensity,
    output: &Path,
) -> Result<()> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        bail!("Frequency must be a positive number of Hz, got {}", frequency_hz);
    }
    if duration_ms == 0 {
        bail!("Duration must be at least 1 ms");
    }

    let buffer = ToneSynthesizer::new(config.sample_rate).synthesize(
        frequency_hz,
        duration_ms,
        intensity.amplitude(),
    );
    export_tone(&buffer, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Tone written: {}", output.display());
    println!("Frequency: {:.1} Hz", buffer.frequency_hz());
    println!(
        "Samples: {} @ {} Hz ({} ms)",
        buffer.num_samples(),
        buffer.sample_rate(),
        buffer.duration_ms()
    );
    println!("Peak: {:.3}", buffer.peak());
    println!("SHA-256: {}", buffer.fingerprint());

    Ok(())
}

/// Print the cycle plan and leg timeline of a synthesized session.
pub fn plan(config: &EngineConfig, frequency_hz: f64, duration_ms: u64) -> Result<()> {
    let params = SessionParams::new(frequency_hz, duration_ms, Intensity::Medium, &config.limits)?;
    let plan = CyclePlan::new(&params, &config.cycle);

    let report = json!({
        "plan": plan,
        "timeline": plan.timeline(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Print the effective configuration.
pub fn print_config(config: &EngineConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::read_tone_samples;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_defaults_without_path() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("missing.json"))).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_synth_writes_wav() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("tone.wav");
        let mut config = EngineConfig::default();
        config.sample_rate = 8000;

        synth(&config, 2000.0, 250, Intensity::High, &output).unwrap();

        let (rate, samples) = read_tone_samples(&output).unwrap();
        assert_eq!(rate, 8000);
        assert_eq!(samples.len(), 2000);
    }

    #[test]
    fn test_synth_rejects_bad_input() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("tone.wav");
        let config = EngineConfig::default();

        assert!(synth(&config, 0.0, 250, Intensity::Low, &output).is_err());
        assert!(synth(&config, 440.0, 0, Intensity::Low, &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_plan_validates_params() {
        let config = EngineConfig::default();
        assert!(plan(&config, 165.0, 60_000).is_ok());
        assert!(plan(&config, 5000.0, 60_000).is_err());
    }

    // Real clock: leg rendering goes through spawn_blocking
    #[tokio::test]
    async fn test_run_session_renders_legs() {
        let dir = tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.sample_rate = 1000;

        let status = run_session(
            config,
            165.0,
            2_000,
            Intensity::Low,
            Some(dir.path()),
            false,
        )
        .await
        .unwrap();

        assert_eq!(status.state(), crate::engine::SessionState::Completed);
        assert_eq!(status.progress, 1.0);
        assert!(dir.path().join("leg-000-165hz.wav").exists());
        assert!(dir.path().join("leg-001-2000hz.wav").exists());
    }
}
