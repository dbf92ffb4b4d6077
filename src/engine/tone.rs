//! Tone Synthesis
//!
//! Produces mono sine-wave legs. Synthesis is a pure function of its inputs:
//! the same frequency, duration, amplitude and sample rate always yield
//! bit-identical samples.

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::config::DEFAULT_SAMPLE_RATE;

/// One synthesized tone leg
///
/// Owned by the playback call that consumes it; never cached across legs.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneBuffer {
    frequency_hz: f64,
    duration_ms: u64,
    sample_rate: u32,
    amplitude: f32,
    samples: Vec<f32>,
}

impl ToneBuffer {
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }

    /// SHA-256 over the sample bit patterns, as lowercase hex
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sample_rate.to_le_bytes());
        for sample in &self.samples {
            hasher.update(sample.to_bits().to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Sine-wave generator for cycle legs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneSynthesizer {
    sample_rate: u32,
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl ToneSynthesizer {
    /// # Panics
    /// If `sample_rate` is zero.
    pub fn new(sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be > 0");
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples a leg of `duration_ms` occupies
    pub fn sample_count(&self, duration_ms: u64) -> usize {
        (self.sample_rate as f64 * duration_ms as f64 / 1000.0).round() as usize
    }

    /// Synthesize `amplitude * sin(2π·f·t)` for `t = n / sample_rate`
    ///
    /// # Panics
    /// If `frequency_hz` or `duration_ms` is not positive, or `amplitude` is
    /// outside `[0, 1]`. Callers validate through `SessionParams` first.
    pub fn synthesize(&self, frequency_hz: f64, duration_ms: u64, amplitude: f32) -> ToneBuffer {
        assert!(
            frequency_hz.is_finite() && frequency_hz > 0.0,
            "frequency must be > 0, got {}",
            frequency_hz
        );
        assert!(duration_ms > 0, "duration must be > 0");
        assert!(
            (0.0..=1.0).contains(&amplitude),
            "amplitude must lie in [0, 1], got {}",
            amplitude
        );

        let num_samples = self.sample_count(duration_ms);
        let angular_freq = 2.0 * std::f64::consts::PI * frequency_hz;
        let sample_rate = self.sample_rate as f64;
        let amplitude_f64 = amplitude as f64;

        let samples = (0..num_samples)
            .map(|n| {
                let t = n as f64 / sample_rate;
                (amplitude_f64 * (angular_freq * t).sin()) as f32
            })
            .collect();

        ToneBuffer {
            frequency_hz,
            duration_ms,
            sample_rate: self.sample_rate,
            amplitude,
            samples,
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
    use test_case::test_case;

    #[test]
    fn test_synthesis_is_deterministic() {
        let synth = ToneSynthesizer::default();
        let a = synth.synthesize(165.0, 250, 0.6);
        let b = synth.synthesize(165.0, 250, 0.6);

        assert_eq!(a.samples(), b.samples());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test_case(1000, 44100 ; "one second")]
    #[test_case(15_000, 661_500 ; "fifteen second leg")]
    #[test_case(1, 44 ; "one millisecond rounds down")]
    #[test_case(3, 132 ; "three milliseconds rounds")]
    fn test_sample_count(duration_ms: u64, expected: usize) {
        let synth = ToneSynthesizer::new(44100);
        assert_eq!(synth.sample_count(duration_ms), expected);
    }

    #[test]
    fn test_odd_sample_count_rounds_half_up() {
        // 1500 Hz * 1 ms = 1.5 samples
        let synth = ToneSynthesizer::new(1500);
        assert_eq!(synth.sample_count(1), 2);
        assert_eq!(synth.synthesize(100.0, 1, 0.5).num_samples(), 2);
    }

    #[test]
    fn test_amplitude_bounds_peak() {
        let synth = ToneSynthesizer::default();
        let buffer = synth.synthesize(2000.0, 100, 0.9);

        assert!(buffer.peak() <= 0.9 + 1e-6);
        assert!(buffer.peak() > 0.85);
    }

    #[test]
    fn test_first_sample_is_zero_and_quarter_period_peaks() {
        let synth = ToneSynthesizer::new(44100);
        // 441 Hz -> 100 samples per period, quarter period = 25 samples
        let buffer = synth.synthesize(441.0, 10, 0.3);

        assert_abs_diff_eq!(buffer.samples()[0], 0.0);
        assert_abs_diff_eq!(buffer.samples()[25], 0.3, epsilon = 1e-5);
        assert_abs_diff_eq!(buffer.samples()[75], -0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_different_frequency_changes_fingerprint() {
        let synth = ToneSynthesizer::default();
        let base = synth.synthesize(165.0, 50, 0.6);
        let high = synth.synthesize(2000.0, 50, 0.6);

        assert_eq!(base.num_samples(), high.num_samples());
        assert_ne!(base.fingerprint(), high.fingerprint());
    }

    #[test]
    fn test_zero_amplitude_is_silent() {
        let buffer = ToneSynthesizer::default().synthesize(440.0, 20, 0.0);
        assert_eq!(buffer.peak(), 0.0);
        assert!(buffer.num_samples() > 0);
    }

    #[test]
    #[should_panic(expected = "frequency must be > 0")]
    fn test_zero_frequency_panics() {
        ToneSynthesizer::default().synthesize(0.0, 100, 0.5);
    }

    #[test]
    #[should_panic(expected = "duration must be > 0")]
    fn test_zero_duration_panics() {
        ToneSynthesizer::default().synthesize(440.0, 0, 0.5);
    }

    #[test]
    #[should_panic(expected = "amplitude must lie in [0, 1]")]
    fn test_amplitude_above_one_panics() {
        ToneSynthesizer::default().synthesize(440.0, 100, 1.5);
    }
}
