//! Tone file I/O
//!
//! Exports synthesized legs as mono 32-bit float WAV files so that a leg can
//! be inspected or handed to a platform player that only accepts files.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::tone::ToneBuffer;
use crate::error::Result;

/// Write `buffer` to `path` as mono 32-bit float WAV
pub fn export_tone(buffer: &ToneBuffer, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in buffer.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Read back the samples and sample rate of an exported tone
pub fn read_tone_samples(path: &Path) -> Result<(u32, Vec<f32>)> {
    let mut reader = WavReader::open(path)?;
    let sample_rate = reader.spec().sample_rate;
    let samples = reader
        .samples::<f32>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((sample_rate, samples))
}

// ============================================================================
// Tests
// ============================================================================
