//! CLI Module
//!
//! Command-line interface for driving the playback engine on a host.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::params::{Intensity, DEFAULT_BASE_FREQUENCY_HZ, DEFAULT_DURATION_MS};

/// ClearWave - speaker water-ejection playback engine
#[derive(Parser, Debug)]
#[command(name = "clearwave-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one ejection session against console or WAV devices
    #[command(name = "run")]
    Run {
        /// Base frequency in Hz
        #[arg(short, long, default_value_t = DEFAULT_BASE_FREQUENCY_HZ)]
        frequency: f64,

        /// Session length in milliseconds
        #[arg(short, long, default_value_t = DEFAULT_DURATION_MS)]
        duration: u64,

        /// Output strength
        #[arg(short, long, value_enum, default_value_t = Intensity::Medium)]
        intensity: Intensity,

        /// Render every synthesized leg to WAV files in this directory
        #[arg(long)]
        render_dir: Option<PathBuf>,

        /// Pretend the clip library is missing
        #[arg(long)]
        no_clip: bool,
    },

    /// Synthesize a single tone to a WAV file
    #[command(name = "synth")]
    Synth {
        /// Tone frequency in Hz
        #[arg(short, long, default_value_t = DEFAULT_BASE_FREQUENCY_HZ)]
        frequency: f64,

        /// Tone length in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        duration: u64,

        /// Output strength
        #[arg(short, long, value_enum, default_value_t = Intensity::Medium)]
        intensity: Intensity,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the planned leg timeline of a synthesized session as JSON
    #[command(name = "plan")]
    Plan {
        /// Base frequency in Hz
        #[arg(short, long, default_value_t = DEFAULT_BASE_FREQUENCY_HZ)]
        frequency: f64,

        /// Session length in milliseconds
        #[arg(short, long, default_value_t = DEFAULT_DURATION_MS)]
        duration: u64,
    },

    /// Print the effective engine configuration as JSON
    #[command(name = "config")]
    Config,
}
