//! ClearWave CLI - Water-Ejection Playback Engine
//!
//! Command-line interface for running sessions against host devices.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clearwave::cli::commands;
use clearwave::cli::{Cli, Commands};
use clearwave::EngineConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("ClearWave v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(cmd) => handle_command(cmd, config).await,
        None => {
            println!("ClearWave v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

async fn handle_command(cmd: Commands, config: EngineConfig) -> Result<()> {
    match cmd {
        Commands::Run {
            frequency,
            duration,
            intensity,
            render_dir,
            no_clip,
        } => {
            commands::run_session(
                config,
                frequency,
                duration,
                intensity,
                render_dir.as_deref(),
                no_clip,
            )
            .await?;
            Ok(())
        }
        Commands::Synth {
            frequency,
            duration,
            intensity,
            output,
        } => commands::synth(&config, frequency, duration, intensity, &output),
        Commands::Plan {
            frequency,
            duration,
        } => commands::plan(&config, frequency, duration),
        Commands::Config => commands::print_config(&config),
    }
}
