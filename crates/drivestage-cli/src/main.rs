//! drivestage CLI - Staged folder pipeline for Google Drive
//!
//! Provides commands for:
//! - Running the watcher (push channel or polling)
//! - Running the mover HTTP endpoint
//! - Pushing a single file through the pipeline
//! - Scanning the monitored folder once

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use drivestage_core::config::{LogFormat, ENV_LOG_FORMAT};

mod commands;
mod output;
mod wiring;

use commands::{mover::MoverCommand, run::RunCommand, scan::ScanCommand, watch::WatchCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "drivestage",
    version,
    about = "Move new Drive files from an input folder through staging to output"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch the monitored folder and relay new files to the mover
    Watch(WatchCommand),
    /// Serve the mover endpoint
    Mover(MoverCommand),
    /// Run the pipeline for a single file
    Run(RunCommand),
    /// Scan the monitored folder once
    Scan(ScanCommand),
}

/// Installs the global subscriber. `RUST_LOG` wins over `-v`, and
/// `LOG_FORMAT=json` selects JSON lines.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let format = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = OutputFormat::from_flag(cli.json);

    match cli.command {
        Commands::Watch(cmd) => cmd.execute(format).await,
        Commands::Mover(cmd) => cmd.execute(format).await,
        Commands::Run(cmd) => cmd.execute(format).await,
        Commands::Scan(cmd) => cmd.execute(format).await,
    }
}
