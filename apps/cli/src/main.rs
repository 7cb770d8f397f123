mod board;
mod fw;

use std::path::PathBuf;

use anyhow::{Context, Result};
use athfw_core::{DiffError, ToolConfig};
use clap::{Parser, Subcommand};
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(author, version, about = "ath10k/ath11k board and firmware container tool", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Tool configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Board-data containers (board-2.bin)
    #[command(subcommand)]
    Board(board::BoardCommand),
    /// Firmware containers (firmware-N.bin)
    #[command(subcommand)]
    Fw(fw::FwCommand),
}

fn load_config(path: Option<&PathBuf>) -> Result<ToolConfig> {
    match path {
        Some(path) => {
            let config = ToolConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            debug!(path = %path.display(), "Loaded config");
            Ok(config)
        }
        None => Ok(ToolConfig::default()),
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    match args.command {
        Command::Board(cmd) => board::run(cmd, &config),
        Command::Fw(cmd) => fw::run(cmd, &config),
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {e}");
    }

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

/// 2 when the external diff tool failed, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    if err.chain().any(|cause| cause.is::<DiffError>()) {
        2
    } else {
        1
    }
}
