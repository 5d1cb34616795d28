use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cvgo_core::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod retry;
mod shutdown;

#[derive(Parser)]
#[command(name = "cvgo")]
#[command(about = "Offset resolver and mask tracker for the cvgo aim assistant")]
#[command(version)]
struct Args {
    /// Configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = "cvgo.toml", global = true, env = "CVGO_CONFIG")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for the game and resolve every signature
    Offsets {
        /// Signature file (JSON); the built-in set is used when omitted
        #[arg(short, long)]
        signatures: Option<PathBuf>,

        /// Save the resolved offsets as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Resolve a single ad-hoc signature
    Scan {
        /// Module to scan (e.g. client.dll)
        #[arg(short, long)]
        module: String,

        /// IDA-style pattern, `?` or `??` for wildcards
        #[arg(short, long)]
        pattern: String,

        /// Offset to dereference after the match (repeatable, hex with 0x)
        #[arg(short, long = "offset", allow_hyphen_values = true)]
        offsets: Vec<String>,

        /// Value added after the last dereference
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        extra: String,

        /// Keep only the low 16 bits of the result
        #[arg(short, long)]
        truncated: bool,
    },
    /// Run the tracker over a directory of PGM masks
    Replay {
        /// Directory containing `.pgm` masks, processed in name order
        dir: PathBuf,

        /// Print one JSON object per frame
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_directive = if args.verbose { "cvgo=debug" } else { "cvgo=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_directive.parse()?))
        .init();

    let config = load_config(&args.config)?;

    match args.command {
        Command::Offsets { signatures, output } => {
            commands::offsets::run(&config, signatures.as_deref(), output.as_deref())
        }
        Command::Scan {
            module,
            pattern,
            offsets,
            extra,
            truncated,
        } => commands::scan::run(&config, &module, &pattern, &offsets, &extra, truncated),
        Command::Replay { dir, json } => commands::replay::run(&config, &dir, json),
        Command::Config => commands::config::run(&config),
    }
}

/// Load the configuration file, falling back to defaults when it is missing
fn load_config(path: &Path) -> Result<Config> {
    match Config::load(path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) if e.is_not_found() => {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}
