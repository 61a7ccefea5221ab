//! CLI argument definitions
//!
//! All Clap derive structs for `phantasm` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::ColorChoice;

// ============================================================================
// Root CLI
// ============================================================================

/// Illusion scheduling and lifecycle engine.
#[derive(Parser, Debug)]
#[command(name = "phantasm", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "PHANTASM_COLOR")]
    pub color: ColorChoice,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration files.
    Validate(ValidateArgs),

    /// List the built-in effects.
    Effects(EffectsArgs),

    /// Run the engine against a simulated world.
    Simulate(SimulateArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `effects`.
#[derive(Args, Debug)]
pub struct EffectsArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to YAML configuration file; defaults apply when omitted.
    #[arg(short, long, env = "PHANTASM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of simulated participants.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..=256))]
    pub actors: u16,

    /// Host ticks to run.
    #[arg(long, default_value_t = 6_000)]
    pub ticks: u64,

    /// Rng seed for a reproducible run.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Drive ticks from the real-time driver instead of as fast as possible.
    #[arg(long)]
    pub realtime: bool,

    /// Write the JSONL event stream to this file.
    #[arg(long)]
    pub events_file: Option<PathBuf>,

    /// Expose Prometheus metrics on this port while running.
    #[arg(long, env = "PHANTASM_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Output format for the final report.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `version`.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================
