//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and the subcommand enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use contentflow_config::{CliArgs, ProviderMode};
use contentflow_status::DEFAULT_LIST_LIMIT;

/// contentflow - content pipeline orchestrator
#[derive(Parser)]
#[command(name = "contentflow")]
#[command(about = "Generate, voice, render and publish content through a staged pipeline")]
#[command(long_about = r#"
contentflow runs a fixed content pipeline and records every run durably:

  text → metadata → audio → video → publish

Each stage calls an external provider. Progress is persisted after every
stage, so `status` and `list` show live state even while a run is going.

EXAMPLES:
  # Run the pipeline with a topic seed
  contentflow run --seed ocean

  # Exercise the pipeline without network access and follow progress
  contentflow run --seed ocean --dry-run --watch

  # Inspect one run or the history
  contentflow status 0001767225600000-1a2b3c4d --json
  contentflow list --limit 10

  # Show the effective configuration and where each value came from
  contentflow config

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  Config file is $CONTENTFLOW_HOME/config.toml, or .contentflow/config.toml
  found by searching upward from the working directory
  Use --config to specify an explicit config file path

STAGES:
  Metadata failures are tolerated; any other stage failure ends the run
  as failed with the stage, an error kind and a reason recorded
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Per-stage timeout in seconds (default: 120, max: 3600)
    #[arg(long, global = true)]
    pub stage_timeout: Option<u64>,

    /// Directory holding the run log (default: $CONTENTFLOW_HOME or ./.contentflow)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Provider implementation: http or simulated
    #[arg(long, global = true, value_parser = ["http", "simulated"])]
    pub provider_mode: Option<String>,

    /// Behavior when a run is triggered while another is active: reject or queue
    #[arg(long, global = true, value_parser = ["reject", "queue"])]
    pub active_run_policy: Option<String>,

    /// Log output format: compact or json
    #[arg(long, global = true, value_parser = ["compact", "json"])]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Build the configuration overrides carried by these arguments.
    ///
    /// `run --dry-run` forces the simulated provider set.
    #[must_use]
    pub fn to_cli_args(&self) -> CliArgs {
        let provider_mode = match &self.command {
            Commands::Run { dry_run: true, .. } => Some(ProviderMode::Simulated.to_string()),
            _ => self.provider_mode.clone(),
        };

        CliArgs {
            config_path: self.config.clone(),
            // Absent flag leaves the file value in place.
            verbose: self.verbose.then_some(true),
            stage_timeout_secs: self.stage_timeout,
            data_dir: self.data_dir.clone(),
            provider_mode,
            active_run_policy: self.active_run_policy.clone(),
            log_format: self.log_format.clone(),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start a pipeline run and wait for it to finish
    ///
    /// The run is recorded as pending, then each stage executes in order with
    /// its result persisted before the next starts. Ctrl-C cancels the run
    /// after the stage in flight; the run is then recorded as failed with
    /// kind 'cancelled'.
    ///
    /// Exits 0 when the run completes and 20 when it fails.
    ///
    /// EXAMPLES:
    ///   contentflow run
    ///   contentflow run --seed "autumn leaves" --watch
    ///   contentflow run --dry-run --json
    Run {
        /// Optional topic seed for text generation
        #[arg(long)]
        seed: Option<String>,

        /// Use the simulated provider set (no network access)
        #[arg(long)]
        dry_run: bool,

        /// Print each stage as the run advances
        #[arg(long)]
        watch: bool,

        /// Output the final run record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current state of a run
    ///
    /// EXAMPLES:
    ///   contentflow status 0001767225600000-1a2b3c4d
    ///   contentflow status 0001767225600000-1a2b3c4d --json
    Status {
        /// Run id
        id: String,

        /// Output status as JSON
        #[arg(long)]
        json: bool,
    },

    /// List runs, most recent first
    ///
    /// EXAMPLES:
    ///   contentflow list
    ///   contentflow list --limit 5 --offset 5 --json
    List {
        /// Maximum number of runs to show
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,

        /// Number of runs to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Output the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration with value sources
    ///
    /// Credentials are shown by environment variable name only.
    Config {
        /// Output configuration as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Operation name used in error reports.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Status { .. } => "status",
            Self::List { .. } => "list",
            Self::Config { .. } => "config",
        }
    }
}

/// Build the clap command for the CLI
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
