//! contentflow - Content pipeline orchestrator with durable run records
//!
//! contentflow turns an optional topic seed into a published video through a
//! fixed pipeline of stages: text → metadata → audio → video → publish. Every
//! run is recorded in a run log store and updated after each stage, so its
//! progress can be inspected at any time, including while it is running.
//!
//! contentflow can be used in two ways:
//! - **CLI**: run `contentflow run --seed ocean` and inspect runs with
//!   `contentflow status <id>` / `contentflow list`
//! - **Library**: embed the orchestrator through [`OrchestratorHandle`]
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Run the pipeline against the simulated providers
//! contentflow run --seed ocean --dry-run --watch
//!
//! # Inspect history
//! contentflow list --json
//! contentflow status <run-id>
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use contentflow::{Config, OrchestratorHandle, ProviderMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder()
//!         .provider_mode(ProviderMode::Simulated)
//!         .data_dir("/tmp/contentflow")
//!         .build()?;
//!     let handle = OrchestratorHandle::from_config(&config)?;
//!     let id = handle.start_run(Some("ocean".to_string())).await?;
//!     let record = handle.wait(&id).await?;
//!     println!("{id}: {}", record.status);
//!     Ok(())
//! }
//! ```
//!
//! # JSON Contracts
//!
//! Run records and all `--json` output are emitted in JCS (RFC 8785)
//! canonical form. Use [`emit_jcs`] for your own integrations.

pub mod cli;

/// Orchestrator façade: trigger, wait for and cancel runs.
pub use contentflow_orchestrator::{CancelFlag, OrchestratorHandle, PipelineOrchestrator};

/// Configuration with discovery, precedence and source attribution.
pub use contentflow_config::{
    ActiveRunPolicy, CliArgs, Config, ConfigBuilder, ConfigSource, ProviderMode,
};

/// Stage executors and the fixed stage order.
pub use contentflow_stages::{Pipeline, Stage, StageFailure, StageOutcome};

/// Read-only run reporting.
pub use contentflow_status::{RunListing, RunStatusReporter, RunStatusView, RunSummary};

/// Run log store trait and implementations.
pub use contentflow_store::{FileRunLogStore, InMemoryRunLogStore, RunLogStore};

/// Provider traits and the built-in provider sets.
pub use contentflow_providers::{
    AudioProvider, HttpProviders, MetadataSink, ProviderSet, PublishMetadata, PublishProvider,
    SimulatedProviders, TextProvider, VideoProvider,
};

/// Library-level error type with exit code mapping.
pub use contentflow_utils::error::ContentflowError;

/// Exit codes matching the documented exit code table.
pub use contentflow_utils::exit_codes::ExitCode;

/// Run record model.
pub use contentflow_utils::types::{
    ErrorKind, RunError, RunId, RunPatch, RunRecord, RunStatus, StageId, StageResults,
};

/// JCS (RFC 8785) canonical JSON emission.
pub use contentflow_utils::canonical::emit_jcs;
