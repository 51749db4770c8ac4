//! Logging and observability infrastructure for contentflow
//!
//! Structured logging via `tracing`. Every stage transition of a run is
//! logged with `run_id` and `stage` fields; failure reasons are redacted
//! before they reach a subscriber.

use std::io::IsTerminal;
use tracing::{Level, debug, error, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::redaction::redact_error_message;
use crate::types::{ErrorKind, RunId, RunStatus, StageId};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

/// Check if colored output should be used.
///
/// Returns true only if stderr is a terminal and `NO_COLOR` is unset.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("contentflow=debug,info")
            } else {
                EnvFilter::try_new("contentflow=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// Logs go to stderr so that `--json` output on stdout stays machine
/// readable. `RUST_LOG` overrides the default filter.
///
/// # Arguments
/// * `verbose` - debug level for contentflow targets, span close events
/// * `format` - compact text or JSON lines
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = default_filter(verbose);
    let span_events = if verbose {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_span_events(span_events),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(use_color())
                        .with_target(verbose)
                        .with_thread_ids(false)
                        .with_thread_names(false)
                        .with_line_number(false)
                        .with_file(false)
                        .with_span_events(span_events)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Span covering one pipeline run.
pub fn run_span(run_id: &RunId) -> tracing::Span {
    span!(Level::INFO, "pipeline_run", run_id = %run_id)
}

/// Span covering one stage of a run.
pub fn stage_span(run_id: &RunId, stage: StageId) -> tracing::Span {
    span!(
        Level::INFO,
        "stage_execution",
        run_id = %run_id,
        stage = %stage,
    )
}

pub fn log_stage_start(run_id: &RunId, stage: StageId) {
    info!(
        run_id = %run_id,
        stage = %stage,
        label = stage.label(),
        "Starting stage"
    );
}

pub fn log_stage_complete(run_id: &RunId, stage: StageId, duration_ms: u128) {
    info!(
        run_id = %run_id,
        stage = %stage,
        duration_ms = %duration_ms,
        "Stage completed"
    );
}

/// Log a fatal stage failure. The reason is redacted.
pub fn log_stage_failure(
    run_id: &RunId,
    stage: StageId,
    kind: ErrorKind,
    reason: &str,
    duration_ms: u128,
) {
    let sanitized = redact_error_message(reason);
    error!(
        run_id = %run_id,
        stage = %stage,
        kind = kind.as_str(),
        duration_ms = %duration_ms,
        error = %sanitized,
        "Stage failed"
    );
}

/// Log a failure of a non-critical stage that the run continues past.
pub fn log_stage_tolerated(run_id: &RunId, stage: StageId, kind: ErrorKind, reason: &str) {
    let sanitized = redact_error_message(reason);
    warn!(
        run_id = %run_id,
        stage = %stage,
        kind = kind.as_str(),
        error = %sanitized,
        "Non-critical stage failed; continuing"
    );
}

pub fn log_run_finished(run_id: &RunId, status: RunStatus, duration_ms: u128) {
    match status {
        RunStatus::Completed => info!(
            run_id = %run_id,
            status = status.as_str(),
            duration_ms = %duration_ms,
            "Run completed"
        ),
        _ => warn!(
            run_id = %run_id,
            status = status.as_str(),
            duration_ms = %duration_ms,
            "Run finished without completing"
        ),
    }
}

pub fn log_record_write(run_id: &RunId, status: RunStatus, current_stage: Option<StageId>) {
    debug!(
        run_id = %run_id,
        status = status.as_str(),
        current_stage = current_stage.as_ref().map_or("-", StageId::as_str),
        "Persisted run record"
    );
}
