//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Builds CliArgs and discovers Config
//! - Initializes tracing
//! - Creates the tokio runtime
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;

use contentflow_config::Config;
use contentflow_utils::error::{ContentflowError, UserFriendlyError};
use contentflow_utils::exit_codes::ExitCode;
use contentflow_utils::logging::init_tracing;
use contentflow_utils::redaction::redact_error_message;

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// Handles ALL output including errors. Returns `Err(ExitCode)` for any
/// non-zero exit, including a run that finished as `failed`; main.rs only
/// maps it to the process exit status.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    let cli_args = cli.to_cli_args();

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = ContentflowError::from(err);
            eprintln!("{}", report(&err, "config"));
            return Err(err.to_exit_code());
        }
    };

    if let Err(e) = init_tracing(config.verbose(), config.log_format()) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = cli.command.operation();

    let result = rt.block_on(async {
        match cli.command {
            Commands::Run {
                seed,
                dry_run: _,
                watch,
                json,
            } => commands::execute_run_command(seed, watch, json, &config).await,
            Commands::Status { id, json } => {
                commands::execute_status_command(&id, json, &config).await
            }
            Commands::List {
                limit,
                offset,
                json,
            } => commands::execute_list_command(limit, offset, json, &config).await,
            Commands::Config { json } => commands::execute_config_command(json, &config),
        }
    });

    match result {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(error) => {
            if let Some(err) = error.downcast_ref::<ContentflowError>() {
                eprintln!("{}", report(err, operation));
                return Err(err.to_exit_code());
            }

            eprintln!(
                "✗ Unexpected error: {}",
                redact_error_message(&format!("{error:#}"))
            );
            eprintln!("\n  Run with --verbose for more detailed output");
            Err(ExitCode::INTERNAL)
        }
    }
}

/// User-facing error report with operation-specific hints.
fn report(err: &ContentflowError, operation: &str) -> String {
    let mut output = err.display_for_user();
    output.push_str(&format!("\nOperation: {operation} ({})\n", err.category()));

    if let Some(hint) = operation_hint(err, operation) {
        output.push_str(&format!("Hint: {hint}\n"));
    }
    output
}

fn operation_hint(err: &ContentflowError, operation: &str) -> Option<&'static str> {
    match (err, operation) {
        (ContentflowError::Config(_), "run") | (ContentflowError::Provider(_), "run") => {
            Some("use --dry-run to exercise the pipeline with simulated providers")
        }
        (ContentflowError::Store(e), "status") if e.is_not_found() => {
            Some("use `contentflow list` to see known run ids")
        }
        (ContentflowError::Orchestrator(_), "run") => {
            Some("use `contentflow list` to see the active run")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentflow_utils::error::{ConfigError, OrchestratorError, StoreError};

    #[test]
    fn test_report_includes_operation_and_hint() {
        let err = ContentflowError::Store(StoreError::NotFound {
            id: "abc".to_string(),
        });
        let text = report(&err, "status");
        assert!(text.contains("Operation: status"));
        assert!(text.contains("contentflow list"));
        assert_eq!(err.to_exit_code(), ExitCode::RUN_NOT_FOUND);
    }

    #[test]
    fn test_missing_credential_suggests_dry_run() {
        let err = ContentflowError::Config(ConfigError::MissingCredential {
            provider: "text".to_string(),
            env: "TEXT_API_KEY".to_string(),
        });
        assert!(report(&err, "run").contains("--dry-run"));
        assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
    }

    #[test]
    fn test_run_in_progress_maps_to_exit_9() {
        let err = ContentflowError::Orchestrator(OrchestratorError::RunInProgress {
            id: "abc".to_string(),
        });
        assert_eq!(err.to_exit_code(), ExitCode::RUN_IN_PROGRESS);
        assert!(operation_hint(&err, "status").is_none());
    }
}
