//! Run command implementation
//!
//! Handles `contentflow run`: trigger, optional progress watch, Ctrl-C
//! cancellation, final report.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use contentflow_config::Config;
use contentflow_orchestrator::OrchestratorHandle;
use contentflow_status::{RunStatusReporter, RunStatusView};
use contentflow_utils::error::ContentflowError;
use contentflow_utils::exit_codes::ExitCode;
use contentflow_utils::types::RunId;

use super::common::render_run_view;

const WATCH_INTERVAL: Duration = Duration::from_millis(200);

/// Execute the run command.
///
/// Returns the exit code for the final run status: 0 for `completed`, 20
/// for `failed`.
pub async fn execute_run_command(
    seed: Option<String>,
    watch: bool,
    json: bool,
    config: &Config,
) -> Result<ExitCode> {
    let handle = Arc::new(OrchestratorHandle::from_config(config)?);
    let reporter = RunStatusReporter::new(handle.store());

    let id = handle
        .start_run(seed)
        .await
        .map_err(ContentflowError::from)?;
    if !json {
        println!(
            "Started run {id} ({} providers, data dir {})",
            config.provider_mode(),
            config.data_dir()
        );
    }

    let interrupt = tokio::spawn({
        let handle = Arc::clone(&handle);
        let id = id.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Cancelling run {id} after the current stage...");
                if let Err(e) = handle.cancel(&id) {
                    warn!(run_id = %id, error = %e, "Cancel request failed");
                }
            }
        }
    });
    let watcher = watch.then(|| tokio::spawn(watch_progress(reporter, id.clone(), json)));

    let outcome = handle.wait(&id).await;
    interrupt.abort();
    if let Some(watcher) = watcher {
        watcher.abort();
    }

    let view = RunStatusView::from_record(outcome.map_err(ContentflowError::from)?);
    if json {
        println!("{}", view.to_json()?);
    } else {
        print!("{}", render_run_view(&view));
    }

    Ok(ExitCode::for_run_status(view.run.status))
}

/// Print the run headline each time it changes. With `--json` the lines go
/// to stderr so stdout stays a single JSON document.
async fn watch_progress(reporter: RunStatusReporter, id: RunId, json: bool) {
    let mut last = String::new();
    loop {
        match reporter.get_run(&id).await {
            Ok(view) => {
                let line = view.headline();
                if line != last {
                    if json {
                        eprintln!("  {line}");
                    } else {
                        println!("  {line}");
                    }
                    last = line;
                }
                if view.run.is_terminal() {
                    return;
                }
            }
            Err(e) => debug!(run_id = %id, error = %e, "Progress read failed"),
        }
        tokio::time::sleep(WATCH_INTERVAL).await;
    }
}
