//! Status command implementation
//!
//! Handles `contentflow status <id>` and `contentflow status <id> --json`.

use anyhow::Result;

use contentflow_config::Config;
use contentflow_utils::error::ContentflowError;
use contentflow_utils::exit_codes::ExitCode;
use contentflow_utils::types::RunId;

use super::common::{open_reporter, render_run_view};

/// Execute the status command
pub async fn execute_status_command(id: &str, json: bool, config: &Config) -> Result<ExitCode> {
    let id = RunId::parse(id).map_err(ContentflowError::from)?;
    let reporter = open_reporter(config)?;
    let view = reporter
        .get_run(&id)
        .await
        .map_err(ContentflowError::from)?;

    if json {
        println!("{}", view.to_json()?);
    } else {
        print!("{}", render_run_view(&view));
    }
    Ok(ExitCode::SUCCESS)
}
