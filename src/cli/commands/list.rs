//! List command implementation
//!
//! Handles `contentflow list`, newest runs first.

use anyhow::Result;

use contentflow_config::Config;
use contentflow_status::{RunListing, RunSummary};
use contentflow_utils::error::ContentflowError;
use contentflow_utils::exit_codes::ExitCode;

use super::common::open_reporter;

/// Execute the list command
pub async fn execute_list_command(
    limit: usize,
    offset: usize,
    json: bool,
    config: &Config,
) -> Result<ExitCode> {
    let reporter = open_reporter(config)?;
    let listing = reporter
        .list_runs(limit, offset)
        .await
        .map_err(ContentflowError::from)?;

    if json {
        println!("{}", listing.to_json()?);
    } else {
        print!("{}", render_listing(&listing));
    }
    Ok(ExitCode::SUCCESS)
}

fn render_listing(listing: &RunListing) -> String {
    if listing.runs.is_empty() {
        return if listing.offset == 0 {
            "No runs recorded yet\n".to_string()
        } else {
            format!("No runs past offset {}\n", listing.offset)
        };
    }

    let mut out = format!(
        "{:<32} {:<10} {:<9} {:<20} {}\n",
        "ID", "STATUS", "PROGRESS", "CREATED", "STAGE"
    );
    for view in &listing.runs {
        let run = &view.run;
        let stage = match &run.error {
            Some(error) => format!("{} at {}", error.kind, error.stage.map_or("-", |s| s.as_str())),
            None => view.current_stage_label.unwrap_or("-").to_string(),
        };
        out.push_str(&format!(
            "{:<32} {:<10} {:<9} {:<20} {stage}\n",
            run.id.as_str(),
            run.status.as_str(),
            format!("{}/{}", view.progress.completed, view.progress.total),
            run.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ));
    }
    out.push_str(&summary_line(&listing.summary));
    out
}

fn summary_line(summary: &RunSummary) -> String {
    let noun = if summary.total == 1 { "run" } else { "runs" };
    let parts: Vec<String> = [
        (summary.completed, "completed"),
        (summary.failed, "failed"),
        (summary.running, "running"),
        (summary.pending, "pending"),
    ]
    .into_iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| format!("{count} {label}"))
    .collect();
    format!("\n{} {noun}: {}\n", summary.total, parts.join(", "))
}
