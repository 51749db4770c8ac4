//! Common helper functions used across CLI commands

use std::sync::Arc;

use contentflow_config::Config;
use contentflow_status::{RunStatusReporter, RunStatusView};
use contentflow_store::{FileRunLogStore, RunLogStore};
use contentflow_utils::error::ContentflowError;
use contentflow_utils::types::{RunStatus, StageId};

/// Reporter over the file store in the configured data directory.
pub fn open_reporter(config: &Config) -> Result<RunStatusReporter, ContentflowError> {
    let store: Arc<dyn RunLogStore> = Arc::new(FileRunLogStore::open(&config.data_dir())?);
    Ok(RunStatusReporter::new(store))
}

/// First line of an artifact, cut for terminal display.
pub fn preview(artifact: &str, max_chars: usize) -> String {
    let line = artifact
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    let more = line.chars().count() > max_chars || artifact.trim().lines().count() > 1;
    let mut shown: String = line.chars().take(max_chars).collect();
    if more {
        shown.push('…');
    }
    shown
}

/// Human-readable rendering of a run, used by `run` and `status`.
pub fn render_run_view(view: &RunStatusView) -> String {
    let run = &view.run;
    let glyph = match run.status {
        RunStatus::Completed => "✓",
        RunStatus::Failed => "✗",
        RunStatus::Pending | RunStatus::Running => "…",
    };

    let mut out = format!("{glyph} Run {}: {}\n", run.id, view.headline());
    out.push_str(&format!(
        "  Created: {}\n",
        run.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(seed) = &run.seed {
        out.push_str(&format!("  Seed:    {seed}\n"));
    }

    out.push_str("  Stages:\n");
    for stage in StageId::ALL {
        let line = match run.stage_results.get(stage) {
            Some(artifact) => format!("✓ {}", preview(artifact, 60)),
            None => stage_gap(view, stage),
        };
        out.push_str(&format!("    {:<9} {line}\n", stage.as_str()));
    }
    out
}

fn stage_gap(view: &RunStatusView, stage: StageId) -> String {
    let run = &view.run;
    if let Some(tolerated) = run
        .non_fatal_errors
        .iter()
        .find(|e| e.stage == Some(stage))
    {
        return format!("⚠ {} ({}), continued", tolerated.kind, tolerated.reason);
    }
    if let Some(error) = run.error.as_ref().filter(|e| e.stage == Some(stage)) {
        return format!("✗ {} ({})", error.kind, error.reason);
    }
    if run.status == RunStatus::Running && run.current_stage == Some(stage) {
        return format!("… {}", stage.label());
    }
    "-".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_takes_first_non_empty_line() {
        assert_eq!(preview("\n  Roses are red\nViolets are blue", 60), "Roses are red…");
        assert_eq!(preview("short", 60), "short");
        assert_eq!(preview("abcdef", 3), "abc…");
        assert_eq!(preview("", 10), "");
    }
}
