//! Derived, serializable views of run records.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;

use contentflow_utils::canonical::emit_jcs;
use contentflow_utils::types::{RunRecord, RunStatus, StageId};

/// Stage progress of a run: stages settled out of the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// A run record plus the derived fields shown to users.
///
/// Serializes as the record's own camelCase fields with `progress` and
/// `currentStageLabel` added alongside.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusView {
    #[serde(flatten)]
    pub run: RunRecord,
    pub progress: Progress,
    pub current_stage_label: Option<&'static str>,
}

impl RunStatusView {
    #[must_use]
    pub fn from_record(run: RunRecord) -> Self {
        // A tolerated metadata failure settles its stage without an artifact.
        let settled: BTreeSet<StageId> = run
            .stage_results
            .produced()
            .into_iter()
            .chain(run.non_fatal_errors.iter().filter_map(|e| e.stage))
            .collect();

        let current_stage_label = match run.status {
            RunStatus::Completed => None,
            _ => run.current_stage.map(|stage| stage.label()),
        };

        Self {
            progress: Progress {
                completed: settled.len(),
                total: StageId::ALL.len(),
            },
            current_stage_label,
            run,
        }
    }

    /// One-line human summary, e.g. `running: Synthesizing audio (2/5)`.
    #[must_use]
    pub fn headline(&self) -> String {
        let Progress { completed, total } = self.progress;
        match (&self.run.status, &self.run.error) {
            (RunStatus::Failed, Some(error)) => {
                let stage = error.stage.map_or("-", |s| s.as_str());
                format!(
                    "failed at {stage}: {} ({}) ({completed}/{total})",
                    error.kind, error.reason
                )
            }
            (status, _) => match self.current_stage_label {
                Some(label) => format!("{status}: {label} ({completed}/{total})"),
                None => format!("{status} ({completed}/{total})"),
            },
        }
    }

    /// Emit as canonical JSON (JCS, RFC 8785).
    ///
    /// # Errors
    /// Returns error if the view cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        emit_jcs(self).context("Failed to emit run status JSON")
    }
}

/// Run counts by status over a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_views<'a>(views: impl IntoIterator<Item = &'a RunStatusView>) -> Self {
        views.into_iter().fold(Self::default(), |mut summary, view| {
            summary.total += 1;
            match view.run.status {
                RunStatus::Pending => summary.pending += 1,
                RunStatus::Running => summary.running += 1,
                RunStatus::Completed => summary.completed += 1,
                RunStatus::Failed => summary.failed += 1,
            }
            summary
        })
    }
}

/// One page of run history, newest first, with its summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunListing {
    pub limit: usize,
    pub offset: usize,
    pub runs: Vec<RunStatusView>,
    pub summary: RunSummary,
}

impl RunListing {
    #[must_use]
    pub fn new(limit: usize, offset: usize, runs: Vec<RunStatusView>) -> Self {
        let summary = RunSummary::from_views(&runs);
        Self {
            limit,
            offset,
            runs,
            summary,
        }
    }

    /// Emit as canonical JSON (JCS, RFC 8785).
    ///
    /// # Errors
    /// Returns error if the listing cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        emit_jcs(self).context("Failed to emit run listing JSON")
    }
}
