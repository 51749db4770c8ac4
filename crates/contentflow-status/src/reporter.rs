//! Read-only access to current and historical runs.

use std::sync::Arc;

use tracing::debug;

use contentflow_store::RunLogStore;
use contentflow_utils::error::StoreError;
use contentflow_utils::types::RunId;

use crate::view::{RunListing, RunStatusView};

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Reports run state straight from the store.
///
/// Nothing is cached: every call reads the store, so a run observed while
/// the orchestrator is driving it shows its latest persisted stage.
#[derive(Clone)]
pub struct RunStatusReporter {
    store: Arc<dyn RunLogStore>,
}

impl RunStatusReporter {
    pub fn new(store: Arc<dyn RunLogStore>) -> Self {
        Self { store }
    }

    /// Current view of one run.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no run has this id, or any read failure.
    pub async fn get_run(&self, id: &RunId) -> Result<RunStatusView, StoreError> {
        let record = self.store.get(id).await?;
        debug!(run_id = %id, status = %record.status, "Read run status");
        Ok(RunStatusView::from_record(record))
    }

    /// A page of run history, newest first.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn list_runs(&self, limit: usize, offset: usize) -> Result<RunListing, StoreError> {
        let records = self.store.list(limit, offset).await?;
        debug!(limit, offset, count = records.len(), "Listed runs");
        Ok(RunListing::new(
            limit,
            offset,
            records.into_iter().map(RunStatusView::from_record).collect(),
        ))
    }
}
