//! Run log store: durable history of pipeline runs.
//!
//! The store is the single source of truth for run state. The orchestrator
//! is its only writer; the status reporter and the CLI read from it at any
//! time, including while a run is in flight.
//!
//! Two implementations are provided:
//! - [`FileRunLogStore`]: one canonical JSON document per run under
//!   `<data_dir>/runs/`, written atomically
//! - [`InMemoryRunLogStore`]: same contract without durability

use async_trait::async_trait;

use contentflow_utils::error::StoreError;
use contentflow_utils::types::{RunId, RunPatch, RunRecord};

mod file;
mod memory;

pub use file::FileRunLogStore;
pub use memory::InMemoryRunLogStore;

/// Storage interface for run records.
///
/// Implementations must be safe under concurrent calls: updates for
/// different ids may interleave freely, updates for the same id are applied
/// one at a time and all-or-nothing.
#[async_trait]
pub trait RunLogStore: Send + Sync {
    /// Persist a new record.
    ///
    /// # Errors
    /// `DuplicateId` if a record with the same id already exists.
    async fn create(&self, record: RunRecord) -> Result<RunId, StoreError>;

    /// Apply a patch to an existing record and return the updated record.
    ///
    /// The patch is validated against the stored record (immutability,
    /// forward-only status, stage order) before anything is written.
    ///
    /// # Errors
    /// `NotFound` if the id is unknown; `Record` if the patch is rejected.
    async fn update(&self, id: &RunId, patch: RunPatch) -> Result<RunRecord, StoreError>;

    /// Fetch one record.
    ///
    /// # Errors
    /// `NotFound` if the id is unknown.
    async fn get(&self, id: &RunId) -> Result<RunRecord, StoreError>;

    /// Page through records, most recent first.
    ///
    /// Ordering is by `createdAt` descending with ties broken by id
    /// descending, so repeated calls with increasing offsets walk a stable
    /// sequence.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<RunRecord>, StoreError>;
}

/// Sort most recent first and cut out one page.
pub(crate) fn paginate(mut records: Vec<RunRecord>, limit: usize, offset: usize) -> Vec<RunRecord> {
    records.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
    records.into_iter().skip(offset).take(limit).collect()
}
