//! Orchestrator façade for external consumers.
//!
//! This module provides the API the CLI and embedders use to trigger runs
//! without knowing how stages are sequenced or persisted.
//!
//! **Integration rule**: Outside this crate, use `OrchestratorHandle`.
//! Direct `PipelineOrchestrator` usage is reserved for tests and
//! orchestrator internals.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use contentflow_config::{CliArgs, Config};
//! use contentflow_orchestrator::OrchestratorHandle;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::discover(&CliArgs::default())?;
//!     let handle = OrchestratorHandle::from_config(&config)?;
//!     let id = handle.start_run(Some("ocean".to_string())).await?;
//!     let record = handle.wait(&id).await?;
//!     println!("{id}: {}", record.status);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use contentflow_config::{ActiveRunPolicy, Config};
use contentflow_providers::ProviderSet;
use contentflow_store::{FileRunLogStore, RunLogStore};
use contentflow_utils::error::{ContentflowError, OrchestratorError};
use contentflow_utils::types::{RunId, RunRecord};

use crate::pipeline::{CancelFlag, PipelineOrchestrator};

/// The primary public API for triggering pipeline runs.
///
/// `OrchestratorHandle` creates runs, executes them on spawned tokio tasks
/// and lets callers wait for or cancel them.
///
/// # Construction
///
/// - [`OrchestratorHandle::from_config`]: file store under the configured
///   data directory plus the configured provider set (same as the CLI)
/// - [`OrchestratorHandle::new`]: explicit orchestrator and policy
///   (deterministic; used by tests and embedders)
///
/// # Active runs
///
/// At most one run executes at a time per handle. A trigger while a run is
/// active is handled by the [`ActiveRunPolicy`]:
///
/// - `Reject`: [`start_run`](Self::start_run) fails with
///   [`OrchestratorError::RunInProgress`] and nothing is persisted
/// - `Queue`: the new run is persisted as `pending` immediately and starts
///   once every earlier run has finished, in trigger order
///
/// # Threading
///
/// The handle is `Send + Sync`; all methods take `&self`. Run tasks live on
/// the ambient tokio runtime, so the handle must be used inside one.
///
/// # Error Handling
///
/// Stage failures are never errors: they are recorded on the run and
/// visible through [`wait`](Self::wait) or the status reporter. Errors
/// returned here are lifecycle problems (store failures, unknown ids,
/// rejected triggers). Map them to exit codes through
/// [`ContentflowError::to_exit_code`].
pub struct OrchestratorHandle {
    orchestrator: Arc<PipelineOrchestrator>,
    policy: ActiveRunPolicy,
    state: Arc<Mutex<HandleState>>,
}

#[derive(Default)]
struct HandleState {
    /// Runs persisted and not yet finished, in trigger order
    active: Vec<RunId>,
    /// Completion signal of the most recently triggered run
    tail: Option<watch::Receiver<bool>>,
    /// Present while the run task is alive
    cancels: HashMap<RunId, CancelFlag>,
    /// Present until the run finishes or a waiter takes the handle
    tasks: HashMap<RunId, JoinHandle<Result<RunRecord, OrchestratorError>>>,
}

/// Owned by whatever stands in a run's place in the queue. Dropping it, on
/// success, failure, panic or abort, forgets the run and releases the next
/// one.
struct RunSlot {
    id: RunId,
    state: Arc<Mutex<HandleState>>,
    done: watch::Sender<bool>,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.active.retain(|active| active != &self.id);
            state.cancels.remove(&self.id);
            state.tasks.remove(&self.id);
        }
        self.done.send_replace(true);
    }
}

/// Block until the run ahead of this one has released its slot.
async fn wait_for_predecessor(id: &RunId, predecessor: Option<watch::Receiver<bool>>) {
    let Some(mut predecessor) = predecessor else {
        return;
    };
    if predecessor.wait_for(|done| *done).await.is_err() {
        warn!(run_id = %id, "Predecessor dropped without signalling; starting anyway");
    }
}

impl OrchestratorHandle {
    pub fn new(orchestrator: PipelineOrchestrator, policy: ActiveRunPolicy) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            policy,
            state: Arc::new(Mutex::new(HandleState::default())),
        }
    }

    /// Create a handle from configuration.
    ///
    /// Opens the file store under `config.data_dir()` and builds the
    /// provider set selected by `providers.mode`. Credentials are resolved
    /// here, so a missing one fails before any run is created.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The data directory cannot be created
    /// - A provider cannot be built (missing endpoint or credential)
    pub fn from_config(config: &Config) -> Result<Self, ContentflowError> {
        let store: Arc<dyn RunLogStore> = Arc::new(FileRunLogStore::open(&config.data_dir())?);
        let providers = ProviderSet::from_config(config)?;
        let orchestrator = PipelineOrchestrator::from_config(store, providers, config);
        Ok(Self::new(orchestrator, config.active_run_policy()))
    }

    /// The store this handle writes to, for building a reporter over it.
    #[must_use]
    pub fn store(&self) -> Arc<dyn RunLogStore> {
        Arc::clone(self.orchestrator.store())
    }

    #[must_use]
    pub fn policy(&self) -> ActiveRunPolicy {
        self.policy
    }

    /// Runs triggered on this handle that have not finished, oldest first.
    #[must_use]
    pub fn active_runs(&self) -> Vec<RunId> {
        self.lock_state().active.clone()
    }

    /// Trigger a new run.
    ///
    /// Returns once the `pending` record is durable; execution continues on
    /// a spawned task.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::RunInProgress`] under the `Reject` policy when
    ///   another run is active
    /// - [`OrchestratorError::Create`] if the pending record cannot be stored
    pub async fn start_run(&self, seed: Option<String>) -> Result<RunId, OrchestratorError> {
        let record = RunRecord::new_pending(seed);
        let id = record.id.clone();
        let (done_tx, done_rx) = watch::channel(false);

        let predecessor = {
            let mut state = self.lock_state();
            if let Some(active) = state.active.first()
                && self.policy == ActiveRunPolicy::Reject
            {
                return Err(OrchestratorError::RunInProgress {
                    id: active.to_string(),
                });
            }
            state.active.push(id.clone());
            state.tail.replace(done_rx)
        };
        let slot = RunSlot {
            id: id.clone(),
            state: Arc::clone(&self.state),
            done: done_tx,
        };

        if let Err(source) = self.orchestrator.store().create(record).await {
            self.lock_state().active.retain(|active| active != &id);
            // Later triggers may already be queued behind this slot; hand it
            // on only once the predecessor is done so their order holds.
            if predecessor.is_some() {
                tokio::spawn(async move {
                    wait_for_predecessor(&slot.id, predecessor).await;
                    drop(slot);
                });
            }
            return Err(OrchestratorError::Create(source));
        }

        if predecessor.is_some() {
            info!(run_id = %id, "Run queued behind the active run");
        }

        let cancel = CancelFlag::new();
        // Held across spawn so the task cannot finish and clean up before
        // its entries exist.
        let mut state = self.lock_state();
        let task = tokio::spawn({
            let orchestrator = Arc::clone(&self.orchestrator);
            let cancel = cancel.clone();
            async move {
                let slot = slot;
                wait_for_predecessor(&slot.id, predecessor).await;
                orchestrator.drive(&slot.id, &cancel).await
            }
        });
        state.cancels.insert(id.clone(), cancel);
        state.tasks.insert(id.clone(), task);
        Ok(id)
    }

    /// Wait for a run triggered on this handle to finish and return its
    /// final record.
    ///
    /// Once the run has finished the handle no longer tracks it; waiting
    /// then returns the terminal record from the store.
    /// [`cancel`](Self::cancel) keeps working while a wait is in progress.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::UnknownRun`] if the id was not triggered here
    ///   and has no terminal record
    /// - [`OrchestratorError::Store`] if the run was aborted by a store
    ///   failure, or its finished record cannot be read
    /// - [`OrchestratorError::Join`] if the run task panicked
    pub async fn wait(&self, id: &RunId) -> Result<RunRecord, OrchestratorError> {
        let task = self.lock_state().tasks.remove(id);
        let Some(task) = task else {
            return self.finished_record(id).await;
        };

        task.await.map_err(|e| OrchestratorError::Join {
            id: id.to_string(),
            reason: e.to_string(),
        })?
    }

    async fn finished_record(&self, id: &RunId) -> Result<RunRecord, OrchestratorError> {
        match self.orchestrator.store().get(id).await {
            Ok(record) if record.is_terminal() => Ok(record),
            Ok(_) => Err(OrchestratorError::UnknownRun { id: id.to_string() }),
            Err(e) if e.is_not_found() => Err(OrchestratorError::UnknownRun { id: id.to_string() }),
            Err(source) => Err(OrchestratorError::Store {
                id: id.to_string(),
                source,
            }),
        }
    }

    /// Request cancellation of a run.
    ///
    /// Cancellation is cooperative: a stage in flight finishes first, then
    /// the run is persisted as `failed` with kind `cancelled`. A queued run
    /// that has not started goes straight from `pending` to `failed`.
    ///
    /// # Errors
    /// [`OrchestratorError::UnknownRun`] if the id was not triggered here or
    /// has already finished.
    pub fn cancel(&self, id: &RunId) -> Result<(), OrchestratorError> {
        let state = self.lock_state();
        let cancel = state
            .cancels
            .get(id)
            .ok_or_else(|| OrchestratorError::UnknownRun { id: id.to_string() })?;
        cancel.cancel();
        info!(run_id = %id, "Cancellation requested");
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
