//! Stage-by-stage execution of one run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{Instrument, warn};

use contentflow_config::Config;
use contentflow_providers::ProviderSet;
use contentflow_stages::{Pipeline, StageOutcome};
use contentflow_store::RunLogStore;
use contentflow_utils::error::{OrchestratorError, StoreError};
use contentflow_utils::logging::{
    log_run_finished, log_stage_complete, log_stage_failure, log_stage_start, log_stage_tolerated,
    run_span, stage_span,
};
use contentflow_utils::types::{
    ErrorKind, RunError, RunId, RunPatch, RunRecord, RunStatus, StageId,
};

/// Reason recorded on runs stopped by a cancel request
pub const CANCELLED_REASON: &str = "Cancelled";

/// Cooperative cancellation flag, checked between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives runs through the stage pipeline and persists every transition.
///
/// This is the engine behind [`crate::OrchestratorHandle`]. It owns no run
/// state of its own: everything it knows about a run is read from and
/// written to the [`RunLogStore`], so a reporter can observe progress at any
/// time.
///
/// Stage failures never surface as errors; they end up on the record. The
/// only errors returned are store failures, which abort the run.
pub struct PipelineOrchestrator {
    store: Arc<dyn RunLogStore>,
    pipeline: Pipeline,
}

impl PipelineOrchestrator {
    pub fn new(store: Arc<dyn RunLogStore>, pipeline: Pipeline) -> Self {
        Self { store, pipeline }
    }

    /// Orchestrator over `providers` with timeouts and channel from `config`.
    pub fn from_config(store: Arc<dyn RunLogStore>, providers: ProviderSet, config: &Config) -> Self {
        Self::new(store, Pipeline::from_config(providers, config))
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RunLogStore> {
        &self.store
    }

    /// Persist a new pending run.
    ///
    /// # Errors
    /// `OrchestratorError::Create` if the store rejects the record.
    pub async fn create_run(&self, seed: Option<String>) -> Result<RunId, OrchestratorError> {
        self.store
            .create(RunRecord::new_pending(seed))
            .await
            .map_err(OrchestratorError::Create)
    }

    /// Create a run and drive it to a terminal state.
    ///
    /// # Errors
    /// See [`Self::create_run`] and [`Self::drive`].
    pub async fn execute_run(&self, seed: Option<String>) -> Result<RunRecord, OrchestratorError> {
        let id = self.create_run(seed).await?;
        self.drive(&id, &CancelFlag::new()).await
    }

    /// Drive a pending run to `completed` or `failed`.
    ///
    /// 1. `pending → running` (or straight to `failed` if already cancelled)
    /// 2. per stage: persist `currentStage`, execute with timeout, persist
    ///    the artifact, a tolerated failure, or the terminal failure
    /// 3. `completed` with `currentStage` cleared
    ///
    /// The cancel flag is checked before each stage, never mid-stage.
    ///
    /// # Errors
    /// `OrchestratorError::Store` when any write fails. One best-effort
    /// attempt is made to leave the record `failed` with kind `internal`.
    pub async fn drive(&self, id: &RunId, cancel: &CancelFlag) -> Result<RunRecord, OrchestratorError> {
        let started = Instant::now();
        let result = self
            .drive_stages(id, cancel)
            .instrument(run_span(id))
            .await;

        if let Ok(record) = &result {
            log_run_finished(id, record.status, started.elapsed().as_millis());
        }
        result
    }

    async fn drive_stages(
        &self,
        id: &RunId,
        cancel: &CancelFlag,
    ) -> Result<RunRecord, OrchestratorError> {
        if cancel.is_cancelled() {
            return self.persist(id, cancelled_patch(StageId::Text), None).await;
        }

        self.persist(id, RunPatch::new().status(RunStatus::Running), None)
            .await?;

        for entry in self.pipeline.stages() {
            let stage = entry.id();

            if cancel.is_cancelled() {
                return self.persist(id, cancelled_patch(stage), Some(stage)).await;
            }

            let record = self
                .persist(id, RunPatch::new().current_stage(stage), Some(stage))
                .await?;

            log_stage_start(id, stage);
            let stage_started = Instant::now();
            let outcome = entry.run(&record).instrument(stage_span(id, stage)).await;
            let elapsed_ms = stage_started.elapsed().as_millis();

            match outcome {
                StageOutcome::Success(artifact) => {
                    self.persist(id, RunPatch::new().stage_result(stage, artifact), Some(stage))
                        .await?;
                    log_stage_complete(id, stage, elapsed_ms);
                }
                StageOutcome::Failure(failure) if !stage.is_critical() => {
                    log_stage_tolerated(id, stage, failure.kind, &failure.reason);
                    let tolerated = RunError::at_stage(stage, failure.kind, failure.reason);
                    self.persist(id, RunPatch::new().non_fatal_error(tolerated), Some(stage))
                        .await?;
                }
                StageOutcome::Failure(failure) => {
                    log_stage_failure(id, stage, failure.kind, &failure.reason, elapsed_ms);
                    let error = RunError::at_stage(stage, failure.kind, failure.reason);
                    return self
                        .persist(
                            id,
                            RunPatch::new().status(RunStatus::Failed).error(error),
                            Some(stage),
                        )
                        .await;
                }
            }
        }

        self.persist(
            id,
            RunPatch::new()
                .status(RunStatus::Completed)
                .clear_current_stage(),
            None,
        )
        .await
    }

    /// Apply a patch; on failure make one attempt to fail the run and abort.
    async fn persist(
        &self,
        id: &RunId,
        patch: RunPatch,
        stage: Option<StageId>,
    ) -> Result<RunRecord, OrchestratorError> {
        match self.store.update(id, patch).await {
            Ok(record) => Ok(record),
            Err(source) => {
                self.abort(id, stage, &source).await;
                Err(OrchestratorError::Store {
                    id: id.to_string(),
                    source,
                })
            }
        }
    }

    async fn abort(&self, id: &RunId, stage: Option<StageId>, source: &StoreError) {
        warn!(run_id = %id, error = %source, "Store write failed; aborting run");
        let error = RunError::new(stage, ErrorKind::Internal, source.to_string());
        let patch = RunPatch::new().status(RunStatus::Failed).error(error);
        if let Err(e) = self.store.update(id, patch).await {
            warn!(run_id = %id, error = %e, "Could not record internal failure");
        }
    }
}

fn cancelled_patch(next_stage: StageId) -> RunPatch {
    RunPatch::new().status(RunStatus::Failed).error(RunError::at_stage(
        next_stage,
        ErrorKind::Cancelled,
        CANCELLED_REASON,
    ))
}
