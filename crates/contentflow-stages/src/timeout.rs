use std::time::Duration;

use contentflow_utils::types::{ErrorKind, RunRecord};

use crate::{Stage, StageOutcome};

/// Reason recorded when a stage exceeds its time budget
pub const TIMEOUT_REASON: &str = "Timeout";

/// Execute a stage with timeout enforcement.
///
/// The provider call is dropped when the budget expires; the run records a
/// `provider_error` with reason `Timeout` instead of hanging.
pub async fn execute_with_timeout(
    stage: &dyn Stage,
    record: &RunRecord,
    timeout: Duration,
) -> StageOutcome {
    match tokio::time::timeout(timeout, stage.execute(record)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(
                stage = %stage.id(),
                timeout_ms = timeout.as_millis() as u64,
                "Stage exceeded its time budget"
            );
            StageOutcome::failure(ErrorKind::ProviderError, TIMEOUT_REASON)
        }
    }
}
