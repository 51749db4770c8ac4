//! Trigger handling while another run is active.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeProviders, FlakyStore, Gate, orchestrator, orchestrator_with};
use contentflow_orchestrator::{ActiveRunPolicy, OrchestratorError, OrchestratorHandle};
use contentflow_store::RunLogStore;
use contentflow_utils::types::{ErrorKind, RunId, RunStatus, StageId};

#[tokio::test]
async fn test_reject_policy_refuses_second_trigger() {
    let gate = Gate::new();
    let fakes = Arc::new(FakeProviders::new().gate(StageId::Text, gate.clone()));
    let (store, orchestrator) = orchestrator(&fakes);
    let handle = OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Reject);

    let first = handle.start_run(None).await.unwrap();
    gate.entered().await;

    let err = handle.start_run(None).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::RunInProgress { ref id } if id == first.as_str()
    ));
    // Nothing was persisted for the rejected trigger.
    assert_eq!(store.list(10, 0).await.unwrap().len(), 1);

    gate.release();
    let record = handle.wait(&first).await.unwrap();
    assert_eq!(record.status, RunStatus::Completed);
    assert!(handle.active_runs().is_empty());

    // Once the active run finished, triggers are accepted again.
    gate.release();
    let next = handle.start_run(None).await.unwrap();
    assert_eq!(handle.wait(&next).await.unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_queue_policy_runs_in_trigger_order() {
    let gate = Gate::new();
    let fakes = Arc::new(FakeProviders::new().gate(StageId::Text, gate.clone()));
    let (store, orchestrator) = orchestrator(&fakes);
    let handle = OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Queue);

    let first = handle.start_run(Some("first".to_string())).await.unwrap();
    gate.entered().await;
    let second = handle.start_run(Some("second".to_string())).await.unwrap();

    // The queued run is durable and pending while the first one runs.
    let queued = store.get(&second).await.unwrap();
    assert_eq!(queued.status, RunStatus::Pending);
    assert_eq!(handle.active_runs(), vec![first.clone(), second.clone()]);

    gate.release();
    gate.release();
    assert_eq!(handle.wait(&first).await.unwrap().status, RunStatus::Completed);
    assert_eq!(handle.wait(&second).await.unwrap().status, RunStatus::Completed);

    let calls = fakes.calls();
    let first_published = calls
        .iter()
        .position(|c| *c == format!("publish:{first}"))
        .unwrap();
    let second_started = calls.iter().position(|c| c == "text:second").unwrap();
    assert!(
        first_published < second_started,
        "second run started before the first finished: {calls:?}"
    );
}

#[tokio::test]
async fn test_cancelled_queued_run_never_starts() {
    let gate = Gate::new();
    let fakes = Arc::new(FakeProviders::new().gate(StageId::Text, gate.clone()));
    let (_store, orchestrator) = orchestrator(&fakes);
    let handle = OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Queue);

    let first = handle.start_run(Some("first".to_string())).await.unwrap();
    gate.entered().await;
    let second = handle.start_run(Some("second".to_string())).await.unwrap();
    handle.cancel(&second).unwrap();
    gate.release();

    assert_eq!(handle.wait(&first).await.unwrap().status, RunStatus::Completed);
    let cancelled = handle.wait(&second).await.unwrap();
    assert_eq!(cancelled.status, RunStatus::Failed);
    assert!(cancelled.stage_results.produced().is_empty());
    let error = cancelled.error.unwrap();
    assert_eq!(error.kind, ErrorKind::Cancelled);
    assert_eq!(error.stage, Some(StageId::Text));
    assert!(!fakes.calls().contains(&"text:second".to_string()));
}

#[tokio::test]
async fn test_failed_run_frees_the_slot() {
    let fakes = Arc::new(FakeProviders::new().fail(
        StageId::Text,
        contentflow_providers::ProviderError::Outage("down".to_string()),
    ));
    let (_store, orchestrator) = orchestrator(&fakes);
    let handle = OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Reject);

    let id = handle.start_run(None).await.unwrap();
    assert_eq!(handle.wait(&id).await.unwrap().status, RunStatus::Failed);
    assert!(handle.start_run(None).await.is_ok());
}

#[tokio::test]
async fn test_wait_after_finish_returns_persisted_record() {
    let fakes = Arc::new(FakeProviders::new());
    let (store, orchestrator) = orchestrator(&fakes);
    let handle = OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Reject);

    let id = handle.start_run(None).await.unwrap();
    let first = handle.wait(&id).await.unwrap();

    let again = handle.wait(&id).await.unwrap();
    assert_eq!(again, first);
    assert_eq!(store.get(&id).await.unwrap(), first);
}

#[tokio::test]
async fn test_failed_create_keeps_queue_order() {
    let gate = Gate::new();
    let fakes = Arc::new(FakeProviders::new().gate(StageId::Text, gate.clone()));
    let store = Arc::new(FlakyStore::failing_create_at(2));
    let orchestrator = orchestrator_with(store.clone(), &fakes, Duration::from_secs(5));
    let handle = OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Queue);

    let first = handle.start_run(Some("first".to_string())).await.unwrap();
    gate.entered().await;

    let err = handle.start_run(Some("second".to_string())).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Create(_)));

    let third = handle.start_run(Some("third".to_string())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The failed trigger must not let the third run overtake the first.
    assert_eq!(store.get(&third).await.unwrap().status, RunStatus::Pending);
    assert!(!fakes.calls().contains(&"text:third".to_string()));
    assert_eq!(handle.active_runs(), vec![first.clone(), third.clone()]);

    gate.release();
    gate.release();
    assert_eq!(handle.wait(&first).await.unwrap().status, RunStatus::Completed);
    assert_eq!(handle.wait(&third).await.unwrap().status, RunStatus::Completed);

    let calls = fakes.calls();
    let first_published = calls
        .iter()
        .position(|c| *c == format!("publish:{first}"))
        .unwrap();
    let third_started = calls.iter().position(|c| c == "text:third").unwrap();
    assert!(first_published < third_started, "{calls:?}");
    assert!(!calls.contains(&"text:second".to_string()));
}

#[tokio::test]
async fn test_unknown_ids_are_rejected() {
    let fakes = Arc::new(FakeProviders::new());
    let (_store, orchestrator) = orchestrator(&fakes);
    let handle = OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Reject);
    let stranger = RunId::parse("not-triggered-here").unwrap();

    assert!(matches!(
        handle.cancel(&stranger),
        Err(OrchestratorError::UnknownRun { .. })
    ));
    assert!(matches!(
        handle.wait(&stranger).await,
        Err(OrchestratorError::UnknownRun { .. })
    ));
}

#[tokio::test]
async fn test_cancel_while_another_task_waits() {
    let gate = Gate::new();
    let fakes = Arc::new(FakeProviders::new().gate(StageId::Text, gate.clone()));
    let (_store, orchestrator) = orchestrator(&fakes);
    let handle = Arc::new(OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Reject));

    let id = handle.start_run(None).await.unwrap();
    gate.entered().await;
    let waiter = tokio::spawn({
        let handle = Arc::clone(&handle);
        let id = id.clone();
        async move { handle.wait(&id).await }
    });
    tokio::task::yield_now().await;

    handle.cancel(&id).unwrap();
    gate.release();

    let record = waiter.await.unwrap().unwrap();
    assert_eq!(record.error.unwrap().kind, ErrorKind::Cancelled);
    // Forgotten once the wait has finished.
    assert!(matches!(
        handle.cancel(&id),
        Err(OrchestratorError::UnknownRun { .. })
    ));
}
