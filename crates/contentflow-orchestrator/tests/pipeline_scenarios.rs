//! End-to-end runs through the orchestrator with scripted providers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use common::{FakeProviders, Gate, orchestrator, orchestrator_with};
use contentflow_orchestrator::{CancelFlag, OrchestratorHandle};
use contentflow_providers::ProviderError;
use contentflow_store::{FileRunLogStore, InMemoryRunLogStore, RunLogStore};
use contentflow_utils::types::{ErrorKind, RunStatus, StageId};
use contentflow_config::ActiveRunPolicy;

#[tokio::test]
async fn test_successful_run_records_every_artifact() {
    let fakes = Arc::new(
        FakeProviders::new()
            .returning(StageId::Text, "Roses are red")
            .returning(StageId::Publish, "https://youtube.com/watch?v=abc"),
    );
    let (store, orchestrator) = orchestrator(&fakes);

    let record = orchestrator
        .execute_run(Some("roses".to_string()))
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.current_stage, None);
    assert!(record.error.is_none());
    assert!(record.non_fatal_errors.is_empty());
    assert_eq!(record.stage_results.produced(), StageId::ALL.to_vec());
    assert_eq!(record.stage_results.get(StageId::Text), Some("Roses are red"));
    assert_eq!(
        record.stage_results.get(StageId::Publish),
        Some("https://youtube.com/watch?v=abc")
    );

    // The returned record is what the store holds.
    assert_eq!(store.get(&record.id).await.unwrap(), record);

    // Audio is synthesized from the text; publish sees the run id.
    let calls = fakes.calls();
    assert_eq!(calls[0], "text:roses");
    assert_eq!(calls[2], "audio:Roses are red");
    assert_eq!(calls[4], format!("publish:{}", record.id));
}

fn scripted_references() -> FakeProviders {
    FakeProviders::new()
        .returning(StageId::Text, "Sample rhyme")
        .returning(StageId::Audio, "a1")
        .returning(StageId::Video, "v1")
        .returning(StageId::Publish, "https://example.com/v1")
}

#[tokio::test]
async fn test_unseeded_run_carries_each_reference_forward() {
    let fakes = Arc::new(scripted_references());
    let (_store, orchestrator) = orchestrator(&fakes);

    let record = orchestrator.execute_run(None).await.unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.seed, None);
    let results = &record.stage_results;
    assert_eq!(results.get(StageId::Text), Some("Sample rhyme"));
    assert_eq!(results.get(StageId::Metadata), Some("metadata-artifact"));
    assert_eq!(results.get(StageId::Audio), Some("a1"));
    assert_eq!(results.get(StageId::Video), Some("v1"));
    assert_eq!(results.get(StageId::Publish), Some("https://example.com/v1"));

    assert_eq!(
        fakes.calls(),
        vec![
            "text:-".to_string(),
            format!("metadata:{}", record.id),
            "audio:Sample rhyme".to_string(),
            "video:a1".to_string(),
            format!("publish:{}", record.id),
        ]
    );
}

#[tokio::test]
async fn test_video_timeout_fails_run_at_video() {
    let fakes = Arc::new(scripted_references().fail(
        StageId::Video,
        ProviderError::Timeout {
            duration: Duration::from_secs(30),
        },
    ));
    let (store, orchestrator) = orchestrator(&fakes);

    let record = orchestrator.execute_run(None).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    let error = record.error.as_ref().unwrap();
    assert_eq!(error.stage, Some(StageId::Video));
    assert_eq!(error.kind, ErrorKind::ProviderError);
    assert_eq!(error.reason, "Timeout");
    assert_eq!(
        record.stage_results.produced(),
        vec![StageId::Text, StageId::Metadata, StageId::Audio]
    );
    assert_eq!(record.stage_results.get(StageId::Audio), Some("a1"));
    assert_eq!(record.stage_results.get(StageId::Video), None);
    assert_eq!(record.stage_results.get(StageId::Publish), None);
    assert!(!fakes.calls().iter().any(|c| c.starts_with("publish:")));
    assert_eq!(store.get(&record.id).await.unwrap(), record);
}

#[tokio::test]
async fn test_metadata_failure_is_tolerated() {
    let fakes = Arc::new(FakeProviders::new().fail(
        StageId::Metadata,
        ProviderError::Outage("sheet unavailable".to_string()),
    ));
    let (_store, orchestrator) = orchestrator(&fakes);

    let record = orchestrator.execute_run(None).await.unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert!(record.error.is_none());
    assert_eq!(record.stage_results.get(StageId::Metadata), None);
    assert_eq!(
        record.stage_results.produced(),
        vec![StageId::Text, StageId::Audio, StageId::Video, StageId::Publish]
    );
    assert_eq!(record.non_fatal_errors.len(), 1);
    let tolerated = &record.non_fatal_errors[0];
    assert_eq!(tolerated.stage, Some(StageId::Metadata));
    assert_eq!(tolerated.kind, ErrorKind::ProviderError);
    assert!(tolerated.reason.contains("sheet unavailable"));
}

#[tokio::test]
async fn test_video_quota_fails_run_and_stops_pipeline() {
    let fakes = Arc::new(FakeProviders::new().fail(
        StageId::Video,
        ProviderError::Quota("monthly render minutes used".to_string()),
    ));
    let (_store, orchestrator) = orchestrator(&fakes);

    let record = orchestrator.execute_run(None).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.current_stage, Some(StageId::Video));
    let error = record.error.as_ref().unwrap();
    assert_eq!(error.stage, Some(StageId::Video));
    assert_eq!(error.kind, ErrorKind::QuotaExceeded);
    assert_eq!(
        record.stage_results.produced(),
        vec![StageId::Text, StageId::Metadata, StageId::Audio]
    );
    assert!(
        !fakes.calls().iter().any(|c| c.starts_with("publish:")),
        "publish must not run after a critical failure"
    );
}

#[tokio::test]
async fn test_empty_text_is_invalid_output() {
    let fakes = Arc::new(FakeProviders::new().returning(StageId::Text, "   "));
    let (_store, orchestrator) = orchestrator(&fakes);

    let record = orchestrator.execute_run(None).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    let error = record.error.unwrap();
    assert_eq!(error.stage, Some(StageId::Text));
    assert_eq!(error.kind, ErrorKind::InvalidOutput);
    assert!(record.stage_results.produced().is_empty());
}

#[tokio::test]
async fn test_stage_timeout_is_provider_error() {
    let fakes = Arc::new(FakeProviders::new().delay(StageId::Audio, Duration::from_secs(2)));
    let store = Arc::new(InMemoryRunLogStore::new());
    let orchestrator = orchestrator_with(store, &fakes, Duration::from_millis(50));

    let record = orchestrator.execute_run(None).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    let error = record.error.unwrap();
    assert_eq!(error.stage, Some(StageId::Audio));
    assert_eq!(error.kind, ErrorKind::ProviderError);
    assert_eq!(error.reason, "Timeout");
}

#[tokio::test]
async fn test_progress_is_visible_while_stage_runs() {
    let gate = Gate::new();
    let fakes = Arc::new(FakeProviders::new().gate(StageId::Audio, gate.clone()));
    let (store, orchestrator) = orchestrator(&fakes);
    let handle = OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Reject);

    let id = handle.start_run(None).await.unwrap();
    gate.entered().await;

    let mid = store.get(&id).await.unwrap();
    assert_eq!(mid.status, RunStatus::Running);
    assert_eq!(mid.current_stage, Some(StageId::Audio));
    assert_eq!(
        mid.stage_results.produced(),
        vec![StageId::Text, StageId::Metadata]
    );

    gate.release();
    let done = handle.wait(&id).await.unwrap();
    assert_eq!(done.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_cancel_between_stages() {
    let gate = Gate::new();
    let fakes = Arc::new(FakeProviders::new().gate(StageId::Text, gate.clone()));
    let (_store, orchestrator) = orchestrator(&fakes);
    let handle = OrchestratorHandle::new(orchestrator, ActiveRunPolicy::Reject);

    let id = handle.start_run(None).await.unwrap();
    gate.entered().await;
    handle.cancel(&id).unwrap();
    gate.release();

    let record = handle.wait(&id).await.unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    // The stage in flight completes; the next one never starts.
    assert_eq!(record.stage_results.produced(), vec![StageId::Text]);
    let error = record.error.unwrap();
    assert_eq!(error.kind, ErrorKind::Cancelled);
    assert_eq!(error.stage, Some(StageId::Metadata));
    assert_eq!(fakes.calls().len(), 1);
}

#[tokio::test]
async fn test_cancel_flag_set_before_drive() {
    let fakes = Arc::new(FakeProviders::new());
    let (_store, orchestrator) = orchestrator(&fakes);
    let id = orchestrator.create_run(None).await.unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let record = orchestrator.drive(&id, &cancel).await.unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert!(fakes.calls().is_empty());
}

#[tokio::test]
async fn test_file_store_run_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = Utf8Path::from_path(dir.path()).unwrap();
    let fakes = Arc::new(FakeProviders::new());

    let id = {
        let store: Arc<dyn RunLogStore> = Arc::new(FileRunLogStore::open(data_dir).unwrap());
        let orchestrator = orchestrator_with(store, &fakes, Duration::from_secs(5));
        let record = orchestrator.execute_run(Some("ocean".to_string())).await.unwrap();
        assert_eq!(record.status, RunStatus::Completed);
        record.id
    };

    let reopened = FileRunLogStore::open(data_dir).unwrap();
    let record = reopened.get(&id).await.unwrap();
    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.seed.as_deref(), Some("ocean"));
    assert_eq!(record.stage_results.produced(), StageId::ALL.to_vec());
}
