//! Embedding contentflow as a library: the handle, custom providers and the
//! reporter reading what the orchestrator wrote.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use contentflow::{
    ActiveRunPolicy, Config, ErrorKind, FileRunLogStore, InMemoryRunLogStore, OrchestratorHandle,
    Pipeline, PipelineOrchestrator, ProviderMode, ProviderSet, RunLogStore, RunStatus,
    RunStatusReporter, SimulatedProviders, StageId, TextProvider,
};
use contentflow_providers::ProviderError;

fn simulated_config(dir: &TempDir) -> contentflow::ConfigBuilder {
    Config::builder()
        .data_dir(dir.path().to_string_lossy())
        .provider_mode(ProviderMode::Simulated)
        .simulated_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_handle_from_config_persists_completed_run() {
    let dir = TempDir::new().unwrap();
    let config = simulated_config(&dir).build().unwrap();

    let handle = OrchestratorHandle::from_config(&config).unwrap();
    let id = handle.start_run(Some("ocean".to_string())).await.unwrap();
    let record = handle.wait(&id).await.unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.seed.as_deref(), Some("ocean"));
    assert!(record.stage_results.get(StageId::Publish).is_some());

    // A second process would see the same record through the reporter.
    let store = FileRunLogStore::open(&config.data_dir()).unwrap();
    let reporter = RunStatusReporter::new(Arc::new(store));
    let view = reporter.get_run(&id).await.unwrap();
    assert_eq!(view.run, record);
    assert_eq!(view.progress.completed, 5);
    assert_eq!(view.current_stage_label, None);
}

#[tokio::test]
async fn test_configured_failure_stops_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let config = simulated_config(&dir)
        .simulated_fail_stage(StageId::Audio)
        .build()
        .unwrap();

    let handle = OrchestratorHandle::from_config(&config).unwrap();
    let id = handle.start_run(None).await.unwrap();
    let record = handle.wait(&id).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    let error = record.error.as_ref().unwrap();
    assert_eq!(error.stage, Some(StageId::Audio));
    assert_eq!(error.kind, ErrorKind::ProviderError);
    assert!(record.stage_results.get(StageId::Video).is_none());

    let listing = RunStatusReporter::new(handle.store())
        .list_runs(10, 0)
        .await
        .unwrap();
    assert_eq!(listing.summary.failed, 1);
}

struct FixedText(&'static str);

#[async_trait]
impl TextProvider for FixedText {
    async fn generate(&self, _seed: Option<&str>) -> Result<String, ProviderError> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn test_custom_text_provider_feeds_later_stages() {
    let mut providers = ProviderSet::simulated(SimulatedProviders::new(Duration::ZERO));
    providers.text = Arc::new(FixedText("Tides roll in\nand out again"));

    let store: Arc<dyn RunLogStore> = Arc::new(InMemoryRunLogStore::new());
    let pipeline = Pipeline::new(providers, Some("rhymes".to_string()), |_| {
        Duration::from_secs(5)
    });
    let handle = OrchestratorHandle::new(
        PipelineOrchestrator::new(store.clone(), pipeline),
        ActiveRunPolicy::Reject,
    );

    let id = handle.start_run(None).await.unwrap();
    let record = handle.wait(&id).await.unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(
        record.stage_results.get(StageId::Text),
        Some("Tides roll in\nand out again")
    );
    assert_eq!(store.get(&id).await.unwrap(), record);
}
