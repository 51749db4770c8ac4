//! Test doubles shared by the orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

use contentflow_orchestrator::PipelineOrchestrator;
use contentflow_providers::{
    AudioProvider, MetadataSink, ProviderError, ProviderSet, PublishMetadata, PublishProvider,
    TextProvider, VideoProvider,
};
use contentflow_stages::Pipeline;
use contentflow_store::{InMemoryRunLogStore, RunLogStore};
use contentflow_utils::error::StoreError;
use contentflow_utils::types::{RunId, RunPatch, RunRecord, StageId};

/// Holds a provider call open until the test releases it.
pub struct Gate {
    entered: Notify,
    release: Semaphore,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Resolves once a gated call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.add_permits(1);
    }

    async fn pass(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }
}

/// Providers with scripted per-stage behavior. Every call is logged as
/// `"<stage>:<detail>"`.
#[derive(Default)]
pub struct FakeProviders {
    failures: HashMap<StageId, ProviderError>,
    artifacts: HashMap<StageId, String>,
    delays: HashMap<StageId, Duration>,
    gates: HashMap<StageId, Arc<Gate>>,
    calls: Mutex<Vec<String>>,
}

impl FakeProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, stage: StageId, error: ProviderError) -> Self {
        self.failures.insert(stage, error);
        self
    }

    pub fn returning(mut self, stage: StageId, artifact: &str) -> Self {
        self.artifacts.insert(stage, artifact.to_string());
        self
    }

    pub fn delay(mut self, stage: StageId, delay: Duration) -> Self {
        self.delays.insert(stage, delay);
        self
    }

    pub fn gate(mut self, stage: StageId, gate: Arc<Gate>) -> Self {
        self.gates.insert(stage, gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn call(&self, stage: StageId, detail: &str) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(format!("{stage}:{detail}"));
        if let Some(gate) = self.gates.get(&stage) {
            gate.pass().await;
        }
        if let Some(delay) = self.delays.get(&stage) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.failures.get(&stage) {
            return Err(error.clone());
        }
        Ok(self
            .artifacts
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| format!("{stage}-artifact")))
    }
}

#[async_trait]
impl TextProvider for FakeProviders {
    async fn generate(&self, seed: Option<&str>) -> Result<String, ProviderError> {
        self.call(StageId::Text, seed.unwrap_or("-")).await
    }
}

#[async_trait]
impl MetadataSink for FakeProviders {
    async fn record(&self, run_id: &RunId, _text: &str) -> Result<String, ProviderError> {
        self.call(StageId::Metadata, run_id.as_str()).await
    }
}

#[async_trait]
impl AudioProvider for FakeProviders {
    async fn synthesize(&self, text: &str) -> Result<String, ProviderError> {
        self.call(StageId::Audio, text).await
    }
}

#[async_trait]
impl VideoProvider for FakeProviders {
    async fn synthesize(&self, _text: &str, audio_ref: &str) -> Result<String, ProviderError> {
        self.call(StageId::Video, audio_ref).await
    }
}

#[async_trait]
impl PublishProvider for FakeProviders {
    async fn publish(
        &self,
        _video_ref: &str,
        metadata: &PublishMetadata,
    ) -> Result<String, ProviderError> {
        self.call(StageId::Publish, metadata.run_id.as_str()).await
    }
}

pub fn provider_set(fakes: &Arc<FakeProviders>) -> ProviderSet {
    ProviderSet {
        text: fakes.clone(),
        metadata: fakes.clone(),
        audio: fakes.clone(),
        video: fakes.clone(),
        publish: fakes.clone(),
    }
}

pub fn orchestrator_with(
    store: Arc<dyn RunLogStore>,
    fakes: &Arc<FakeProviders>,
    timeout: Duration,
) -> PipelineOrchestrator {
    let pipeline = Pipeline::new(provider_set(fakes), Some("rhymes".to_string()), |_| timeout);
    PipelineOrchestrator::new(store, pipeline)
}

pub fn orchestrator(fakes: &Arc<FakeProviders>) -> (Arc<InMemoryRunLogStore>, PipelineOrchestrator) {
    let store = Arc::new(InMemoryRunLogStore::new());
    let orchestrator = orchestrator_with(store.clone(), fakes, Duration::from_secs(5));
    (store, orchestrator)
}

/// Store that fails selected create or update attempts.
pub struct FlakyStore {
    inner: InMemoryRunLogStore,
    /// 1-based update attempt that fails first
    fail_from: usize,
    /// Whether attempts after `fail_from` fail as well
    fail_rest: bool,
    attempts: AtomicUsize,
    /// 1-based create attempt that fails
    fail_create_at: Option<usize>,
    create_attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_once_at(attempt: usize) -> Self {
        Self {
            inner: InMemoryRunLogStore::new(),
            fail_from: attempt,
            fail_rest: false,
            attempts: AtomicUsize::new(0),
            fail_create_at: None,
            create_attempts: AtomicUsize::new(0),
        }
    }

    /// Only the given create fails; updates always succeed.
    pub fn failing_create_at(attempt: usize) -> Self {
        Self {
            fail_create_at: Some(attempt),
            ..Self::failing_once_at(0)
        }
    }

    pub fn failing_from(attempt: usize) -> Self {
        Self {
            fail_rest: true,
            ..Self::failing_once_at(attempt)
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunLogStore for FlakyStore {
    async fn create(&self, record: RunRecord) -> Result<RunId, StoreError> {
        let attempt = self.create_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create_at == Some(attempt) {
            return Err(StoreError::io(
                format!("runs/{}.json", record.id),
                std::io::Error::other("disk full"),
            ));
        }
        self.inner.create(record).await
    }

    async fn update(&self, id: &RunId, patch: RunPatch) -> Result<RunRecord, StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let fails = attempt == self.fail_from || (self.fail_rest && attempt > self.fail_from);
        if fails {
            return Err(StoreError::io(
                format!("runs/{id}.json"),
                std::io::Error::other("disk full"),
            ));
        }
        self.inner.update(id, patch).await
    }

    async fn get(&self, id: &RunId) -> Result<RunRecord, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<RunRecord>, StoreError> {
        self.inner.list(limit, offset).await
    }
}
