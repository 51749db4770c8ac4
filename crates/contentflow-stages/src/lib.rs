//! Stage executors for the content pipeline
//!
//! A stage reads the artifacts accumulated on a [`RunRecord`], calls its
//! provider once and reports a [`StageOutcome`]. Stages never touch the run
//! log store; persisting outcomes is the orchestrator's job.
//!
//! # Purpose
//!
//! This crate is the contract between the orchestrator and the providers:
//! it fixes the stage order, translates provider errors into the stage error
//! taxonomy and bounds every provider call with a timeout.

mod executors;
mod timeout;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use contentflow_config::Config;
use contentflow_providers::ProviderSet;
use contentflow_utils::types::{ErrorKind, RunRecord};

pub use contentflow_utils::types::StageId;
pub use executors::{
    AudioStage, MetadataStage, PublishStage, TextStage, VideoStage, translate_provider_error,
};
pub use timeout::execute_with_timeout;

/// Why a stage did not produce an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub kind: ErrorKind,
    pub reason: String,
}

impl StageFailure {
    pub fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Result of executing one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The artifact reference produced by the stage
    Success(String),
    Failure(StageFailure),
}

impl StageOutcome {
    pub fn failure(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self::Failure(StageFailure::new(kind, reason))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Core trait that every pipeline stage implements
#[async_trait]
pub trait Stage: Send + Sync {
    /// Returns the unique identifier for this stage
    fn id(&self) -> StageId;

    /// Stages whose artifacts this stage reads
    fn deps(&self) -> &'static [StageId];

    /// Run the stage against the artifacts accumulated so far.
    ///
    /// Failures are reported through [`StageOutcome::Failure`], never as a
    /// panic or an error type.
    async fn execute(&self, record: &RunRecord) -> StageOutcome;
}

/// A stage plus the time budget for one call of it.
#[derive(Clone)]
pub struct StageEntry {
    pub stage: Arc<dyn Stage>,
    pub timeout: Duration,
}

impl StageEntry {
    #[must_use]
    pub fn id(&self) -> StageId {
        self.stage.id()
    }

    /// Execute the stage, turning an expired budget into a
    /// `provider_error` failure with reason `Timeout`.
    pub async fn run(&self, record: &RunRecord) -> StageOutcome {
        execute_with_timeout(self.stage.as_ref(), record, self.timeout).await
    }
}

/// The five stages in execution order.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<StageEntry>,
}

impl Pipeline {
    /// Stages over `providers`, with per-stage timeouts and the publish
    /// channel taken from configuration.
    #[must_use]
    pub fn from_config(providers: ProviderSet, config: &Config) -> Self {
        Self::new(
            providers,
            config.providers.publish.channel.clone(),
            |stage| config.stage_timeout(stage),
        )
    }

    pub fn new(
        providers: ProviderSet,
        channel: Option<String>,
        timeout_for: impl Fn(StageId) -> Duration,
    ) -> Self {
        let stages: [Arc<dyn Stage>; 5] = [
            Arc::new(TextStage::new(providers.text)),
            Arc::new(MetadataStage::new(providers.metadata)),
            Arc::new(AudioStage::new(providers.audio)),
            Arc::new(VideoStage::new(providers.video)),
            Arc::new(PublishStage::new(providers.publish, channel)),
        ];
        let stages = stages
            .into_iter()
            .map(|stage| {
                let timeout = timeout_for(stage.id());
                StageEntry { stage, timeout }
            })
            .collect();
        Self { stages }
    }

    /// Same stages, every one bounded by `timeout`.
    #[must_use]
    pub fn with_uniform_timeout(mut self, timeout: Duration) -> Self {
        for entry in &mut self.stages {
            entry.timeout = timeout;
        }
        self
    }

    #[must_use]
    pub fn stages(&self) -> &[StageEntry] {
        &self.stages
    }
}
