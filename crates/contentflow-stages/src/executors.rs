//! The five stage executors.
//!
//! Each executor pulls its inputs from `stage_results`, makes one provider
//! call and maps the result into a [`StageOutcome`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use contentflow_providers::{
    AudioProvider, MetadataSink, ProviderError, PublishMetadata, PublishProvider, TextProvider,
    VideoProvider,
};
use contentflow_utils::types::{ErrorKind, RunRecord, StageId};

use crate::{Stage, StageFailure, StageOutcome};

/// Map a provider error into the taxonomy documented for `stage`.
///
/// | stage | mapping |
/// |-------|---------|
/// | text | `InvalidResponse` → `invalid_output`, rest → `provider_error` |
/// | metadata | everything → `provider_error` |
/// | audio, video | `Quota`, `RateLimited` → `quota_exceeded`, rest → `provider_error` |
/// | publish | `Auth` → `auth_error`; `RateLimited`, `Quota` → `rate_limited`; rest → `provider_error` |
#[must_use]
pub fn translate_provider_error(stage: StageId, error: &ProviderError) -> StageFailure {
    let kind = match (stage, error) {
        (StageId::Text, ProviderError::InvalidResponse(_)) => ErrorKind::InvalidOutput,
        (StageId::Audio | StageId::Video, ProviderError::Quota(_) | ProviderError::RateLimited(_)) => {
            ErrorKind::QuotaExceeded
        }
        (StageId::Publish, ProviderError::Auth(_)) => ErrorKind::AuthError,
        (StageId::Publish, ProviderError::RateLimited(_) | ProviderError::Quota(_)) => {
            ErrorKind::RateLimited
        }
        _ => ErrorKind::ProviderError,
    };
    StageFailure::new(kind, error.reason())
}

/// Turn a provider result into an outcome; blank artifacts are invalid.
fn into_outcome(stage: StageId, result: Result<String, ProviderError>) -> StageOutcome {
    match result {
        Ok(artifact) if artifact.trim().is_empty() => StageOutcome::failure(
            ErrorKind::InvalidOutput,
            format!("{stage} provider returned an empty result"),
        ),
        Ok(artifact) => StageOutcome::Success(artifact),
        Err(error) => {
            debug!(stage = %stage, error = %error.reason(), "Provider call failed");
            StageOutcome::Failure(translate_provider_error(stage, &error))
        }
    }
}

/// Artifact of `dep`, or an internal failure for callers that skipped it.
fn upstream(record: &RunRecord, stage: StageId, dep: StageId) -> Result<&str, StageOutcome> {
    record.stage_results.get(dep).ok_or_else(|| {
        StageOutcome::failure(
            ErrorKind::Internal,
            format!("{stage} stage requires the {dep} artifact, which is missing"),
        )
    })
}

/// Stage 1: generate the text content from the optional seed.
pub struct TextStage {
    provider: Arc<dyn TextProvider>,
}

impl TextStage {
    pub fn new(provider: Arc<dyn TextProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Stage for TextStage {
    fn id(&self) -> StageId {
        StageId::Text
    }

    fn deps(&self) -> &'static [StageId] {
        // First stage; only the seed is read
        &[]
    }

    async fn execute(&self, record: &RunRecord) -> StageOutcome {
        let result = self.provider.generate(record.seed.as_deref()).await;
        into_outcome(StageId::Text, result)
    }
}

/// Stage 2: record the run in the metadata sink. The orchestrator tolerates
/// failures of this stage.
pub struct MetadataStage {
    sink: Arc<dyn MetadataSink>,
}

impl MetadataStage {
    pub fn new(sink: Arc<dyn MetadataSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Stage for MetadataStage {
    fn id(&self) -> StageId {
        StageId::Metadata
    }

    fn deps(&self) -> &'static [StageId] {
        &[StageId::Text]
    }

    async fn execute(&self, record: &RunRecord) -> StageOutcome {
        let text = match upstream(record, StageId::Metadata, StageId::Text) {
            Ok(text) => text,
            Err(outcome) => return outcome,
        };
        let result = self.sink.record(&record.id, text).await;
        into_outcome(StageId::Metadata, result)
    }
}

/// Stage 3: synthesize audio from the text.
pub struct AudioStage {
    provider: Arc<dyn AudioProvider>,
}

impl AudioStage {
    pub fn new(provider: Arc<dyn AudioProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Stage for AudioStage {
    fn id(&self) -> StageId {
        StageId::Audio
    }

    fn deps(&self) -> &'static [StageId] {
        &[StageId::Text]
    }

    async fn execute(&self, record: &RunRecord) -> StageOutcome {
        let text = match upstream(record, StageId::Audio, StageId::Text) {
            Ok(text) => text,
            Err(outcome) => return outcome,
        };
        let result = self.provider.synthesize(text).await;
        into_outcome(StageId::Audio, result)
    }
}

/// Stage 4: synthesize video from the text and the audio reference.
pub struct VideoStage {
    provider: Arc<dyn VideoProvider>,
}

impl VideoStage {
    pub fn new(provider: Arc<dyn VideoProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Stage for VideoStage {
    fn id(&self) -> StageId {
        StageId::Video
    }

    fn deps(&self) -> &'static [StageId] {
        &[StageId::Text, StageId::Audio]
    }

    async fn execute(&self, record: &RunRecord) -> StageOutcome {
        let (text, audio_ref) = match upstream(record, StageId::Video, StageId::Text)
            .and_then(|text| Ok((text, upstream(record, StageId::Video, StageId::Audio)?)))
        {
            Ok(inputs) => inputs,
            Err(outcome) => return outcome,
        };
        let result = self.provider.synthesize(text, audio_ref).await;
        into_outcome(StageId::Video, result)
    }
}

/// Stage 5: publish the video to the configured channel.
pub struct PublishStage {
    provider: Arc<dyn PublishProvider>,
    channel: Option<String>,
}

impl PublishStage {
    pub fn new(provider: Arc<dyn PublishProvider>, channel: Option<String>) -> Self {
        Self { provider, channel }
    }

    fn metadata(&self, record: &RunRecord) -> Result<(String, PublishMetadata), StageOutcome> {
        let text = upstream(record, StageId::Publish, StageId::Text)?;
        let audio_ref = upstream(record, StageId::Publish, StageId::Audio)?;
        let video_ref = upstream(record, StageId::Publish, StageId::Video)?;
        let metadata =
            PublishMetadata::from_text(record.id.clone(), text, audio_ref, self.channel.clone());
        Ok((video_ref.to_string(), metadata))
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn id(&self) -> StageId {
        StageId::Publish
    }

    fn deps(&self) -> &'static [StageId] {
        &[StageId::Text, StageId::Audio, StageId::Video]
    }

    async fn execute(&self, record: &RunRecord) -> StageOutcome {
        let (video_ref, metadata) = match self.metadata(record) {
            Ok(inputs) => inputs,
            Err(outcome) => return outcome,
        };
        let result = self.provider.publish(&video_ref, &metadata).await;
        into_outcome(StageId::Publish, result)
    }
}
