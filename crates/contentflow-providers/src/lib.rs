//! Provider abstraction for the content pipeline
//!
//! Each stage talks to exactly one external collaborator through an async
//! trait. Two implementations exist: JSON-over-HTTP adapters built from the
//! `[providers.*]` configuration, and a simulated set with a fixed delay used
//! for dry runs and tests. Stages only see the traits, so the orchestrator
//! does not know which set is active.

mod http;
pub(crate) mod http_client;
mod simulated;

use async_trait::async_trait;
use std::sync::Arc;

use contentflow_config::{Config, ProviderMode};
use contentflow_utils::error::ContentflowError;
use contentflow_utils::types::RunId;

pub use contentflow_utils::error::ProviderError;
pub use http::HttpProviders;
pub use simulated::{RHYMES, SimulatedProviders};

/// Longest publish title taken from the generated text
pub const MAX_TITLE_CHARS: usize = 100;

/// Produces the text the rest of the pipeline is built from.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn generate(&self, seed: Option<&str>) -> Result<String, ProviderError>;
}

/// Records run metadata in an external log (a spreadsheet row, for example)
/// and returns an acknowledgement reference.
#[async_trait]
pub trait MetadataSink: Send + Sync {
    async fn record(&self, run_id: &RunId, text: &str) -> Result<String, ProviderError>;
}

/// Turns text into audio and returns a reference to it.
#[async_trait]
pub trait AudioProvider: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<String, ProviderError>;
}

/// Turns text plus an audio reference into video and returns a reference.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    async fn synthesize(&self, text: &str, audio_ref: &str) -> Result<String, ProviderError>;
}

/// Publishes a video and returns its public URL.
#[async_trait]
pub trait PublishProvider: Send + Sync {
    async fn publish(
        &self,
        video_ref: &str,
        metadata: &PublishMetadata,
    ) -> Result<String, ProviderError>;
}

/// What the publisher receives alongside the video reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMetadata {
    pub run_id: RunId,
    pub title: String,
    pub description: String,
    pub audio_ref: String,
    pub channel: Option<String>,
}

impl PublishMetadata {
    /// Derive the title from the first non-empty line of `text`, cut to
    /// [`MAX_TITLE_CHARS`]; the full text becomes the description.
    #[must_use]
    pub fn from_text(
        run_id: RunId,
        text: &str,
        audio_ref: impl Into<String>,
        channel: Option<String>,
    ) -> Self {
        let title = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .chars()
            .take(MAX_TITLE_CHARS)
            .collect();
        Self {
            run_id,
            title,
            description: text.to_string(),
            audio_ref: audio_ref.into(),
            channel,
        }
    }
}

/// One provider per stage.
#[derive(Clone)]
pub struct ProviderSet {
    pub text: Arc<dyn TextProvider>,
    pub metadata: Arc<dyn MetadataSink>,
    pub audio: Arc<dyn AudioProvider>,
    pub video: Arc<dyn VideoProvider>,
    pub publish: Arc<dyn PublishProvider>,
}

impl ProviderSet {
    /// Build the provider set selected by `providers.mode`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingRequired` in http mode when a stage has no
    ///   endpoint
    /// - `ConfigError::MissingCredential` if a configured `credential_env`
    ///   variable is unset
    /// - `ProviderError::Misconfiguration` if the HTTP client cannot be built
    pub fn from_config(config: &Config) -> Result<Self, ContentflowError> {
        match config.provider_mode() {
            ProviderMode::Simulated => Ok(Self::simulated(SimulatedProviders::from_config(config))),
            ProviderMode::Http => {
                config.require_provider_endpoints()?;
                Ok(HttpProviders::from_config(config)?.into_set())
            }
        }
    }

    /// Every stage backed by the same simulated provider.
    #[must_use]
    pub fn simulated(providers: SimulatedProviders) -> Self {
        let shared = Arc::new(providers);
        Self {
            text: shared.clone(),
            metadata: shared.clone(),
            audio: shared.clone(),
            video: shared.clone(),
            publish: shared,
        }
    }
}
