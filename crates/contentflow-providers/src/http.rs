//! JSON-over-HTTP provider adapters
//!
//! Each provider is a single `POST` of a small camelCase JSON body to the
//! configured endpoint, answered by a JSON object carrying the artifact.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use contentflow_config::{Config, Credential};
use contentflow_utils::error::ContentflowError;
use contentflow_utils::redaction::redact_error_message;
use contentflow_utils::types::{RunId, StageId};

use crate::http_client::HttpClient;
use crate::{
    AudioProvider, MetadataSink, ProviderError, ProviderSet, PublishMetadata, PublishProvider,
    TextProvider, VideoProvider,
};

/// One configured endpoint: URL, optional bearer credential and timeout.
#[derive(Clone)]
struct JsonEndpoint {
    client: HttpClient,
    stage: StageId,
    url: String,
    credential: Option<Credential>,
    timeout: Duration,
}

impl JsonEndpoint {
    fn from_config(
        client: &HttpClient,
        config: &Config,
        stage: StageId,
    ) -> Result<Self, ContentflowError> {
        let endpoint = config.providers.endpoint_for(stage);
        let url = endpoint.endpoint.ok_or_else(|| {
            ProviderError::Misconfiguration(format!(
                "No endpoint configured for the {stage} provider. \
                 Set [providers.{stage}] endpoint or use providers.mode = \"simulated\"."
            ))
        })?;
        let credential = endpoint
            .credential_env
            .map(|env| Credential::from_env(stage.as_str(), &env))
            .transpose()?;

        Ok(Self {
            client: client.clone(),
            stage,
            url,
            credential,
            timeout: config.stage_timeout(stage),
        })
    }

    async fn call<B, R>(&self, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let provider = self.stage.as_str();
        let mut request = self.client.post(&self.url).json(body);
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential.expose());
        }

        debug!(provider, url = %redact_error_message(&self.url), "Calling provider");

        let response = self
            .client
            .execute_with_retry(request, self.timeout, provider)
            .await?;

        response.json::<R>().await.map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "{provider} response could not be parsed: {}",
                redact_error_message(&e.to_string())
            ))
        })
    }
}

#[derive(Serialize)]
struct TextRequest<'a> {
    seed: Option<&'a str>,
}

#[derive(Deserialize)]
struct TextResponse {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRequest<'a> {
    run_id: &'a RunId,
    text: &'a str,
}

#[derive(Deserialize)]
struct MetadataResponse {
    ack: String,
}

#[derive(Serialize)]
struct AudioRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioResponse {
    audio_ref: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoRequest<'a> {
    text: &'a str,
    audio_ref: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    video_ref: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishRequest<'a> {
    video_ref: &'a str,
    run_id: &'a RunId,
    title: &'a str,
    description: &'a str,
    audio_ref: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

#[derive(Deserialize)]
struct PublishResponse {
    url: String,
}

struct HttpTextProvider(JsonEndpoint);
struct HttpMetadataSink(JsonEndpoint);
struct HttpAudioProvider(JsonEndpoint);
struct HttpVideoProvider(JsonEndpoint);
struct HttpPublishProvider(JsonEndpoint);

#[async_trait]
impl TextProvider for HttpTextProvider {
    async fn generate(&self, seed: Option<&str>) -> Result<String, ProviderError> {
        let response: TextResponse = self.0.call(&TextRequest { seed }).await?;
        Ok(response.text)
    }
}

#[async_trait]
impl MetadataSink for HttpMetadataSink {
    async fn record(&self, run_id: &RunId, text: &str) -> Result<String, ProviderError> {
        let response: MetadataResponse = self.0.call(&MetadataRequest { run_id, text }).await?;
        Ok(response.ack)
    }
}

#[async_trait]
impl AudioProvider for HttpAudioProvider {
    async fn synthesize(&self, text: &str) -> Result<String, ProviderError> {
        let response: AudioResponse = self.0.call(&AudioRequest { text }).await?;
        Ok(response.audio_ref)
    }
}

#[async_trait]
impl VideoProvider for HttpVideoProvider {
    async fn synthesize(&self, text: &str, audio_ref: &str) -> Result<String, ProviderError> {
        let response: VideoResponse = self.0.call(&VideoRequest { text, audio_ref }).await?;
        Ok(response.video_ref)
    }
}

#[async_trait]
impl PublishProvider for HttpPublishProvider {
    async fn publish(
        &self,
        video_ref: &str,
        metadata: &PublishMetadata,
    ) -> Result<String, ProviderError> {
        let request = PublishRequest {
            video_ref,
            run_id: &metadata.run_id,
            title: &metadata.title,
            description: &metadata.description,
            audio_ref: &metadata.audio_ref,
            channel: metadata.channel.as_deref(),
        };
        let response: PublishResponse = self.0.call(&request).await?;
        Ok(response.url)
    }
}

/// HTTP providers for all five stages, sharing one client.
pub struct HttpProviders {
    text: HttpTextProvider,
    metadata: HttpMetadataSink,
    audio: HttpAudioProvider,
    video: HttpVideoProvider,
    publish: HttpPublishProvider,
}

impl HttpProviders {
    /// Build every adapter from `[providers.*]`, resolving credentials from
    /// the environment now so a missing variable fails before any run starts.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Misconfiguration` for a missing endpoint or a client
    ///   that cannot be built
    /// - `ConfigError::MissingCredential` for an unset `credential_env`
    pub fn from_config(config: &Config) -> Result<Self, ContentflowError> {
        let client = HttpClient::new()?;
        let endpoint = |stage| JsonEndpoint::from_config(&client, config, stage);

        Ok(Self {
            text: HttpTextProvider(endpoint(StageId::Text)?),
            metadata: HttpMetadataSink(endpoint(StageId::Metadata)?),
            audio: HttpAudioProvider(endpoint(StageId::Audio)?),
            video: HttpVideoProvider(endpoint(StageId::Video)?),
            publish: HttpPublishProvider(endpoint(StageId::Publish)?),
        })
    }

    #[must_use]
    pub fn into_set(self) -> ProviderSet {
        ProviderSet {
            text: Arc::new(self.text),
            metadata: Arc::new(self.metadata),
            audio: Arc::new(self.audio),
            video: Arc::new(self.video),
            publish: Arc::new(self.publish),
        }
    }
}
