use std::time::Duration;

use contentflow_utils::error::ConfigError;
use contentflow_utils::types::StageId;

use super::{ActiveRunPolicy, Config, ConfigSource, ProviderEndpoint, ProviderMode};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding contentflow without environment variables or
    /// config files.
    ///
    /// # Example
    ///
    /// ```rust
    /// use contentflow_config::{Config, ProviderMode};
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .data_dir("/tmp/contentflow")
    ///     .provider_mode(ProviderMode::Simulated)
    ///     .simulated_delay(Duration::ZERO)
    ///     .stage_timeout(Duration::from_secs(30))
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.provider_mode(), ProviderMode::Simulated);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for programmatic configuration of contentflow.
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    data_dir: Option<String>,
    stage_timeout: Option<Duration>,
    active_run_policy: Option<ActiveRunPolicy>,
    provider_mode: Option<ProviderMode>,
    simulated_delay: Option<Duration>,
    simulated_fail_stage: Option<StageId>,
    text: Option<ProviderEndpoint>,
    metadata: Option<ProviderEndpoint>,
    audio: Option<ProviderEndpoint>,
    video: Option<ProviderEndpoint>,
    publish: Option<(ProviderEndpoint, Option<String>)>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<String>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Default per-stage timeout (whole seconds; sub-second parts round up).
    #[must_use]
    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn active_run_policy(mut self, policy: ActiveRunPolicy) -> Self {
        self.active_run_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn provider_mode(mut self, mode: ProviderMode) -> Self {
        self.provider_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn simulated_delay(mut self, delay: Duration) -> Self {
        self.simulated_delay = Some(delay);
        self
    }

    /// Make the simulated provider behind `stage` report an outage.
    #[must_use]
    pub fn simulated_fail_stage(mut self, stage: StageId) -> Self {
        self.simulated_fail_stage = Some(stage);
        self
    }

    #[must_use]
    pub fn text_provider(mut self, endpoint: ProviderEndpoint) -> Self {
        self.text = Some(endpoint);
        self
    }

    #[must_use]
    pub fn metadata_provider(mut self, endpoint: ProviderEndpoint) -> Self {
        self.metadata = Some(endpoint);
        self
    }

    #[must_use]
    pub fn audio_provider(mut self, endpoint: ProviderEndpoint) -> Self {
        self.audio = Some(endpoint);
        self
    }

    #[must_use]
    pub fn video_provider(mut self, endpoint: ProviderEndpoint) -> Self {
        self.video = Some(endpoint);
        self
    }

    #[must_use]
    pub fn publish_provider(mut self, endpoint: ProviderEndpoint, channel: Option<String>) -> Self {
        self.publish = Some((endpoint, channel));
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        let programmatic = |config: &mut Config, key: &str| {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Programmatic);
        };

        if let Some(dir) = self.data_dir {
            config.defaults.data_dir = Some(dir);
            programmatic(&mut config, "data_dir");
        }
        if let Some(timeout) = self.stage_timeout {
            let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
            config.defaults.stage_timeout_secs = Some(secs);
            programmatic(&mut config, "stage_timeout_secs");
        }
        if let Some(policy) = self.active_run_policy {
            config.defaults.active_run_policy = Some(policy);
            programmatic(&mut config, "active_run_policy");
        }
        if let Some(mode) = self.provider_mode {
            config.providers.mode = Some(mode);
            programmatic(&mut config, "provider_mode");
        }
        if let Some(stage) = self.simulated_fail_stage {
            config.providers.simulated.fail_stage = Some(stage);
            programmatic(&mut config, "simulated_fail_stage");
        }
        if let Some(delay) = self.simulated_delay {
            config.providers.simulated.delay_ms =
                Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
            programmatic(&mut config, "simulated_delay_ms");
        }
        if let Some(text) = self.text {
            config.providers.text = text;
        }
        if let Some(metadata) = self.metadata {
            config.providers.metadata = metadata;
        }
        if let Some(audio) = self.audio {
            config.providers.audio = audio;
        }
        if let Some(video) = self.video {
            config.providers.video = video;
        }
        if let Some((publish, channel)) = self.publish {
            config.providers.publish.endpoint = publish.endpoint;
            config.providers.publish.credential_env = publish.credential_env;
            config.providers.publish.timeout_secs = publish.timeout_secs;
            config.providers.publish.channel = channel;
        }

        config.validate()?;
        Ok(config)
    }
}
