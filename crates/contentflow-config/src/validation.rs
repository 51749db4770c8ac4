use contentflow_utils::error::ConfigError;
use contentflow_utils::types::StageId;

use super::{Config, ProviderMode};
use crate::model::{MAX_SIMULATED_DELAY_MS, MAX_STAGE_TIMEOUT_SECS, parse_log_format};

fn check_timeout(key: &str, secs: Option<u64>) -> Result<(), ConfigError> {
    match secs {
        Some(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: "must be greater than 0".to_string(),
        }),
        Some(s) if s > MAX_STAGE_TIMEOUT_SECS => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: format!("exceeds maximum limit of {MAX_STAGE_TIMEOUT_SECS} seconds"),
        }),
        _ => Ok(()),
    }
}

fn check_endpoint(key: &str, endpoint: &str) -> Result<(), ConfigError> {
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: format!("'{endpoint}' is not an absolute http(s) URL"),
        }),
    }
}

fn check_env_name(key: &str, name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: format!("'{name}' is not a valid environment variable name"),
        })
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        check_timeout("stage_timeout_secs", self.defaults.stage_timeout_secs)?;

        if let Some(format) = &self.defaults.log_format {
            parse_log_format(format)?;
        }

        if let Some(dir) = &self.defaults.data_dir
            && dir.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                key: "data_dir".to_string(),
                value: "must not be empty".to_string(),
            });
        }

        if let Some(delay) = self.providers.simulated.delay_ms
            && delay > MAX_SIMULATED_DELAY_MS
        {
            return Err(ConfigError::InvalidValue {
                key: "providers.simulated.delay_ms".to_string(),
                value: format!("exceeds maximum limit of {MAX_SIMULATED_DELAY_MS} ms"),
            });
        }

        for stage in StageId::ALL {
            let name = stage.as_str();
            let endpoint = self.providers.endpoint_for(stage);

            check_timeout(&format!("providers.{name}.timeout_secs"), endpoint.timeout_secs)?;

            if let Some(url) = &endpoint.endpoint {
                check_endpoint(&format!("providers.{name}.endpoint"), url)?;
            }

            if let Some(env) = &endpoint.credential_env {
                check_env_name(&format!("providers.{name}.credential_env"), env)?;
            }
        }

        if let Some(channel) = &self.providers.publish.channel
            && channel.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                key: "providers.publish.channel".to_string(),
                value: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Check that every stage has an endpoint when `providers.mode` is
    /// `http`.
    ///
    /// Kept out of [`validate`](Self::validate) so read-only commands work
    /// before any provider is configured; it runs when a provider set is
    /// built.
    ///
    /// # Errors
    /// [`ConfigError::MissingRequired`] naming the first missing endpoint.
    pub fn require_provider_endpoints(&self) -> Result<(), ConfigError> {
        if self.provider_mode() != ProviderMode::Http {
            return Ok(());
        }
        match StageId::ALL
            .into_iter()
            .find(|stage| self.providers.endpoint_for(*stage).endpoint.is_none())
        {
            Some(stage) => Err(ConfigError::MissingRequired(format!(
                "providers.{stage}.endpoint (required when providers.mode = \"http\")"
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderEndpoint;

    fn simulated_config() -> Config {
        let mut config = Config::default();
        config.providers.mode = Some(ProviderMode::Simulated);
        config
    }

    fn http_config() -> Config {
        let mut config = Config::default();
        config.providers.mode = Some(ProviderMode::Http);
        for stage in StageId::ALL {
            let url = Some(format!("https://{}.example.com/v1", stage.as_str()));
            match stage {
                StageId::Text => config.providers.text.endpoint = url,
                StageId::Metadata => config.providers.metadata.endpoint = url,
                StageId::Audio => config.providers.audio.endpoint = url,
                StageId::Video => config.providers.video.endpoint = url,
                StageId::Publish => config.providers.publish.endpoint = url,
            }
        }
        config
    }

    #[test]
    fn test_defaults_are_valid_in_simulated_mode() {
        assert!(simulated_config().validate().is_ok());
        assert!(simulated_config().require_provider_endpoints().is_ok());
    }

    #[test]
    fn test_default_http_config_is_valid_without_endpoints() {
        assert!(Config::default().validate().is_ok());
        assert!(Config::default().require_provider_endpoints().is_err());
    }

    #[test]
    fn test_http_mode_requires_every_endpoint() {
        assert!(http_config().require_provider_endpoints().is_ok());

        let mut config = http_config();
        config.providers.video.endpoint = None;
        // Still a valid config for read-only use.
        assert!(config.validate().is_ok());
        let err = config.require_provider_endpoints().unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingRequired(ref key) if key.contains("providers.video.endpoint"))
        );
    }

    #[test]
    fn test_rejects_bad_timeouts() {
        let mut config = simulated_config();
        config.defaults.stage_timeout_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = simulated_config();
        config.defaults.stage_timeout_secs = Some(MAX_STAGE_TIMEOUT_SECS + 1);
        assert!(config.validate().is_err());

        let mut config = simulated_config();
        config.providers.audio = ProviderEndpoint {
            timeout_secs: Some(0),
            ..ProviderEndpoint::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "providers.audio.timeout_secs")
        );
    }

    #[test]
    fn test_rejects_non_http_endpoints() {
        for bad in ["ftp://x.example.com", "localhost:8080", "https://", "http:///path"] {
            let mut config = http_config();
            config.providers.text.endpoint = Some(bad.to_string());
            assert!(config.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_bad_env_names_and_log_format() {
        let mut config = simulated_config();
        config.providers.publish.credential_env = Some("PUBLISH TOKEN".to_string());
        assert!(config.validate().is_err());

        let mut config = simulated_config();
        config.defaults.log_format = Some("yaml".to_string());
        assert!(config.validate().is_err());
    }
}
