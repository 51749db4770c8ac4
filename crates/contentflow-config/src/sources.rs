use std::collections::BTreeMap;

use contentflow_utils::types::StageId;

use super::{Config, ConfigSource};

fn stable_source_label(source: &ConfigSource) -> &'static str {
    match source {
        ConfigSource::Cli => "cli",
        ConfigSource::Config => "config",
        ConfigSource::Programmatic => "programmatic",
        ConfigSource::Default => "default",
    }
}

fn source_label(source: Option<&ConfigSource>) -> String {
    stable_source_label(source.unwrap_or(&ConfigSource::Default)).to_string()
}

impl Config {
    /// Get effective configuration as key -> (value, source) pairs.
    ///
    /// Credentials are listed by environment variable name only; their
    /// values are never resolved here.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: String| {
            let source = source_label(self.source_attribution.get(key));
            config.insert(key.to_string(), (value, source));
        };

        add(
            "stage_timeout_secs",
            self.defaults
                .stage_timeout_secs
                .map_or_else(String::new, |s| s.to_string()),
        );
        add("active_run_policy", self.active_run_policy().to_string());
        add("data_dir", self.data_dir().to_string());
        add("verbose", self.verbose().to_string());
        add(
            "log_format",
            self.defaults
                .log_format
                .clone()
                .unwrap_or_else(|| "compact".to_string()),
        );
        add("provider_mode", self.provider_mode().to_string());
        add(
            "simulated_delay_ms",
            self.simulated_delay().as_millis().to_string(),
        );

        for stage in StageId::ALL {
            let name = stage.as_str();
            let endpoint = self.providers.endpoint_for(stage);
            if let Some(url) = endpoint.endpoint {
                add(&format!("providers.{name}.endpoint"), url);
            }
            if let Some(env) = endpoint.credential_env {
                add(&format!("providers.{name}.credential_env"), format!("${env}"));
            }
            if let Some(secs) = endpoint.timeout_secs {
                add(&format!("providers.{name}.timeout_secs"), secs.to_string());
            }
        }
        if let Some(stage) = self.providers.simulated.fail_stage {
            add("simulated_fail_stage", stage.to_string());
        }
        if let Some(channel) = &self.providers.publish.channel {
            add("providers.publish.channel", channel.clone());
        }

        config
    }
}
