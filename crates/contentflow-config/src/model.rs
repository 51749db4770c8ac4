use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use contentflow_utils::error::ConfigError;
use contentflow_utils::logging::LogFormat;
use contentflow_utils::paths;
use contentflow_utils::types::StageId;

/// Default per-stage timeout in seconds
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 120;

/// Upper bound accepted for any timeout setting
pub const MAX_STAGE_TIMEOUT_SECS: u64 = 3600;

/// Default artificial latency of the simulated providers
pub const DEFAULT_SIMULATED_DELAY_MS: u64 = 200;

/// Upper bound accepted for `providers.simulated.delay_ms`
pub const MAX_SIMULATED_DELAY_MS: u64 = 60_000;

/// Where a configuration value came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value loaded from configuration file.
    Config,
    /// Value provided programmatically (e.g., `Config::builder()`).
    Programmatic,
    /// Built-in default value (lowest precedence).
    Default,
}

/// Behavior when a run is triggered while another run is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveRunPolicy {
    /// Refuse the trigger with `RunInProgress`
    #[default]
    Reject,
    /// Persist the new run as pending and start it when the active one ends
    Queue,
}

impl fmt::Display for ActiveRunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Queue => write!(f, "queue"),
        }
    }
}

impl FromStr for ActiveRunPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(Self::Reject),
            "queue" => Ok(Self::Queue),
            other => Err(ConfigError::InvalidValue {
                key: "active_run_policy".to_string(),
                value: format!("'{other}' (expected 'reject' or 'queue')"),
            }),
        }
    }
}

/// Which provider implementations the stages talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    /// JSON-over-HTTP providers at the configured endpoints
    #[default]
    Http,
    /// Built-in stand-ins with a fixed delay; no network access
    Simulated,
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

impl FromStr for ProviderMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "simulated" => Ok(Self::Simulated),
            other => Err(ConfigError::InvalidValue {
                key: "provider_mode".to_string(),
                value: format!("'{other}' (expected 'http' or 'simulated')"),
            }),
        }
    }
}

/// Parse a log format name as used in `[defaults] log_format`.
pub fn parse_log_format(s: &str) -> Result<LogFormat, ConfigError> {
    match s {
        "compact" => Ok(LogFormat::Compact),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::InvalidValue {
            key: "log_format".to_string(),
            value: format!("'{other}' (expected 'compact' or 'json')"),
        }),
    }
}

/// Configuration for contentflow.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > config file > built-in defaults.
///
/// # Discovery
///
/// Use [`Config::discover()`] for CLI-like behavior that:
/// - Uses an explicit `--config` path when given
/// - Otherwise reads `$CONTENTFLOW_HOME/config.toml` when it exists
/// - Otherwise searches for `.contentflow/config.toml` upward from the
///   current directory, stopping at a repository root
///
/// # Source Attribution
///
/// Each configuration value tracks its source (`cli`, `config`,
/// `programmatic`, or `default`) for `contentflow config`.
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// stage_timeout_secs = 120
/// active_run_policy = "reject"
/// log_format = "compact"
///
/// [providers]
/// mode = "http"
///
/// [providers.text]
/// endpoint = "https://text.example.com/generate"
/// credential_env = "CONTENTFLOW_TEXT_KEY"
///
/// [providers.metadata]
/// endpoint = "https://sheets.example.com/append"
///
/// [providers.publish]
/// endpoint = "https://publish.example.com/upload"
/// credential_env = "CONTENTFLOW_PUBLISH_TOKEN"
/// channel = "rhymes-daily"
/// timeout_secs = 600
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Global defaults.
    pub defaults: Defaults,
    /// Provider endpoints, credentials and mode.
    pub providers: ProvidersConfig,
    /// Config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    /// Source attribution for each setting (for `contentflow config`).
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// `[defaults]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub stage_timeout_secs: Option<u64>,
    pub active_run_policy: Option<ActiveRunPolicy>,
    /// Root for run records; defaults to the contentflow home.
    pub data_dir: Option<String>,
    pub verbose: Option<bool>,
    /// `compact` or `json`
    pub log_format: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            stage_timeout_secs: Some(DEFAULT_STAGE_TIMEOUT_SECS),
            active_run_policy: Some(ActiveRunPolicy::Reject),
            data_dir: None,
            verbose: Some(false),
            log_format: Some("compact".to_string()),
        }
    }
}

/// Settings shared by every HTTP provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProviderEndpoint {
    /// Absolute http(s) URL the provider is POSTed to.
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the credential. The value
    /// itself never appears in configuration.
    pub credential_env: Option<String>,
    /// Overrides `defaults.stage_timeout_secs` for this stage.
    pub timeout_secs: Option<u64>,
}

/// `[providers.publish]`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PublishEndpoint {
    pub endpoint: Option<String>,
    pub credential_env: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Destination channel passed to the publisher.
    pub channel: Option<String>,
}

impl PublishEndpoint {
    /// View of the fields shared with the other providers.
    #[must_use]
    pub fn as_endpoint(&self) -> ProviderEndpoint {
        ProviderEndpoint {
            endpoint: self.endpoint.clone(),
            credential_env: self.credential_env.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// `[providers.simulated]`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SimulatedConfig {
    pub delay_ms: Option<u64>,
    /// Stage whose simulated provider reports an outage.
    pub fail_stage: Option<StageId>,
}

/// `[providers]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    pub mode: Option<ProviderMode>,
    #[serde(default)]
    pub text: ProviderEndpoint,
    #[serde(default)]
    pub metadata: ProviderEndpoint,
    #[serde(default)]
    pub audio: ProviderEndpoint,
    #[serde(default)]
    pub video: ProviderEndpoint,
    #[serde(default)]
    pub publish: PublishEndpoint,
    #[serde(default)]
    pub simulated: SimulatedConfig,
}

impl ProvidersConfig {
    /// Endpoint settings for the provider behind a stage.
    #[must_use]
    pub fn endpoint_for(&self, stage: StageId) -> ProviderEndpoint {
        match stage {
            StageId::Text => self.text.clone(),
            StageId::Metadata => self.metadata.clone(),
            StageId::Audio => self.audio.clone(),
            StageId::Video => self.video.clone(),
            StageId::Publish => self.publish.as_endpoint(),
        }
    }
}

impl Config {
    /// Effective provider mode.
    #[must_use]
    pub fn provider_mode(&self) -> ProviderMode {
        self.providers.mode.unwrap_or_default()
    }

    /// Effective active-run policy.
    #[must_use]
    pub fn active_run_policy(&self) -> ActiveRunPolicy {
        self.defaults.active_run_policy.unwrap_or_default()
    }

    /// Effective log format. Values are checked by validation; anything else
    /// falls back to compact.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.defaults
            .log_format
            .as_deref()
            .and_then(|s| parse_log_format(s).ok())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    /// Directory holding `runs/`: `defaults.data_dir`, else the contentflow home.
    #[must_use]
    pub fn data_dir(&self) -> Utf8PathBuf {
        self.defaults
            .data_dir
            .as_ref()
            .map_or_else(paths::contentflow_home, Utf8PathBuf::from)
    }

    /// Time budget for one call of a stage.
    ///
    /// `[providers.<stage>] timeout_secs` wins over
    /// `[defaults] stage_timeout_secs`.
    #[must_use]
    pub fn stage_timeout(&self, stage: StageId) -> Duration {
        let secs = self
            .providers
            .endpoint_for(stage)
            .timeout_secs
            .or(self.defaults.stage_timeout_secs)
            .unwrap_or(DEFAULT_STAGE_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Artificial latency applied by each simulated provider call.
    #[must_use]
    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(
            self.providers
                .simulated
                .delay_ms
                .unwrap_or(DEFAULT_SIMULATED_DELAY_MS),
        )
    }
}

impl Default for Config {
    /// Built-in defaults only; no discovery.
    fn default() -> Self {
        let mut source_attribution = HashMap::new();
        for key in Self::DEFAULTED_KEYS {
            source_attribution.insert((*key).to_string(), ConfigSource::Default);
        }
        Self {
            defaults: Defaults::default(),
            providers: ProvidersConfig::default(),
            config_path: None,
            source_attribution,
        }
    }
}

impl Config {
    /// Keys that carry a built-in default value.
    pub(crate) const DEFAULTED_KEYS: &'static [&'static str] = &[
        "stage_timeout_secs",
        "active_run_policy",
        "verbose",
        "log_format",
        "provider_mode",
        "simulated_delay_ms",
        "data_dir",
    ];
}
