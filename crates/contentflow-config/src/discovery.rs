use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use contentflow_utils::error::ConfigError;
use contentflow_utils::paths::HOME_ENV;

use super::{CliArgs, Config, ConfigSource, Defaults, ProviderMode, ProvidersConfig};
use crate::model::{ActiveRunPolicy, DEFAULT_SIMULATED_DELAY_MS};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    providers: Option<ProvidersConfig>,
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir()
            .map_err(|e| ConfigError::InvalidFile(format!("cannot read current directory: {e}")))?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// This is the path-driven variant used by tests to avoid depending on
    /// the process working directory.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            tracing::debug!(path = %path.display(), "Loading config file");
            let file_config = Self::load_config_file(path)?;
            config.apply_file(file_config);
            config.config_path = Some(path.clone());
        }

        config.apply_cli(cli_args)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_file(&mut self, file_config: TomlConfig) {
        let src = ConfigSource::Config;
        let attribution = &mut self.source_attribution;

        if let Some(file_defaults) = file_config.defaults {
            let defaults = &mut self.defaults;
            if file_defaults.stage_timeout_secs.is_some() {
                defaults.stage_timeout_secs = file_defaults.stage_timeout_secs;
                attribution.insert("stage_timeout_secs".to_string(), src.clone());
            }
            if file_defaults.active_run_policy.is_some() {
                defaults.active_run_policy = file_defaults.active_run_policy;
                attribution.insert("active_run_policy".to_string(), src.clone());
            }
            if file_defaults.data_dir.is_some() {
                defaults.data_dir = file_defaults.data_dir;
                attribution.insert("data_dir".to_string(), src.clone());
            }
            if file_defaults.verbose.is_some() {
                defaults.verbose = file_defaults.verbose;
                attribution.insert("verbose".to_string(), src.clone());
            }
            if file_defaults.log_format.is_some() {
                defaults.log_format = file_defaults.log_format;
                attribution.insert("log_format".to_string(), src.clone());
            }
        }

        if let Some(file_providers) = file_config.providers {
            if file_providers.mode.is_some() {
                attribution.insert("provider_mode".to_string(), src.clone());
            }
            if file_providers.simulated.delay_ms.is_some() {
                attribution.insert("simulated_delay_ms".to_string(), src.clone());
            }
            if file_providers.simulated.fail_stage.is_some() {
                attribution.insert("simulated_fail_stage".to_string(), src.clone());
            }
            for (name, endpoint) in [
                ("text", &file_providers.text),
                ("metadata", &file_providers.metadata),
                ("audio", &file_providers.audio),
                ("video", &file_providers.video),
            ] {
                mark_endpoint(attribution, name, endpoint, &src);
            }
            mark_endpoint(
                attribution,
                "publish",
                &file_providers.publish.as_endpoint(),
                &src,
            );
            if file_providers.publish.channel.is_some() {
                attribution.insert("providers.publish.channel".to_string(), src.clone());
            }

            let mode = file_providers.mode.or(self.providers.mode);
            self.providers = ProvidersConfig {
                mode,
                ..file_providers
            };
        }
    }

    fn apply_cli(&mut self, cli_args: &CliArgs) -> Result<(), ConfigError> {
        let attribution = &mut self.source_attribution;

        if let Some(verbose) = cli_args.verbose {
            self.defaults.verbose = Some(verbose);
            attribution.insert("verbose".to_string(), ConfigSource::Cli);
        }
        if let Some(secs) = cli_args.stage_timeout_secs {
            self.defaults.stage_timeout_secs = Some(secs);
            attribution.insert("stage_timeout_secs".to_string(), ConfigSource::Cli);
        }
        if let Some(dir) = &cli_args.data_dir {
            self.defaults.data_dir = Some(dir.clone());
            attribution.insert("data_dir".to_string(), ConfigSource::Cli);
        }
        if let Some(mode) = &cli_args.provider_mode {
            self.providers.mode = Some(mode.parse::<ProviderMode>()?);
            attribution.insert("provider_mode".to_string(), ConfigSource::Cli);
        }
        if let Some(policy) = &cli_args.active_run_policy {
            self.defaults.active_run_policy = Some(policy.parse::<ActiveRunPolicy>()?);
            attribution.insert("active_run_policy".to_string(), ConfigSource::Cli);
        }
        if let Some(format) = &cli_args.log_format {
            self.defaults.log_format = Some(format.clone());
            attribution.insert("log_format".to_string(), ConfigSource::Cli);
        }
        Ok(())
    }

    /// Locate a config file without an explicit path.
    ///
    /// 1. `$CONTENTFLOW_HOME/config.toml` if the variable is set and the file exists
    /// 2. `.contentflow/config.toml` searching upward from `start_dir`, stopping
    ///    at repository root markers (.git, .hg, .svn) or the filesystem root
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        if let Ok(home) = std::env::var(HOME_ENV)
            && !home.is_empty()
        {
            let candidate = Path::new(&home).join("config.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        let mut current_dir = Some(start_dir);
        while let Some(dir) = current_dir {
            let config_path = dir.join(".contentflow").join("config.toml");
            if config_path.is_file() {
                return Some(config_path);
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }

            current_dir = dir.parent();
        }

        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidFile(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            ConfigError::InvalidFile(format!("failed to parse {}: {e}", path.display()))
        })
    }
}

fn mark_endpoint(
    attribution: &mut HashMap<String, ConfigSource>,
    name: &str,
    endpoint: &super::ProviderEndpoint,
    src: &ConfigSource,
) {
    if endpoint.endpoint.is_some() {
        attribution.insert(format!("providers.{name}.endpoint"), src.clone());
    }
    if endpoint.credential_env.is_some() {
        attribution.insert(format!("providers.{name}.credential_env"), src.clone());
    }
    if endpoint.timeout_secs.is_some() {
        attribution.insert(format!("providers.{name}.timeout_secs"), src.clone());
    }
}
