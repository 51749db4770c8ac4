use std::path::PathBuf;

/// CLI overrides fed into [`Config::discover`](crate::Config::discover).
///
/// Every field is optional; `None` leaves the file or default value in place.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub stage_timeout_secs: Option<u64>,
    pub data_dir: Option<String>,
    pub provider_mode: Option<String>,
    pub active_run_policy: Option<String>,
    pub log_format: Option<String>,
}
