//! Config command implementation
//!
//! Handles `contentflow config`: effective values with their sources.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use contentflow_config::Config;
use contentflow_utils::canonical::emit_jcs;
use contentflow_utils::exit_codes::ExitCode;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    value: String,
    source: String,
}

/// Execute the config command
pub fn execute_config_command(json: bool, config: &Config) -> Result<ExitCode> {
    let effective = config.effective_config();

    if json {
        let entries: BTreeMap<String, ConfigEntry> = effective
            .into_iter()
            .map(|(key, (value, source))| (key, ConfigEntry { value, source }))
            .collect();
        println!(
            "{}",
            emit_jcs(&entries).context("Failed to emit configuration JSON")?
        );
        return Ok(ExitCode::SUCCESS);
    }

    match &config.config_path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none found, using defaults)"),
    }
    let width = effective.keys().map(String::len).max().unwrap_or(0);
    for (key, (value, source)) in &effective {
        let shown = if value.is_empty() { "-" } else { value.as_str() };
        println!("  {key:<width$} = {shown}  ({source})");
    }
    Ok(ExitCode::SUCCESS)
}
