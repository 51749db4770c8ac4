//! Configuration management for contentflow
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. Supports TOML configuration files with `[defaults]`
//! and `[providers]` sections.

mod builder;
mod cli_args;
mod credential;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use credential::Credential;
pub use model::*;
