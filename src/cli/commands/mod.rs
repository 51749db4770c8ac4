//! CLI command implementations (facade).
//!
//! This module re-exports the command surface used by `run.rs` and CLI tests.
//! Implementations live in `commands/*`.

mod common;
mod config_cmd;
mod list;
mod run_cmd;
mod status;

pub use config_cmd::execute_config_command;
pub use list::execute_list_command;
pub use run_cmd::execute_run_command;
pub use status::execute_status_command;

#[cfg(test)]
pub use common::render_run_view;
