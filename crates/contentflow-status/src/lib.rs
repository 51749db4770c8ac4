//! Status reporting for contentflow runs.
//!
//! Builds user-facing views over the run log store, with canonical JSON
//! emission using JCS (RFC 8785) for `--json` output.
//!
//! # Modules
//!
//! - [`reporter`] - Store-backed run lookups and listings
//! - [`view`] - Derived views: progress, stage labels, summaries

pub mod reporter;
pub mod view;

pub use reporter::{DEFAULT_LIST_LIMIT, RunStatusReporter};
pub use view::{Progress, RunListing, RunStatusView, RunSummary};
