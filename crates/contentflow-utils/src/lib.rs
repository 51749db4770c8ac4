//! Foundation types and utilities shared by every contentflow crate.
//!
//! - `types`: run records, stage identifiers, patches and error descriptors
//! - `error`: error taxonomy with user-facing reporting
//! - `exit_codes`: CLI exit code table
//! - `atomic_write`: tempfile + fsync + rename persistence
//! - `canonical`: JCS (RFC 8785) JSON emission
//! - `logging`: tracing initialization and structured stage logging
//! - `paths`: home directory resolution
//! - `redaction`: scrubbing of secrets from provider messages

pub mod atomic_write;
pub mod canonical;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod paths;
pub mod redaction;
pub mod types;
