use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::redaction::redact_error_message;
use crate::types::{RunStatus, StageId};

/// Library-level error type with rich context and user-friendly reporting.
///
/// `ContentflowError` is the umbrella error returned at the edges of the
/// library (handle construction, CLI dispatch). Inner layers return their own
/// narrower error enums which convert into it with `?`.
///
/// # Error Categories
///
/// | Category | Description |
/// |----------|-------------|
/// | `Config` | Configuration file or CLI argument errors |
/// | `Store` | Run log store failures |
/// | `Provider` | External provider failures outside a run |
/// | `Orchestrator` | Run lifecycle errors (in progress, unknown run) |
///
/// # Exit Code Mapping
///
/// Use [`to_exit_code()`](Self::to_exit_code) to map errors to CLI exit codes.
/// Library code returns `ContentflowError` and does NOT call
/// `std::process::exit()`.
#[derive(Error, Debug)]
pub enum ContentflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run log store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Invalid run record: {0}")]
    Record(#[from] RecordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Storage,
    ProviderIntegration,
    RunLifecycle,
    FileSystem,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Storage => write!(f, "Storage"),
            Self::ProviderIntegration => write!(f, "Provider Integration"),
            Self::RunLifecycle => write!(f, "Run Lifecycle"),
            Self::FileSystem => write!(f, "File System"),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Credential environment variable '{env}' for {provider} is not set")]
    MissingCredential { provider: String, env: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::MissingRequired(key) => {
                format!("Required configuration '{key}' is missing")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => {
                format!("Configuration file not found: {path}")
            }
            Self::MissingCredential { provider, env } => {
                format!("No credential for the {provider} provider: ${env} is not set")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) | Self::InvalidValue { .. } => Some(
                "Configuration is loaded with precedence: CLI flags > config file > defaults."
                    .to_string(),
            ),
            Self::MissingCredential { .. } => Some(
                "Provider credentials are read from environment variables named in the \
                 [providers.*] credential_env settings."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .contentflow/config.toml".to_string(),
                "Run 'contentflow config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(key) => vec![format!("Set '{key}' in the config file")],
            Self::InvalidValue { key, .. } => vec![format!("Correct the value of '{key}'")],
            Self::NotFound { .. } => vec![
                "Pass an existing file with --config".to_string(),
                "Or remove --config to use discovery".to_string(),
            ],
            Self::MissingCredential { env, .. } => vec![
                format!("Export {env} before starting contentflow"),
                "Or run with --dry-run to use simulated providers".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

// ============================================================================
// Run records
// ============================================================================

/// Violations of the run record invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Run {id} is {status} and can no longer be modified")]
    Immutable { id: String, status: RunStatus },

    #[error("Invalid status transition {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    #[error("Stage {stage} cannot record a result before {missing}")]
    OutOfOrder { stage: StageId, missing: StageId },

    #[error("Stage {stage} already has a result")]
    DuplicateStageResult { stage: StageId },

    #[error("An error can only be recorded on a failed run")]
    ErrorWithoutFailure,

    #[error("Invalid run id: '{0}'")]
    InvalidRunId(String),

    #[error("Unknown stage: '{0}'")]
    UnknownStage(String),

    #[error("Unknown run status: '{0}'")]
    UnknownStatus(String),
}

// ============================================================================
// Run log store
// ============================================================================

/// Errors from the run log store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Run not found: {id}")]
    NotFound { id: String },

    #[error("Run id already exists: {id}")]
    DuplicateId { id: String },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize run record: {0}")]
    Serialization(String),

    #[error("Failed to acquire store lock at {path}: {reason}")]
    Lock { path: String, reason: String },
}

impl StoreError {
    pub fn io(path: impl fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    /// `NotFound` and `DuplicateId` indicate caller-visible lookup problems;
    /// everything else is a storage fault.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl UserFriendlyError for StoreError {
    fn user_message(&self) -> String {
        match self {
            Self::NotFound { id } => format!("No run with id '{id}' exists"),
            Self::DuplicateId { id } => format!("A run with id '{id}' already exists"),
            Self::Record(err) => format!("Run record update rejected: {err}"),
            Self::Io { path, source } => format!("Could not access {path}: {source}"),
            Self::Serialization(reason) => format!("Run record could not be encoded: {reason}"),
            Self::Lock { path, reason } => format!("Could not lock {path}: {reason}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } => {
                Some("Run records live under <data_dir>/runs/<id>.json.".to_string())
            }
            Self::Record(_) => Some(
                "Run records only move forward and are immutable once completed or failed."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotFound { .. } => vec!["Run 'contentflow list' to see known runs".to_string()],
            Self::Io { .. } | Self::Lock { .. } => vec![
                "Check permissions on the data directory".to_string(),
                "Use --data-dir to point at a writable location".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } => ErrorCategory::FileSystem,
            _ => ErrorCategory::Storage,
        }
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Failures of an external provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transport-level failure (HTTP connectivity, request construction)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Call exceeded its time budget
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    Outage(String),

    /// Credential invalid or expired (401, 403)
    #[error("Provider authentication error: {0}")]
    Auth(String),

    /// Usage quota exhausted (402)
    #[error("Provider quota exceeded: {0}")]
    Quota(String),

    /// Too many requests (429)
    #[error("Provider rate limit exceeded: {0}")]
    RateLimited(String),

    /// Response could not be used (malformed body, empty content)
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Provider could not be constructed from configuration
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl ProviderError {
    /// Short reason recorded on the run. Timeouts are always `"Timeout"`;
    /// other messages are redacted.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Timeout { .. } => "Timeout".to_string(),
            other => redact_error_message(&other.to_string()),
        }
    }
}

impl UserFriendlyError for ProviderError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("Provider transport error: {msg}"),
            Self::Timeout { duration } => format!("Provider call timed out after {duration:?}"),
            Self::Outage(msg) => format!("Provider service outage: {msg}"),
            Self::Auth(msg) => format!("Provider authentication failed: {msg}"),
            Self::Quota(msg) => format!("Provider quota exceeded: {msg}"),
            Self::RateLimited(msg) => format!("Provider rate limit exceeded: {msg}"),
            Self::InvalidResponse(msg) => format!("Provider returned unusable data: {msg}"),
            Self::Misconfiguration(msg) => format!("Provider configuration error: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Auth(_) => Some(
                "The configured credential was rejected by the provider.".to_string(),
            ),
            Self::Timeout { .. } => Some(
                "Each stage has a bounded timeout (defaults.stage_timeout_secs).".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Auth(_) => vec!["Refresh the credential in the configured env var".to_string()],
            Self::Timeout { .. } => vec!["Increase --stage-timeout".to_string()],
            Self::Misconfiguration(_) => {
                vec!["Run 'contentflow config' to inspect provider settings".to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Misconfiguration(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::ProviderIntegration,
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Errors that abort orchestration itself (as opposed to stage failures,
/// which are recorded on the run and never surface here).
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The store rejected or lost a write: a consistency violation.
    #[error("Run {id} aborted by store failure: {source}")]
    Store {
        id: String,
        #[source]
        source: StoreError,
    },

    /// Creating the pending record failed.
    #[error("Failed to create run: {0}")]
    Create(#[source] StoreError),

    #[error("Run {id} is already active on this orchestrator")]
    RunInProgress { id: String },

    #[error("Run {id} is not tracked by this orchestrator")]
    UnknownRun { id: String },

    #[error("Run task for {id} panicked or was aborted: {reason}")]
    Join { id: String, reason: String },
}

impl UserFriendlyError for OrchestratorError {
    fn user_message(&self) -> String {
        match self {
            Self::Store { id, source } => {
                format!("Run {id} stopped because its record could not be updated: {source}")
            }
            Self::Create(source) => format!("Could not create a new run: {source}"),
            Self::RunInProgress { id } => format!("Run {id} is still in progress"),
            Self::UnknownRun { id } => format!("Run {id} is not running in this process"),
            Self::Join { id, reason } => format!("Run {id} ended abnormally: {reason}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::RunInProgress { .. } => Some(
                "Only one run may be active at a time with active_run_policy = \"reject\"."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::RunInProgress { id } => vec![
                format!("Wait for run {id} to finish ('contentflow status {id}')"),
                "Or set defaults.active_run_policy = \"queue\"".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Store { .. } | Self::Create(_) => ErrorCategory::Storage,
            _ => ErrorCategory::RunLifecycle,
        }
    }
}

// ============================================================================
// Umbrella reporting
// ============================================================================

impl UserFriendlyError for ContentflowError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Store(err) => err.user_message(),
            Self::Provider(err) => err.user_message(),
            Self::Orchestrator(err) => err.user_message(),
            Self::Record(err) => err.to_string(),
            Self::Io(err) => format!("File system error: {err}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Store(err) => err.context(),
            Self::Provider(err) => err.context(),
            Self::Orchestrator(err) => err.context(),
            Self::Record(_) | Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Store(err) => err.suggestions(),
            Self::Provider(err) => err.suggestions(),
            Self::Orchestrator(err) => err.suggestions(),
            Self::Record(_) | Self::Io(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(err) => err.category(),
            Self::Store(err) => err.category(),
            Self::Provider(err) => err.category(),
            Self::Orchestrator(err) => err.category(),
            Self::Record(_) => ErrorCategory::Storage,
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl ContentflowError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// The output is passed through [`redact_error_message`] as a final safety
    /// net so provider messages never leak credentials.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        redact_error_message(&output)
    }

    /// Map this error to the appropriate CLI exit code.
    ///
    /// | Exit Code | Name | Description |
    /// |-----------|------|-------------|
    /// | 1 | INTERNAL | General failure |
    /// | 2 | CLI_ARGS | Invalid CLI arguments or configuration |
    /// | 4 | RUN_NOT_FOUND | Unknown run id |
    /// | 9 | RUN_IN_PROGRESS | Another run is active |
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Record(RecordError::InvalidRunId(_))
            | Self::Record(RecordError::UnknownStage(_))
            | Self::Record(RecordError::UnknownStatus(_)) => ExitCode::CLI_ARGS,
            Self::Store(StoreError::NotFound { .. }) => ExitCode::RUN_NOT_FOUND,
            Self::Orchestrator(OrchestratorError::RunInProgress { .. }) => {
                ExitCode::RUN_IN_PROGRESS
            }
            Self::Orchestrator(OrchestratorError::UnknownRun { .. }) => ExitCode::RUN_NOT_FOUND,
            Self::Provider(ProviderError::Misconfiguration(_)) => ExitCode::CLI_ARGS,
            _ => ExitCode::INTERNAL,
        }
    }
}
