//! Core data model shared across the pipeline.
//!
//! A [`RunRecord`] is the single source of truth for one pipeline invocation.
//! It is created `pending`, mutated stage-by-stage through [`RunPatch`]es, and
//! becomes immutable once it reaches `completed` or `failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RecordError;

/// Schema version written into every persisted run record.
pub const RUN_RECORD_SCHEMA_VERSION: &str = "1";

/// Maximum accepted length of a run identifier.
const MAX_RUN_ID_LEN: usize = 64;

static RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Stage identifiers
// ============================================================================

/// Stages of the content pipeline, in execution order.
///
/// The order is fixed: each stage may consume any artifact produced by the
/// stages before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageId {
    /// Generate the text content (a rhyme) from an optional topic seed.
    Text,
    /// Record run metadata in the external sink. Failures are tolerated.
    Metadata,
    /// Synthesize audio from the generated text.
    Audio,
    /// Synthesize video from the text and the audio artifact.
    Video,
    /// Publish the video and obtain a public URL.
    Publish,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [StageId; 5] = [
        StageId::Text,
        StageId::Metadata,
        StageId::Audio,
        StageId::Video,
        StageId::Publish,
    ];

    /// Canonical lowercase name used in records, logs and CLI output.
    ///
    /// ```rust
    /// use contentflow_utils::types::StageId;
    ///
    /// assert_eq!(StageId::Text.as_str(), "text");
    /// assert_eq!(StageId::Publish.as_str(), "publish");
    /// ```
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Metadata => "metadata",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Publish => "publish",
        }
    }

    /// Zero-based position in the pipeline.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Text => 0,
            Self::Metadata => 1,
            Self::Audio => 2,
            Self::Video => 3,
            Self::Publish => 4,
        }
    }

    /// Whether a failure of this stage aborts the run.
    ///
    /// Only the metadata stage is best-effort.
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        !matches!(self, Self::Metadata)
    }

    /// Human-readable progress label shown while the stage is in flight.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Text => "Generating text",
            Self::Metadata => "Logging metadata",
            Self::Audio => "Synthesizing audio",
            Self::Video => "Synthesizing video",
            Self::Publish => "Publishing",
        }
    }

    /// The stage that follows this one, if any.
    #[must_use]
    pub fn next(&self) -> Option<StageId> {
        Self::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "metadata" => Ok(Self::Metadata),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "publish" => Ok(Self::Publish),
            other => Err(RecordError::UnknownStage(other.to_string())),
        }
    }
}

// ============================================================================
// Run identifiers
// ============================================================================

/// Opaque, immutable identifier of a run.
///
/// Generated ids have the form `<unix-millis>-<8 hex>` so that lexical order
/// roughly follows creation order. Ids are restricted to ASCII alphanumerics,
/// `-` and `_` because the file store uses them as file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh id for a run created at `created_at`.
    #[must_use]
    pub fn generate(created_at: DateTime<Utc>) -> Self {
        let counter = RUN_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut hasher = blake3::Hasher::new();
        hasher.update(&created_at.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        hasher.update(&std::process::id().to_le_bytes());
        hasher.update(&counter.to_le_bytes());
        let digest = hasher.finalize().to_hex();

        Self(format!(
            "{:013}-{}",
            created_at.timestamp_millis().max(0),
            &digest.as_str()[..8]
        ))
    }

    /// Parse and validate an externally supplied id.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidRunId`] if the id is empty, too long, or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_RUN_ID_LEN
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(RecordError::InvalidRunId(raw.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// Run status
// ============================================================================

/// Lifecycle status of a run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `completed` or `failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `pending` or `running`.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    ///
    /// Re-asserting the current non-terminal status is allowed. A pending run
    /// may fail directly (cancelled before its first stage) but never
    /// complete without running.
    #[must_use]
    pub const fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Pending)
                | (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(RecordError::UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Failure descriptors
// ============================================================================

/// Failure taxonomy recorded on runs.
///
/// The first five kinds come from stage executors; `Cancelled` and `Internal`
/// are produced by the orchestrator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upstream call failed: network, 5xx, timeout.
    ProviderError,
    /// Credential invalid or expired.
    AuthError,
    QuotaExceeded,
    RateLimited,
    /// Provider returned unusable data.
    InvalidOutput,
    /// Run was cancelled between stages.
    Cancelled,
    /// Consistency violation inside the orchestrator or store.
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderError => "provider_error",
            Self::AuthError => "auth_error",
            Self::QuotaExceeded => "quota_exceeded",
            Self::RateLimited => "rate_limited",
            Self::InvalidOutput => "invalid_output",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure description stored on a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    /// Stage that failed, or `None` when the failure happened outside any stage.
    pub stage: Option<StageId>,
    pub kind: ErrorKind,
    pub reason: String,
}

impl RunError {
    #[must_use]
    pub fn new(stage: Option<StageId>, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn at_stage(stage: StageId, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self::new(Some(stage), kind, reason)
    }
}

// ============================================================================
// Stage results
// ============================================================================

/// Artifact references produced by each stage, `None` until produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResults {
    pub text: Option<String>,
    pub metadata: Option<String>,
    pub audio: Option<String>,
    pub video: Option<String>,
    pub publish: Option<String>,
}

impl StageResults {
    #[must_use]
    pub fn get(&self, stage: StageId) -> Option<&str> {
        match stage {
            StageId::Text => self.text.as_deref(),
            StageId::Metadata => self.metadata.as_deref(),
            StageId::Audio => self.audio.as_deref(),
            StageId::Video => self.video.as_deref(),
            StageId::Publish => self.publish.as_deref(),
        }
    }

    fn slot_mut(&mut self, stage: StageId) -> &mut Option<String> {
        match stage {
            StageId::Text => &mut self.text,
            StageId::Metadata => &mut self.metadata,
            StageId::Audio => &mut self.audio,
            StageId::Video => &mut self.video,
            StageId::Publish => &mut self.publish,
        }
    }

    /// Stages that have produced an artifact, in pipeline order.
    #[must_use]
    pub fn produced(&self) -> Vec<StageId> {
        StageId::ALL
            .into_iter()
            .filter(|stage| self.get(*stage).is_some())
            .collect()
    }

    /// Check that `stage` may receive a result now.
    ///
    /// Every earlier critical stage must already hold an artifact; the
    /// metadata slot may stay empty because its failure is tolerated.
    ///
    /// # Errors
    ///
    /// [`RecordError::OutOfOrder`] naming the first missing prerequisite, or
    /// [`RecordError::DuplicateStageResult`] if the slot is already filled.
    pub fn check_insert(&self, stage: StageId) -> Result<(), RecordError> {
        if self.get(stage).is_some() {
            return Err(RecordError::DuplicateStageResult { stage });
        }

        if let Some(missing) = StageId::ALL[..stage.index()]
            .iter()
            .find(|earlier| earlier.is_critical() && self.get(**earlier).is_none())
        {
            return Err(RecordError::OutOfOrder {
                stage,
                missing: *missing,
            });
        }

        Ok(())
    }
}

// ============================================================================
// Run record
// ============================================================================

fn default_schema_version() -> String {
    RUN_RECORD_SCHEMA_VERSION.to_string()
}

/// One pipeline invocation, as persisted in the run log store.
///
/// Serialized with camelCase field names. Unknown fields are ignored when
/// reading, so newer writers stay readable by older readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub id: RunId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Stage in progress or last attempted. Cleared on completion, kept on
    /// failure for diagnostics.
    pub current_stage: Option<StageId>,
    #[serde(default)]
    pub seed: Option<String>,
    pub stage_results: StageResults,
    /// Tolerated failures of non-critical stages.
    #[serde(default)]
    pub non_fatal_errors: Vec<RunError>,
    /// Present only when `status` is `failed`.
    pub error: Option<RunError>,
}

impl RunRecord {
    /// Create a fresh pending record with a generated id.
    #[must_use]
    pub fn new_pending(seed: Option<String>) -> Self {
        let now = Utc::now();
        Self::with_id(RunId::generate(now), now, seed)
    }

    /// Create a pending record with an explicit id and creation time.
    #[must_use]
    pub fn with_id(id: RunId, created_at: DateTime<Utc>, seed: Option<String>) -> Self {
        Self {
            schema_version: default_schema_version(),
            id,
            created_at,
            updated_at: created_at,
            status: RunStatus::Pending,
            current_stage: None,
            seed,
            stage_results: StageResults::default(),
            non_fatal_errors: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Ordering key for listings: most recent first.
    #[must_use]
    pub fn recency_key(&self) -> (DateTime<Utc>, &RunId) {
        (self.created_at, &self.id)
    }
}

// ============================================================================
// Patches
// ============================================================================

/// Partial update of a [`RunRecord`].
///
/// A patch is validated in full before any field is written, so applying it
/// is all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPatch {
    pub status: Option<RunStatus>,
    /// `Some(None)` clears the current stage.
    pub current_stage: Option<Option<StageId>>,
    pub stage_result: Option<(StageId, String)>,
    pub non_fatal_error: Option<RunError>,
    pub error: Option<RunError>,
}

impl RunPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn current_stage(mut self, stage: StageId) -> Self {
        self.current_stage = Some(Some(stage));
        self
    }

    #[must_use]
    pub fn clear_current_stage(mut self) -> Self {
        self.current_stage = Some(None);
        self
    }

    #[must_use]
    pub fn stage_result(mut self, stage: StageId, artifact: impl Into<String>) -> Self {
        self.stage_result = Some((stage, artifact.into()));
        self
    }

    #[must_use]
    pub fn non_fatal_error(mut self, error: RunError) -> Self {
        self.non_fatal_error = Some(error);
        self
    }

    #[must_use]
    pub fn error(mut self, error: RunError) -> Self {
        self.error = Some(error);
        self
    }

    /// Validate this patch against `record` and apply it.
    ///
    /// # Errors
    ///
    /// - [`RecordError::Immutable`] if the record is already terminal
    /// - [`RecordError::InvalidTransition`] for a backward status change
    /// - [`RecordError::ErrorWithoutFailure`] if an error is set on a run that
    ///   is not ending as `failed`
    /// - [`RecordError::OutOfOrder`] / [`RecordError::DuplicateStageResult`]
    ///   for stage results that break pipeline order
    ///
    /// On error the record is left untouched.
    pub fn apply(&self, record: &mut RunRecord, now: DateTime<Utc>) -> Result<(), RecordError> {
        if record.status.is_terminal() {
            return Err(RecordError::Immutable {
                id: record.id.to_string(),
                status: record.status,
            });
        }

        let next_status = self.status.unwrap_or(record.status);
        if !record.status.can_transition_to(next_status) {
            return Err(RecordError::InvalidTransition {
                from: record.status,
                to: next_status,
            });
        }

        if self.error.is_some() && next_status != RunStatus::Failed {
            return Err(RecordError::ErrorWithoutFailure);
        }

        if let Some((stage, _)) = &self.stage_result {
            record.stage_results.check_insert(*stage)?;
        }

        record.status = next_status;
        if let Some(current) = self.current_stage {
            record.current_stage = current;
        }
        if let Some((stage, artifact)) = &self.stage_result {
            *record.stage_results.slot_mut(*stage) = Some(artifact.clone());
        }
        if let Some(non_fatal) = &self.non_fatal_error {
            record.non_fatal_errors.push(non_fatal.clone());
        }
        if let Some(error) = &self.error {
            record.error = Some(error.clone());
        }
        record.updated_at = now;

        Ok(())
    }
}
