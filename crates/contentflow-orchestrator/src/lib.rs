//! Pipeline orchestrator for content runs
//!
//! Wires the stage pipeline to the run log store: a run is created as
//! `pending`, moved to `running`, advanced one stage at a time with every
//! transition persisted, and finished as `completed` or `failed`.

mod handle;
mod pipeline;

pub use handle::OrchestratorHandle;
pub use pipeline::{CANCELLED_REASON, CancelFlag, PipelineOrchestrator};

pub use contentflow_config::ActiveRunPolicy;
pub use contentflow_utils::error::OrchestratorError;
