//! Typed failures for explicit operations
//!
//! Block-level problems never become errors (they reroute traversal instead).
//! Only identifier lookups on explicit operations fail hard, and they do so with
//! one of these variants wrapped in `anyhow::Error` so callers can downcast.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(i64),

    #[error("revision {revision_id} not found for workflow {workflow_id}")]
    RevisionNotFound { workflow_id: i64, revision_id: i64 },

    #[error("schedule not found: {0}")]
    ScheduleNotFound(i64),

    #[error("invalid revision snapshot: {0}")]
    InvalidSnapshot(String),
}

impl WorkflowError {
    /// True for any of the "not found" variants
    pub fn is_not_found(&self) -> bool {
        !matches!(self, WorkflowError::InvalidSnapshot(_))
    }
}
