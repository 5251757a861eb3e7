/// Workflow Management Layer
///
/// This module handles the persistent side of workflows:
/// - Type definitions (Workflow, Block, BlockConnection, schedules, revisions)
/// - SQLite persistence with sqlx
/// - Lock-free block-type catalog using ArcSwap
/// - Snapshot and restore of versioned revisions

// Core workflow type definitions
pub mod types;

// SQLite persistence layer for graphs, revisions, executions and schedules
pub mod storage;

// Hot-reload block-type catalog
pub mod registry;

// Versioned snapshots with transactional restore
pub mod revision;

// Re-export commonly used types
pub use registry::BlockTypeCatalog;
pub use revision::{RevisionManager, WorkflowSnapshot};
pub use storage::{NewBlock, WorkflowStorage};
pub use types::{
    Block, BlockConnection, ConnectionKind, TriggerType, Workflow, WorkflowExecution,
    WorkflowRevision, WorkflowSchedule, WorkflowVariable,
};
