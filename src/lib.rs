/// Blockway: block-graph workflow evaluation engine
///
/// This library provides graph evaluation over typed blocks, versioned
/// revisions with transactional restore, and time-based schedules driven by a
/// background poller.

// Core configuration and setup
pub mod config;

// Typed failures for explicit operations
pub mod error;

// Workflow management layer - definitions, storage, catalog and revisions
pub mod workflow;

// Runtime layer - block executors, evaluation engine and scheduler
pub mod runtime;

// Service wiring and process lifecycle
pub mod service;

// Re-export commonly used types for external consumers
pub use error::WorkflowError;
pub use runtime::{ExecutionEngine, ScheduleService};
pub use service::{create_runtime, start_service, Runtime};
pub use workflow::{RevisionManager, Workflow, WorkflowExecution, WorkflowStorage};
