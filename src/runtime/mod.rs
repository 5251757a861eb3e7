/// Runtime Evaluation Layer
///
/// This module provides block execution, graph traversal and scheduling:
/// - Strategy-based block executors
/// - Petgraph-based breadth-first evaluation engine
/// - Pure next-run computation and the background schedule poller

// Built-in executors, one per block family
pub mod blocks;

// Graph traversal producing execution records
pub mod engine;

// Executor trait, outcome type and ordered registry
pub mod executor;

// Schedule CRUD, next-run computation and polling loop
pub mod scheduler;

// Case-insensitive variable store for a single run
pub mod variables;

// Re-export main types
pub use engine::ExecutionEngine;
pub use executor::{BlockContext, BlockExecutor, BlockExecutorRegistry, BlockOutcome};
pub use scheduler::{compute_next_run, ScheduleRequest, ScheduleService};
pub use variables::VariableStore;
