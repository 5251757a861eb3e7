//! Block executor strategy layer
//!
//! Every block type is handled by a stateless strategy implementing
//! [`BlockExecutor`]. The registry tries executors in registration order and runs
//! the first whose `can_execute` accepts the block; [`DefaultExecutor`] accepts
//! anything and is always consulted last, so every block yields an outcome.

use crate::{
    config::ExecutorConfig,
    runtime::{
        blocks::{
            CalculationExecutor, ConditionExecutor, HttpRequestExecutor, ParserExecutor,
            SwitchExecutor, TextReplaceExecutor, TextTransformExecutor, WaitExecutor,
        },
        variables::VariableStore,
    },
    workflow::types::Block,
};
use anyhow::Result;
use async_trait::async_trait;

/// Result of executing a single block
///
/// `is_error` selects the Error edges for routing; it never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Human-readable step description for the action log
    pub description: String,
    pub is_error: bool,
}

impl BlockOutcome {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            is_error: false,
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            is_error: true,
        }
    }
}

/// Mutable state an executor may touch during one evaluation
pub struct BlockContext<'a> {
    pub variables: &'a mut VariableStore,
    /// Unattended runs suppress delay semantics
    pub skip_waits: bool,
}

/// Strategy for one block type
#[async_trait]
pub trait BlockExecutor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn can_execute(&self, block: &Block) -> bool;

    async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome;
}

/// Catch-all executor for blocks without type-specific behaviour
/// (Start, End, Loop and anything unknown)
#[derive(Debug, Default)]
pub struct DefaultExecutor;

#[async_trait]
impl BlockExecutor for DefaultExecutor {
    fn name(&self) -> &'static str {
        "Default"
    }

    fn can_execute(&self, _block: &Block) -> bool {
        true
    }

    async fn execute(&self, block: &Block, _ctx: &mut BlockContext<'_>) -> BlockOutcome {
        BlockOutcome::success(format!("Executed block {}", block.name))
    }
}

/// Ordered list of executors; first match wins
pub struct BlockExecutorRegistry {
    executors: Vec<Box<dyn BlockExecutor>>,
    fallback: DefaultExecutor,
}

impl std::fmt::Debug for BlockExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.executors.iter().map(|e| e.name()).collect();
        f.debug_struct("BlockExecutorRegistry")
            .field("executors", &names)
            .finish()
    }
}

impl Default for BlockExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockExecutorRegistry {
    /// Empty registry; every block falls through to the default executor
    pub fn new() -> Self {
        Self {
            executors: Vec::new(),
            fallback: DefaultExecutor,
        }
    }

    /// Registry with every built-in executor in its canonical order
    pub fn with_builtin(config: &ExecutorConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(CalculationExecutor);
        registry.register(ConditionExecutor);
        registry.register(SwitchExecutor);
        registry.register(HttpRequestExecutor::new(config.http_timeout())?);
        registry.register(ParserExecutor);
        registry.register(TextTransformExecutor);
        registry.register(TextReplaceExecutor);
        registry.register(WaitExecutor::new(config.max_wait()));
        registry.register(DefaultExecutor);
        Ok(registry)
    }

    /// Append an executor; it is consulted after all previously registered ones
    pub fn register(&mut self, executor: impl BlockExecutor + 'static) {
        self.executors.push(Box::new(executor));
    }

    /// The executor that will handle `block`
    pub fn select(&self, block: &Block) -> &dyn BlockExecutor {
        self.executors
            .iter()
            .find(|e| e.can_execute(block))
            .map(|e| e.as_ref())
            .unwrap_or(&self.fallback)
    }

    /// Run the first applicable executor for `block`
    pub async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome {
        let executor = self.select(block);
        tracing::debug!("🔧 Block '{}' ({}) handled by {} executor",
            block.name, block.block_type, executor.name());

        let outcome = executor.execute(block, ctx).await;
        if outcome.is_error {
            tracing::debug!("↪️ Block '{}' signalled error: {}", block.name, outcome.description);
        }
        outcome
    }
}
