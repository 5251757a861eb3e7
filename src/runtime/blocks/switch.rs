//! Switch block: resolves an expression; the engine picks the branch
//!
//! Branch selection compares the resolved value against the labels of the
//! block's outgoing connections. Labels may carry an ordinal prefix added by the
//! editor ("#3 · gold") and may themselves be `$variable` references.

use crate::runtime::executor::{BlockContext, BlockExecutor, BlockOutcome};
use crate::runtime::variables::VariableStore;
use crate::workflow::types::{block_types, Block, BlockConnection};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use super::invalid_config;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchConfig {
    #[serde(default)]
    expression: String,
}

/// Expected config: { "expression": "$tier" }
#[derive(Debug, Default)]
pub struct SwitchExecutor;

/// Resolve the configured expression of a Switch block
pub fn resolve_expression(block: &Block, variables: &VariableStore) -> Result<String> {
    let config: SwitchConfig = block.parse_config()?;
    Ok(variables.resolve(config.expression.trim()))
}

fn ordinal_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| {
        Regex::new(r"^\s*#\d+\s*[·:.)\-]?\s*").expect("ordinal prefix pattern is valid")
    })
}

/// Strip an editor ordinal marker and surrounding whitespace from a label
pub fn normalize_label(label: &str) -> &str {
    match ordinal_prefix().find(label) {
        Some(m) => label[m.end()..].trim(),
        None => label.trim(),
    }
}

/// Choose the branch for `value`: the first edge whose label matches
/// (case-insensitively, after normalization and `$variable` resolution), else
/// the first unlabeled edge, else none.
pub fn select_branch<'a>(
    value: &str,
    edges: &[&'a BlockConnection],
    variables: &VariableStore,
) -> Option<&'a BlockConnection> {
    let value = value.trim();

    let labeled = edges.iter().find(|edge| {
        let label = normalize_label(edge.label.as_deref().unwrap_or_default());
        if label.is_empty() {
            return false;
        }
        let candidate = variables.resolve(label);
        candidate.trim().to_lowercase() == value.to_lowercase()
    });

    labeled
        .or_else(|| {
            edges
                .iter()
                .find(|edge| normalize_label(edge.label.as_deref().unwrap_or_default()).is_empty())
        })
        .copied()
}

#[async_trait]
impl BlockExecutor for SwitchExecutor {
    fn name(&self) -> &'static str {
        "Switch"
    }

    fn can_execute(&self, block: &Block) -> bool {
        block.is_type(block_types::SWITCH)
    }

    async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome {
        match resolve_expression(block, ctx.variables) {
            Ok(value) => BlockOutcome::success(format!("Switch {}: value = '{}'", block.name, value)),
            Err(e) => invalid_config(block, e),
        }
    }
}
