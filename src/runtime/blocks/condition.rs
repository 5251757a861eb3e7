//! If block: compares two operands, routes Success when true and Error when false

use crate::runtime::executor::{BlockContext, BlockExecutor, BlockOutcome};
use crate::workflow::types::{block_types, Block};
use async_trait::async_trait;
use serde::Deserialize;
use std::cmp::Ordering;

use super::{invalid_config, parse_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DataType {
    #[default]
    Number,
    String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionConfig {
    #[serde(default)]
    left: String,
    operator: Comparison,
    #[serde(default)]
    right: String,
    #[serde(default)]
    data_type: DataType,
}

/// Expected config: { "left": "$score", "operator": "GreaterOrEqual", "right": "50", "dataType": "Number" }
#[derive(Debug, Default)]
pub struct ConditionExecutor;

/// Evaluate `left <operator> right` under the given data type.
/// Numbers that fail to parse compare as 0; strings compare ordinally.
pub fn compare(left: &str, operator: Comparison, right: &str, data_type: DataType) -> bool {
    let ordering = match data_type {
        DataType::Number => parse_number(left)
            .partial_cmp(&parse_number(right))
            .unwrap_or(Ordering::Equal),
        DataType::String => left.cmp(right),
    };

    match operator {
        Comparison::Equal => ordering == Ordering::Equal,
        Comparison::NotEqual => ordering != Ordering::Equal,
        Comparison::GreaterThan => ordering == Ordering::Greater,
        Comparison::LessThan => ordering == Ordering::Less,
        Comparison::GreaterOrEqual => ordering != Ordering::Less,
        Comparison::LessOrEqual => ordering != Ordering::Greater,
    }
}

#[async_trait]
impl BlockExecutor for ConditionExecutor {
    fn name(&self) -> &'static str {
        "Condition"
    }

    fn can_execute(&self, block: &Block) -> bool {
        block.is_type(block_types::IF)
    }

    async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome {
        let config: ConditionConfig = match block.parse_config() {
            Ok(config) => config,
            Err(e) => return invalid_config(block, e),
        };

        let left = ctx.variables.resolve(&config.left);
        let right = ctx.variables.resolve(&config.right);
        let holds = compare(&left, config.operator, &right, config.data_type);

        let description = format!(
            "Condition {}: '{}' {:?} '{}' ({:?}) is {}",
            block.name, left, config.operator, right, config.data_type, holds
        );

        if holds {
            BlockOutcome::success(description)
        } else {
            BlockOutcome::error(description)
        }
    }
}
