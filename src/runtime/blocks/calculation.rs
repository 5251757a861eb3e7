//! Calculation block: binary arithmetic or concatenation over two variables

use crate::runtime::executor::{BlockContext, BlockExecutor, BlockOutcome};
use crate::workflow::types::{block_types, Block};
use async_trait::async_trait;
use serde::Deserialize;

use super::{format_number, invalid_config, parse_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalculationConfig {
    first_variable: String,
    #[serde(default)]
    second_variable: String,
    operation: Operation,
    #[serde(default)]
    result_variable: Option<String>,
}

/// Expected config: { "firstVariable": "a", "secondVariable": "b", "operation": "Add", "resultVariable": "c" }
#[derive(Debug, Default)]
pub struct CalculationExecutor;

/// Apply `operation` to the two raw values. Unparsable numbers count as 0 and
/// division by zero leaves the dividend unchanged.
pub fn calculate(operation: Operation, first: &str, second: &str) -> String {
    let a = parse_number(first);
    let b = parse_number(second);
    match operation {
        Operation::Concat => format!("{}{}", first, second),
        Operation::Add => format_number(a + b),
        Operation::Subtract => format_number(a - b),
        Operation::Multiply => format_number(a * b),
        Operation::Divide if b == 0.0 => format_number(a),
        Operation::Divide => format_number(a / b),
    }
}

#[async_trait]
impl BlockExecutor for CalculationExecutor {
    fn name(&self) -> &'static str {
        "Calculation"
    }

    fn can_execute(&self, block: &Block) -> bool {
        block.is_type(block_types::CALCULATION)
    }

    async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome {
        let config: CalculationConfig = match block.parse_config() {
            Ok(config) => config,
            Err(e) => return invalid_config(block, e),
        };

        let first = ctx.variables.get_or_empty(&config.first_variable);
        let second = ctx.variables.get_or_empty(&config.second_variable);
        let result = calculate(config.operation, &first, &second);

        let target = config
            .result_variable
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| config.first_variable.clone());
        ctx.variables.set(&target, result.clone());

        BlockOutcome::success(format!(
            "Calculation {}: {} = {} {:?} {} = {}",
            block.name, target, first, config.operation, second, result
        ))
    }
}
