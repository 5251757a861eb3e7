//! Built-in block executors, one module per block family

pub mod calculation;
pub mod condition;
pub mod http_request;
pub mod parser;
pub mod switch;
pub mod text;
pub mod wait;

pub use calculation::CalculationExecutor;
pub use condition::ConditionExecutor;
pub use http_request::HttpRequestExecutor;
pub use parser::ParserExecutor;
pub use switch::SwitchExecutor;
pub use text::{TextReplaceExecutor, TextTransformExecutor};
pub use wait::WaitExecutor;

use crate::runtime::executor::BlockOutcome;
use crate::workflow::types::Block;

/// Lenient numeric parse: anything unparsable or non-finite is 0
pub(crate) fn parse_number(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Integral values print without a fractional part
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub(crate) fn invalid_config(block: &Block, error: anyhow::Error) -> BlockOutcome {
    tracing::warn!("⚠️ Block '{}' ({}) has invalid config: {}", block.name, block.block_type, error);
    BlockOutcome::error(format!("{} {}: invalid config: {}", block.block_type, block.name, error))
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
pub(crate) fn test_block(block_type: &str, config: &str) -> Block {
    Block {
        id: 1,
        workflow_id: 1,
        name: "step".to_string(),
        block_type_id: 0,
        block_type: block_type.to_string(),
        config: Some(config.to_string()),
        position_x: None,
        position_y: None,
    }
}
