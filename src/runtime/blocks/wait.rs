//! Wait block: pauses the run, capped by the configured maximum

use crate::runtime::executor::{BlockContext, BlockExecutor, BlockOutcome};
use crate::workflow::types::{block_types, Block};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::invalid_config;

#[derive(Debug, Deserialize)]
struct WaitConfig {
    #[serde(default)]
    seconds: f64,
}

/// Expected config: { "seconds": 5 }
#[derive(Debug)]
pub struct WaitExecutor {
    max_wait: Duration,
}

impl WaitExecutor {
    pub fn new(max_wait: Duration) -> Self {
        Self { max_wait }
    }

    /// Requested delay clamped to `[0, max_wait]`
    pub fn effective_delay(&self, seconds: f64) -> Duration {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(seconds.min(self.max_wait.as_secs_f64()))
    }
}

#[async_trait]
impl BlockExecutor for WaitExecutor {
    fn name(&self) -> &'static str {
        "Wait"
    }

    fn can_execute(&self, block: &Block) -> bool {
        block.is_type(block_types::WAIT)
    }

    async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome {
        let config: WaitConfig = match block.parse_config() {
            Ok(config) => config,
            Err(e) => return invalid_config(block, e),
        };

        if ctx.skip_waits {
            return BlockOutcome::success(format!(
                "Wait {}: skipped {}s delay",
                block.name, config.seconds
            ));
        }

        let delay = self.effective_delay(config.seconds);
        tokio::time::sleep(delay).await;
        BlockOutcome::success(format!("Wait {}: waited {:?}", block.name, delay))
    }
}
