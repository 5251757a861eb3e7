//! Configuration management for the Blockway engine
//!
//! Handles database location, scheduler cadence and executor limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Background schedule poller configuration
    pub scheduler: SchedulerConfig,
    /// Block executor limits
    pub executors: ExecutorConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL (e.g. "sqlite://data/blockway.db")
    pub url: String,
}

/// Schedule poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between two poll ticks
    pub poll_interval_secs: u64,
}

/// Limits applied by block executors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Timeout for a single outbound HttpRequest block call
    pub http_timeout_secs: u64,
    /// Upper bound on how long a Wait block may sleep
    pub max_wait_secs: u64,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl ExecutorConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: env_or("BLOCKWAY_HTTP_TIMEOUT_SECS", 30),
            max_wait_secs: env_or("BLOCKWAY_MAX_WAIT_SECS", 300),
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: std::env::var("BLOCKWAY_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/blockway.db".to_string()),
            },
            scheduler: SchedulerConfig {
                poll_interval_secs: env_or("BLOCKWAY_POLL_INTERVAL_SECS", 30),
            },
            executors: ExecutorConfig::default(),
        }
    }
}

fn env_or(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
