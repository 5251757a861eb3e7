//! Core workflow type definitions
//!
//! A workflow is an arena: blocks, connections and variables are flat lists that
//! reference each other by integer id. The runtime builds its traversal graph
//! from these lists; nothing here holds pointers between entities.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type WorkflowId = i64;
pub type BlockId = i64;

/// Block type names known to the catalog
pub mod block_types {
    pub const START: &str = "Start";
    pub const CALCULATION: &str = "Calculation";
    pub const IF: &str = "If";
    pub const SWITCH: &str = "Switch";
    pub const HTTP_REQUEST: &str = "HttpRequest";
    pub const PARSER: &str = "Parser";
    pub const LOOP: &str = "Loop";
    pub const WAIT: &str = "Wait";
    pub const TEXT_TRANSFORM: &str = "TextTransform";
    pub const TEXT_REPLACE: &str = "TextReplace";
    pub const END: &str = "End";

    /// Seed order for the catalog; ids are assigned in this order on a fresh database
    pub const ALL: &[&str] = &[
        START,
        CALCULATION,
        IF,
        SWITCH,
        HTTP_REQUEST,
        PARSER,
        LOOP,
        WAIT,
        TEXT_TRANSFORM,
        TEXT_REPLACE,
        END,
    ];
}

/// A workflow with its full graph loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    /// Revision currently marked active, if any
    pub active_revision_id: Option<i64>,
    pub blocks: Vec<Block>,
    pub connections: Vec<BlockConnection>,
    pub variables: Vec<WorkflowVariable>,
}

impl Workflow {
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

/// A single node in the workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub workflow_id: WorkflowId,
    pub name: String,
    pub block_type_id: i64,
    /// Catalog name of the type (e.g. "Calculation"), resolved at load time
    pub block_type: String,
    /// Type-specific configuration, serialized JSON
    pub config: Option<String>,
    /// Editor layout only; ignored by the runtime
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
}

impl Block {
    pub fn is_type(&self, type_name: &str) -> bool {
        self.block_type.eq_ignore_ascii_case(type_name)
    }

    /// Deserialize the configuration payload into an executor-specific struct
    pub fn parse_config<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self
            .config
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("block '{}' has no configuration", self.name))?;

        serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("invalid configuration for block '{}': {}", self.name, e))
    }
}

/// Which executor outcome a connection follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    Success,
    Error,
}

impl ConnectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Success => "Success",
            ConnectionKind::Error => "Error",
        }
    }

    pub fn for_outcome(is_error: bool) -> Self {
        if is_error {
            ConnectionKind::Error
        } else {
            ConnectionKind::Success
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(ConnectionKind::Success),
            "error" => Ok(ConnectionKind::Error),
            other => Err(anyhow::anyhow!("unknown connection kind: {}", other)),
        }
    }
}

/// Directed edge between two blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConnection {
    pub id: i64,
    pub source_block_id: BlockId,
    pub target_block_id: BlockId,
    pub kind: ConnectionKind,
    /// Only meaningful on edges leaving a Switch block
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowVariable {
    pub id: i64,
    pub workflow_id: WorkflowId,
    pub name: String,
    pub default_value: Option<String>,
}

/// Immutable versioned snapshot of a workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRevision {
    pub id: i64,
    pub workflow_id: WorkflowId,
    /// "v1", "v2", ...
    pub version: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub snapshot_json: String,
}

/// Append-only audit record of one evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: i64,
    pub workflow_id: WorkflowId,
    pub executed_at: DateTime<Utc>,
    pub inputs: BTreeMap<String, String>,
    pub result: BTreeMap<String, String>,
    /// Visited block names in execution order
    pub path: Vec<String>,
    /// One description per executed block
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    Interval,
    Once,
    Daily,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Interval => "Interval",
            TriggerType::Once => "Once",
            TriggerType::Daily => "Daily",
        }
    }
}

impl FromStr for TriggerType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "interval" => Ok(TriggerType::Interval),
            "once" => Ok(TriggerType::Once),
            "daily" => Ok(TriggerType::Daily),
            other => Err(anyhow::anyhow!("unknown trigger type: {}", other)),
        }
    }
}

/// Recurrence policy that triggers unattended evaluation of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSchedule {
    pub id: i64,
    pub workflow_id: WorkflowId,
    /// Informational pin; runs always use the live graph
    pub revision_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: TriggerType,
    pub start_at: DateTime<Utc>,
    pub interval_minutes: Option<i64>,
    pub is_active: bool,
    /// IANA identifier; unknown ids behave as UTC
    pub timezone: String,
    pub last_run_at: Option<DateTime<Utc>>,
    /// None means no further runs
    pub next_run_at: Option<DateTime<Utc>>,
}

impl WorkflowSchedule {
    /// Positive interval length, if one is configured
    pub fn interval(&self) -> Option<chrono::Duration> {
        self.interval_minutes
            .filter(|m| *m > 0)
            .and_then(chrono::Duration::try_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(config: Option<&str>) -> Block {
        Block {
            id: 1,
            workflow_id: 1,
            name: "calc".to_string(),
            block_type_id: 2,
            block_type: "calculation".to_string(),
            config: config.map(str::to_string),
            position_x: None,
            position_y: None,
        }
    }

    #[test]
    fn block_type_match_ignores_case() {
        assert!(block(None).is_type(block_types::CALCULATION));
        assert!(!block(None).is_type(block_types::IF));
    }

    #[test]
    fn missing_or_blank_config_is_an_error() {
        assert!(block(None).parse_config::<serde_json::Value>().is_err());
        assert!(block(Some("  ")).parse_config::<serde_json::Value>().is_err());
        assert!(block(Some("{not json")).parse_config::<serde_json::Value>().is_err());
        assert!(block(Some("{}")).parse_config::<serde_json::Value>().is_ok());
    }

    #[test]
    fn block_lookup_by_id() {
        let workflow = Workflow {
            id: 1,
            name: "wf".to_string(),
            active_revision_id: None,
            blocks: vec![block(None)],
            connections: vec![
                BlockConnection {
                    id: 9,
                    source_block_id: 1,
                    target_block_id: 3,
                    kind: ConnectionKind::Success,
                    label: None,
                },
                BlockConnection {
                    id: 4,
                    source_block_id: 1,
                    target_block_id: 2,
                    kind: ConnectionKind::Error,
                    label: None,
                },
            ],
            variables: vec![],
        };

        assert_eq!(workflow.block(1).map(|b| b.name.as_str()), Some("calc"));
        assert!(workflow.block(9).is_none());
    }

    #[test]
    fn non_positive_interval_is_treated_as_unset() {
        let mut schedule = WorkflowSchedule {
            id: 1,
            workflow_id: 1,
            revision_id: None,
            name: "s".to_string(),
            description: None,
            trigger_type: TriggerType::Interval,
            start_at: Utc::now(),
            interval_minutes: Some(0),
            is_active: true,
            timezone: "UTC".to_string(),
            last_run_at: None,
            next_run_at: None,
        };
        assert!(schedule.interval().is_none());
        schedule.interval_minutes = Some(15);
        assert_eq!(schedule.interval(), Some(chrono::Duration::minutes(15)));
        schedule.interval_minutes = Some(i64::MAX);
        assert!(schedule.interval().is_none());
    }
}
