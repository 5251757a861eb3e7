/// Versioned snapshots of a workflow graph
///
/// A revision freezes blocks, connections and variables as JSON. Restoring a
/// revision replaces the live graph with the snapshot and marks it active. At
/// most one revision per workflow is active; both operations run inside a
/// single transaction.

use crate::{
    error::WorkflowError,
    workflow::{
        registry::BlockTypeCatalog,
        storage::{NewBlock, WorkflowStorage},
        types::{BlockId, ConnectionKind, Workflow, WorkflowId, WorkflowRevision},
    },
};
use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

/// Serialized form of a workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<BlockSnapshot>,
    #[serde(default)]
    pub connections: Vec<ConnectionSnapshot>,
    #[serde(default)]
    pub variables: Vec<VariableSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSnapshot {
    /// Block id at capture time; connections refer to it
    #[serde(default)]
    pub id: Option<BlockId>,
    pub name: String,
    pub system_block_type: String,
    #[serde(default)]
    pub json_config: Option<String>,
    #[serde(default)]
    pub position_x: Option<f64>,
    #[serde(default)]
    pub position_y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub source_block_id: BlockId,
    pub target_block_id: BlockId,
    pub connection_type: ConnectionKind,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSnapshot {
    pub name: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl WorkflowSnapshot {
    pub fn capture(workflow: &Workflow) -> Self {
        Self {
            name: workflow.name.clone(),
            blocks: workflow
                .blocks
                .iter()
                .map(|block| BlockSnapshot {
                    id: Some(block.id),
                    name: block.name.clone(),
                    system_block_type: block.block_type.clone(),
                    json_config: block.config.clone(),
                    position_x: block.position_x,
                    position_y: block.position_y,
                })
                .collect(),
            connections: workflow
                .connections
                .iter()
                .map(|connection| ConnectionSnapshot {
                    source_block_id: connection.source_block_id,
                    target_block_id: connection.target_block_id,
                    connection_type: connection.kind,
                    label: connection.label.clone(),
                })
                .collect(),
            variables: workflow
                .variables
                .iter()
                .map(|variable| VariableSnapshot {
                    name: variable.name.clone(),
                    default_value: variable.default_value.clone(),
                })
                .collect(),
        }
    }
}

/// Parse a stored snapshot document
pub fn parse_snapshot(json: &str) -> Result<WorkflowSnapshot> {
    serde_json::from_str(json).map_err(|e| WorkflowError::InvalidSnapshot(e.to_string()).into())
}

/// Next "vN" label: one past the highest numeric suffix in use
fn next_version(existing: &[String]) -> String {
    let highest = existing
        .iter()
        .filter_map(|v| v.trim().strip_prefix(['v', 'V']))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("v{}", highest + 1)
}

/// Creates, lists and restores workflow revisions
#[derive(Debug, Clone)]
pub struct RevisionManager {
    storage: WorkflowStorage,
    catalog: Arc<BlockTypeCatalog>,
}

impl RevisionManager {
    pub fn new(storage: WorkflowStorage, catalog: Arc<BlockTypeCatalog>) -> Self {
        Self { storage, catalog }
    }

    /// Snapshot the live graph as a new active revision
    pub async fn create_snapshot(&self, workflow_id: WorkflowId, label: Option<&str>) -> Result<WorkflowRevision> {
        let workflow = self
            .storage
            .load_workflow(workflow_id)
            .await?
            .ok_or(WorkflowError::WorkflowNotFound(workflow_id))?;

        let snapshot_json = serde_json::to_string(&WorkflowSnapshot::capture(&workflow))?;
        let label = label.map(str::trim).filter(|l| !l.is_empty());

        let mut tx = self.storage.begin().await?;
        let versions = WorkflowStorage::revision_versions(&mut tx, workflow_id).await?;
        let version = next_version(&versions);
        let revision_id = WorkflowStorage::insert_revision(
            &mut tx,
            workflow_id,
            &version,
            label,
            &Utc::now(),
            &snapshot_json,
        )
        .await?;
        WorkflowStorage::activate_revision(&mut tx, workflow_id, revision_id, None).await?;
        tx.commit().await?;

        tracing::info!("📸 Created revision {} ({}) of workflow {} with {} blocks",
            revision_id, version, workflow_id, workflow.blocks.len());

        self.get_revision(workflow_id, revision_id).await
    }

    /// Revisions of a workflow, newest first
    pub async fn list_revisions(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowRevision>> {
        self.storage.list_revisions(workflow_id).await
    }

    /// A revision, provided it belongs to `workflow_id`
    pub async fn get_revision(&self, workflow_id: WorkflowId, revision_id: i64) -> Result<WorkflowRevision> {
        match self.storage.get_revision(revision_id).await? {
            Some(revision) if revision.workflow_id == workflow_id => Ok(revision),
            _ => Err(WorkflowError::RevisionNotFound { workflow_id, revision_id }.into()),
        }
    }

    /// Replace the live graph with a revision's snapshot and activate it
    ///
    /// Blocks whose type is not in the catalog are dropped together with their
    /// connections.
    pub async fn restore(&self, workflow_id: WorkflowId, revision_id: i64) -> Result<bool> {
        let revision = self.get_revision(workflow_id, revision_id).await?;
        if !self.storage.workflow_exists(workflow_id).await? {
            return Err(WorkflowError::WorkflowNotFound(workflow_id).into());
        }
        let snapshot = parse_snapshot(&revision.snapshot_json)?;

        let mut tx = self.storage.begin().await?;
        WorkflowStorage::delete_graph(&mut tx, workflow_id).await?;

        let mut id_map: HashMap<BlockId, BlockId> = HashMap::with_capacity(snapshot.blocks.len());
        for (position, block) in snapshot.blocks.iter().enumerate() {
            let Some(block_type_id) = self.catalog.id_of(&block.system_block_type) else {
                tracing::warn!("⚠️ Skipping block '{}' with unknown type '{}' while restoring revision {}",
                    block.name, block.system_block_type, revision_id);
                continue;
            };

            let new_id = WorkflowStorage::insert_block(
                &mut tx,
                workflow_id,
                &NewBlock {
                    name: block.name.clone(),
                    block_type_id,
                    config: block.json_config.clone(),
                    position_x: block.position_x,
                    position_y: block.position_y,
                },
            )
            .await?;
            id_map.insert(block.id.unwrap_or(position as BlockId), new_id);
        }

        for variable in &snapshot.variables {
            WorkflowStorage::insert_variable(&mut tx, workflow_id, &variable.name, variable.default_value.as_deref())
                .await?;
        }

        let mut dropped = 0;
        for connection in &snapshot.connections {
            match (id_map.get(&connection.source_block_id), id_map.get(&connection.target_block_id)) {
                (Some(&source), Some(&target)) => {
                    WorkflowStorage::insert_connection(
                        &mut tx,
                        source,
                        target,
                        connection.connection_type,
                        connection.label.as_deref(),
                    )
                    .await?;
                }
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            tracing::warn!("⚠️ Dropped {} connection(s) with unmapped endpoints from revision {}", dropped, revision_id);
        }

        WorkflowStorage::activate_revision(&mut tx, workflow_id, revision_id, Some(&Utc::now())).await?;
        tx.commit().await?;

        tracing::info!("⏪ Restored workflow {} to revision {} ({})", workflow_id, revision_id, revision.version);
        Ok(true)
    }
}
