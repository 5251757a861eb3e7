/// Petgraph-based evaluation engine
///
/// Converts a workflow into a directed graph and walks it breadth-first from
/// every Start block. Cycles are allowed: each queued entry carries the set of
/// blocks already visited on its own path, so a loop back terminates while a
/// block reached along two different branches runs once per branch.

use crate::{
    error::WorkflowError,
    runtime::{
        blocks::switch,
        executor::{BlockContext, BlockExecutorRegistry},
        variables::VariableStore,
    },
    workflow::{
        storage::WorkflowStorage,
        types::{block_types, Block, BlockConnection, ConnectionKind, Workflow, WorkflowExecution, WorkflowId},
    },
};
use anyhow::Result;
use chrono::Utc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

/// Graph evaluation engine
///
/// Executes blocks through the executor registry and appends an execution record
/// for every evaluation it is asked to persist.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    executors: Arc<BlockExecutorRegistry>,
    storage: WorkflowStorage,
}

/// Borrowed petgraph view of a workflow
///
/// Node weights are blocks, edge weights are the connections they came from.
struct WorkflowGraph<'w> {
    graph: DiGraph<&'w Block, &'w BlockConnection>,
    /// Start blocks in block order
    roots: Vec<NodeIndex>,
}

impl<'w> WorkflowGraph<'w> {
    fn build(workflow: &'w Workflow) -> Self {
        tracing::debug!("🏗️ Building graph for workflow {} ({} blocks, {} connections)",
            workflow.id, workflow.blocks.len(), workflow.connections.len());

        let mut graph = DiGraph::new();
        let mut index_of: HashMap<i64, NodeIndex> = HashMap::new();

        for block in &workflow.blocks {
            index_of.insert(block.id, graph.add_node(block));
        }

        for connection in &workflow.connections {
            match (
                index_of.get(&connection.source_block_id),
                index_of.get(&connection.target_block_id),
            ) {
                (Some(&from), Some(&to)) => {
                    graph.add_edge(from, to, connection);
                }
                _ => tracing::warn!("⚠️ Connection {} of workflow {} references an unknown block",
                    connection.id, workflow.id),
            }
        }

        let roots = graph
            .node_indices()
            .filter(|&index| graph[index].is_type(block_types::START))
            .collect();

        Self { graph, roots }
    }

    /// Outgoing edges of `node` with the given kind, in connection id order
    fn outgoing(&self, node: NodeIndex, kind: ConnectionKind) -> Vec<(&'w BlockConnection, NodeIndex)> {
        let mut edges: Vec<(&'w BlockConnection, NodeIndex)> = self
            .graph
            .edges(node)
            .filter(|edge| edge.weight().kind == kind)
            .map(|edge| (*edge.weight(), edge.target()))
            .collect();
        edges.sort_by_key(|(connection, _)| connection.id);
        edges
    }
}

impl ExecutionEngine {
    pub fn new(executors: Arc<BlockExecutorRegistry>, storage: WorkflowStorage) -> Self {
        Self { executors, storage }
    }

    /// Evaluate a stored workflow by id and persist the execution record
    pub async fn evaluate(
        &self,
        workflow_id: WorkflowId,
        inputs: &HashMap<String, String>,
        skip_waits: bool,
    ) -> Result<WorkflowExecution> {
        let workflow = self
            .storage
            .load_workflow(workflow_id)
            .await?
            .ok_or(WorkflowError::WorkflowNotFound(workflow_id))?;

        self.evaluate_workflow(&workflow, inputs, skip_waits).await
    }

    /// Evaluate an already loaded workflow and persist the execution record
    pub async fn evaluate_workflow(
        &self,
        workflow: &Workflow,
        inputs: &HashMap<String, String>,
        skip_waits: bool,
    ) -> Result<WorkflowExecution> {
        let mut execution = self.trace(workflow, inputs, skip_waits).await;
        execution.id = self.storage.insert_execution(&execution).await?;

        tracing::info!("💾 Stored execution {} for workflow {}", execution.id, workflow.id);
        Ok(execution)
    }

    /// Execution history of a workflow
    pub async fn executions(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowExecution>> {
        self.storage.list_executions(workflow_id).await
    }

    /// Walk the graph and return the execution record without storing it
    ///
    /// Block failures never abort the walk; they only select Error edges.
    pub async fn trace(
        &self,
        workflow: &Workflow,
        inputs: &HashMap<String, String>,
        skip_waits: bool,
    ) -> WorkflowExecution {
        let started = std::time::Instant::now();
        tracing::info!("🚀 Evaluating workflow {} ('{}')", workflow.id, workflow.name);

        let graph = WorkflowGraph::build(workflow);
        let mut variables = VariableStore::initialize(&workflow.variables, inputs);
        let mut path = Vec::new();
        let mut actions = Vec::new();

        if graph.roots.is_empty() {
            tracing::warn!("⚠️ Workflow {} has no Start block, nothing to run", workflow.id);
        }

        let mut queue: VecDeque<(NodeIndex, HashSet<NodeIndex>)> = graph
            .roots
            .iter()
            .map(|&root| (root, HashSet::new()))
            .collect();

        while let Some((node, mut visited)) = queue.pop_front() {
            let block = graph.graph[node];
            if !visited.insert(node) {
                tracing::debug!("🔁 Block '{}' already visited on this path, stopping branch", block.name);
                continue;
            }

            let outcome = {
                let mut ctx = BlockContext { variables: &mut variables, skip_waits };
                self.executors.execute(block, &mut ctx).await
            };
            tracing::info!("📍 Step {}: '{}' -> {}", path.len() + 1, block.name, outcome.description);

            path.push(block.name.clone());
            actions.push(outcome.description);

            let candidates = graph.outgoing(node, ConnectionKind::for_outcome(outcome.is_error));
            let next: Vec<NodeIndex> = if block.is_type(block_types::SWITCH) && !outcome.is_error {
                Self::switch_target(block, &candidates, &variables).into_iter().collect()
            } else {
                candidates.iter().map(|(_, target)| *target).collect()
            };

            for target in next {
                queue.push_back((target, visited.clone()));
            }
        }

        tracing::info!("🎉 Workflow {} evaluated {} block(s) in {:?}",
            workflow.id, path.len(), started.elapsed());

        WorkflowExecution {
            id: 0,
            workflow_id: workflow.id,
            executed_at: Utc::now(),
            inputs: inputs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            result: variables.to_map(),
            path,
            actions,
        }
    }

    /// At most one successor of a Switch block
    fn switch_target(
        block: &Block,
        candidates: &[(&BlockConnection, NodeIndex)],
        variables: &VariableStore,
    ) -> Option<NodeIndex> {
        let value = match switch::resolve_expression(block, variables) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("⚠️ Switch '{}' could not resolve its expression: {}", block.name, e);
                return None;
            }
        };

        let edges: Vec<&BlockConnection> = candidates.iter().map(|(connection, _)| *connection).collect();
        let chosen = switch::select_branch(&value, &edges, variables);
        if chosen.is_none() {
            tracing::debug!("🔀 Switch '{}' value '{}' matched no branch", block.name, value);
        }

        chosen.and_then(|chosen| {
            candidates
                .iter()
                .find(|(connection, _)| connection.id == chosen.id)
                .map(|(_, target)| *target)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use crate::workflow::types::WorkflowVariable;

    async fn engine() -> ExecutionEngine {
        let registry = BlockExecutorRegistry::with_builtin(&ExecutorConfig {
            http_timeout_secs: 5,
            max_wait_secs: 0,
        })
        .unwrap();
        let storage = WorkflowStorage::connect("sqlite::memory:").await.unwrap();
        ExecutionEngine::new(Arc::new(registry), storage)
    }

    struct Graph {
        workflow: Option<Workflow>,
    }

    impl Graph {
        fn new() -> Self {
            Self {
                workflow: Some(Workflow {
                    id: 1,
                    name: "test".to_string(),
                    active_revision_id: None,
                    blocks: Vec::new(),
                    connections: Vec::new(),
                    variables: Vec::new(),
                }),
            }
        }

        fn wf(&mut self) -> &mut Workflow {
            self.workflow.as_mut().unwrap()
        }

        fn block(mut self, id: i64, name: &str, block_type: &str, config: Option<&str>) -> Self {
            self.wf().blocks.push(Block {
                id,
                workflow_id: 1,
                name: name.to_string(),
                block_type_id: 0,
                block_type: block_type.to_string(),
                config: config.map(str::to_string),
                position_x: None,
                position_y: None,
            });
            self
        }

        fn link(mut self, id: i64, from: i64, to: i64, kind: ConnectionKind, label: Option<&str>) -> Self {
            self.wf().connections.push(BlockConnection {
                id,
                source_block_id: from,
                target_block_id: to,
                kind,
                label: label.map(str::to_string),
            });
            self
        }

        fn variable(mut self, name: &str, default: &str) -> Self {
            self.wf().variables.push(WorkflowVariable {
                id: 0,
                workflow_id: 1,
                name: name.to_string(),
                default_value: Some(default.to_string()),
            });
            self
        }

        fn build(mut self) -> Workflow {
            self.workflow.take().unwrap()
        }
    }

    fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    use crate::workflow::types::ConnectionKind::{Error, Success};

    #[tokio::test]
    async fn test_calculation_writes_result() {
        let workflow = Graph::new()
            .block(1, "Start", "Start", None)
            .block(2, "Sum", "Calculation",
                Some(r#"{"firstVariable":"a","secondVariable":"b","operation":"Add","resultVariable":"c"}"#))
            .block(3, "End", "End", None)
            .link(1, 1, 2, Success, None)
            .link(2, 2, 3, Success, None)
            .variable("a", "3")
            .build();

        let execution = engine().await.trace(&workflow, &inputs(&[("b", "4")]), false).await;

        assert_eq!(execution.path, vec!["Start", "Sum", "End"]);
        assert_eq!(execution.result.get("c").map(String::as_str), Some("7"));
        assert_eq!(execution.inputs.get("b").map(String::as_str), Some("4"));
        assert_eq!(execution.actions.len(), 3);
        assert_eq!(execution.id, 0);
    }

    fn condition_workflow() -> Workflow {
        Graph::new()
            .block(1, "Start", "Start", None)
            .block(2, "Check", "If", Some(r#"{"left":"$x","operator":"Equal","right":"5"}"#))
            .block(3, "Yes", "End", None)
            .block(4, "No", "End", None)
            .link(1, 1, 2, Success, None)
            .link(2, 2, 3, Success, None)
            .link(3, 2, 4, Error, None)
            .build()
    }

    #[tokio::test]
    async fn test_condition_routes_by_outcome() {
        let engine = engine().await;
        let workflow = condition_workflow();

        let hit = engine.trace(&workflow, &inputs(&[("x", "5")]), false).await;
        assert_eq!(hit.path, vec!["Start", "Check", "Yes"]);

        let miss = engine.trace(&workflow, &inputs(&[("x", "6")]), false).await;
        assert_eq!(miss.path, vec!["Start", "Check", "No"]);
    }

    #[tokio::test]
    async fn test_switch_follows_single_branch() {
        let engine = engine().await;
        let workflow = Graph::new()
            .block(1, "Start", "Start", None)
            .block(2, "Tier", "Switch", Some(r#"{"expression":"$tier"}"#))
            .block(3, "Fallback", "End", None)
            .block(4, "Gold", "End", None)
            .block(5, "Silver", "End", None)
            .link(1, 1, 2, Success, None)
            .link(2, 2, 3, Success, Some(""))
            .link(3, 2, 4, Success, Some("#1 · gold"))
            .link(4, 2, 5, Success, Some("silver"))
            .build();

        let gold = engine.trace(&workflow, &inputs(&[("tier", "Gold")]), false).await;
        assert_eq!(gold.path, vec!["Start", "Tier", "Gold"]);

        let other = engine.trace(&workflow, &inputs(&[("tier", "bronze")]), false).await;
        assert_eq!(other.path, vec!["Start", "Tier", "Fallback"]);
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let workflow = Graph::new()
            .block(1, "Start", "Start", None)
            .block(2, "A", "Loop", None)
            .block(3, "B", "Loop", None)
            .link(1, 1, 2, Success, None)
            .link(2, 2, 3, Success, None)
            .link(3, 3, 2, Success, None)
            .build();

        let execution = engine().await.trace(&workflow, &HashMap::new(), false).await;
        assert_eq!(execution.path, vec!["Start", "A", "B"]);
    }

    #[tokio::test]
    async fn test_diamond_runs_join_once_per_branch() {
        let workflow = Graph::new()
            .block(1, "Start", "Start", None)
            .block(2, "Left", "Loop", None)
            .block(3, "Right", "Loop", None)
            .block(4, "Join", "End", None)
            .link(1, 1, 2, Success, None)
            .link(2, 1, 3, Success, None)
            .link(3, 2, 4, Success, None)
            .link(4, 3, 4, Success, None)
            .build();

        let execution = engine().await.trace(&workflow, &HashMap::new(), false).await;
        assert_eq!(execution.path, vec!["Start", "Left", "Right", "Join", "Join"]);
    }

    #[tokio::test]
    async fn test_fan_out_follows_connection_order() {
        let workflow = Graph::new()
            .block(1, "Start", "Start", None)
            .block(2, "Second", "End", None)
            .block(3, "First", "End", None)
            .link(9, 1, 2, Success, None)
            .link(4, 1, 3, Success, None)
            .build();

        let execution = engine().await.trace(&workflow, &HashMap::new(), false).await;
        assert_eq!(execution.path, vec!["Start", "First", "Second"]);
    }

    #[tokio::test]
    async fn test_without_start_block_nothing_runs() {
        let workflow = Graph::new()
            .block(1, "Orphan", "End", None)
            .variable("kept", "yes")
            .build();

        let execution = engine().await.trace(&workflow, &HashMap::new(), false).await;
        assert!(execution.path.is_empty());
        assert!(execution.actions.is_empty());
        assert_eq!(execution.result.get("kept").map(String::as_str), Some("yes"));
    }

    #[tokio::test]
    async fn test_evaluate_unknown_workflow_is_not_found() {
        let err = engine().await.evaluate(42, &HashMap::new(), true).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkflowError>(),
            Some(WorkflowError::WorkflowNotFound(42))
        ));
    }
}
