//! End-to-end behaviour over an in-memory database: evaluation records,
//! revision snapshot/restore and the schedule poller.

use blockway::{
    config::Config,
    create_runtime,
    runtime::{compute_next_run, ScheduleRequest},
    workflow::{ConnectionKind, NewBlock, TriggerType, Workflow},
    Runtime, WorkflowError,
};
use chrono::{Duration, Utc};
use std::collections::HashMap;

async fn runtime() -> Runtime {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.executors.max_wait_secs = 0;
    create_runtime(&config).await.unwrap()
}

fn block(runtime: &Runtime, name: &str, block_type: &str, config: Option<&str>) -> NewBlock {
    NewBlock {
        name: name.to_string(),
        block_type_id: runtime.catalog.id_of(block_type).unwrap(),
        config: config.map(str::to_string),
        position_x: Some(0.0),
        position_y: Some(0.0),
    }
}

/// Start -> Sum(a + b -> c) -> Check(c == 7) -> Yes / No
async fn seed_workflow(runtime: &Runtime) -> i64 {
    let storage = &runtime.storage;
    let wf = storage.create_workflow("adder").await.unwrap();

    let start = storage.add_block(wf, &block(runtime, "Start", "Start", None)).await.unwrap();
    let sum = storage
        .add_block(wf, &block(runtime, "Sum", "Calculation",
            Some(r#"{"firstVariable":"a","secondVariable":"b","operation":"Add","resultVariable":"c"}"#)))
        .await
        .unwrap();
    let check = storage
        .add_block(wf, &block(runtime, "Check", "If",
            Some(r#"{"left":"$c","operator":"Equal","right":"7"}"#)))
        .await
        .unwrap();
    let yes = storage.add_block(wf, &block(runtime, "Yes", "End", None)).await.unwrap();
    let no = storage.add_block(wf, &block(runtime, "No", "End", None)).await.unwrap();

    storage.add_connection(start, sum, ConnectionKind::Success, None).await.unwrap();
    storage.add_connection(sum, check, ConnectionKind::Success, None).await.unwrap();
    storage.add_connection(check, yes, ConnectionKind::Success, None).await.unwrap();
    storage.add_connection(check, no, ConnectionKind::Error, Some("miss")).await.unwrap();

    storage.add_variable(wf, "a", Some("3")).await.unwrap();
    storage.add_variable(wf, "b", Some("0")).await.unwrap();
    wf
}

fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Graph shape independent of database ids
fn shape(workflow: &Workflow) -> (Vec<(String, String, Option<String>)>, Vec<(String, String, ConnectionKind, Option<String>)>, Vec<(String, Option<String>)>) {
    let name_of = |id: i64| workflow.block(id).map(|b| b.name.clone()).unwrap_or_default();

    let mut blocks: Vec<_> = workflow
        .blocks
        .iter()
        .map(|b| (b.name.clone(), b.block_type.clone(), b.config.clone()))
        .collect();
    blocks.sort();

    let mut connections: Vec<_> = workflow
        .connections
        .iter()
        .map(|c| (name_of(c.source_block_id), name_of(c.target_block_id), c.kind, c.label.clone()))
        .collect();
    connections.sort_by(|a, b| (&a.0, &a.1, a.2.as_str()).cmp(&(&b.0, &b.1, b.2.as_str())));

    let mut variables: Vec<_> = workflow
        .variables
        .iter()
        .map(|v| (v.name.clone(), v.default_value.clone()))
        .collect();
    variables.sort();

    (blocks, connections, variables)
}

#[tokio::test]
async fn test_evaluate_persists_execution() {
    let runtime = runtime().await;
    let wf = seed_workflow(&runtime).await;

    let hit = runtime.engine.evaluate(wf, &inputs(&[("b", "4")]), false).await.unwrap();
    assert!(hit.id > 0);
    assert_eq!(hit.path, vec!["Start", "Sum", "Check", "Yes"]);
    assert_eq!(hit.result.get("c").map(String::as_str), Some("7"));

    let miss = runtime.engine.evaluate(wf, &inputs(&[("b", "5")]), false).await.unwrap();
    assert_eq!(miss.path, vec!["Start", "Sum", "Check", "No"]);

    let history = runtime.engine.executions(wf).await.unwrap();
    assert_eq!(history.len(), 2);
    let stored = history.iter().find(|e| e.id == hit.id).unwrap();
    assert_eq!(stored.path, hit.path);
    assert_eq!(stored.actions, hit.actions);
    assert_eq!(stored.inputs.get("b").map(String::as_str), Some("4"));
}

#[tokio::test]
async fn test_snapshot_then_restore_reproduces_graph() {
    let runtime = runtime().await;
    let wf = seed_workflow(&runtime).await;
    let original = runtime.storage.load_workflow(wf).await.unwrap().unwrap();

    let revision = runtime.revisions.create_snapshot(wf, Some("baseline")).await.unwrap();
    assert_eq!(revision.version, "v1");
    assert!(revision.is_active);
    assert_eq!(revision.label.as_deref(), Some("baseline"));

    // Mutate the live graph
    let mut tx = runtime.storage.begin().await.unwrap();
    blockway::WorkflowStorage::delete_graph(&mut tx, wf).await.unwrap();
    tx.commit().await.unwrap();
    runtime.storage.add_block(wf, &block(&runtime, "Lonely", "Wait", Some(r#"{"seconds":1}"#))).await.unwrap();

    assert!(runtime.revisions.restore(wf, revision.id).await.unwrap());

    let restored = runtime.storage.load_workflow(wf).await.unwrap().unwrap();
    assert_eq!(shape(&restored), shape(&original));
    assert_eq!(restored.active_revision_id, Some(revision.id));

    let after = runtime.revisions.get_revision(wf, revision.id).await.unwrap();
    assert!(after.applied_at.is_some());

    let run = runtime.engine.evaluate(wf, &inputs(&[("b", "4")]), false).await.unwrap();
    assert_eq!(run.path, vec!["Start", "Sum", "Check", "Yes"]);
}

#[tokio::test]
async fn test_only_newest_snapshot_is_active() {
    let runtime = runtime().await;
    let wf = seed_workflow(&runtime).await;

    let first = runtime.revisions.create_snapshot(wf, None).await.unwrap();
    let second = runtime.revisions.create_snapshot(wf, None).await.unwrap();
    assert_eq!(second.version, "v2");

    let revisions = runtime.revisions.list_revisions(wf).await.unwrap();
    assert_eq!(revisions.len(), 2);
    let active: Vec<i64> = revisions.iter().filter(|r| r.is_active).map(|r| r.id).collect();
    assert_eq!(active, vec![second.id]);

    // Restoring the older one flips the flag back
    runtime.revisions.restore(wf, first.id).await.unwrap();
    let revisions = runtime.revisions.list_revisions(wf).await.unwrap();
    let active: Vec<i64> = revisions.iter().filter(|r| r.is_active).map(|r| r.id).collect();
    assert_eq!(active, vec![first.id]);
}

#[tokio::test]
async fn test_restore_rejects_foreign_or_missing_revision() {
    let runtime = runtime().await;
    let wf = seed_workflow(&runtime).await;
    let other = runtime.storage.create_workflow("other").await.unwrap();
    let revision = runtime.revisions.create_snapshot(wf, None).await.unwrap();

    let err = runtime.revisions.restore(other, revision.id).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WorkflowError>(),
        Some(WorkflowError::RevisionNotFound { .. })
    ));

    let err = runtime.revisions.restore(wf, revision.id + 50).await.unwrap_err();
    assert!(err.downcast_ref::<WorkflowError>().is_some_and(WorkflowError::is_not_found));

    let err = runtime.revisions.create_snapshot(9999, None).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WorkflowError>(),
        Some(WorkflowError::WorkflowNotFound(9999))
    ));
}

#[tokio::test]
async fn test_restore_skips_unknown_types_and_dangling_connections() {
    let runtime = runtime().await;
    let wf = runtime.storage.create_workflow("imported").await.unwrap();

    // Blocks carry no ids, so connections refer to them by position
    let snapshot = r#"{
        "name": "imported",
        "blocks": [
            {"name": "S", "systemBlockType": "Start"},
            {"name": "Portal", "systemBlockType": "Teleport"},
            {"name": "E", "systemBlockType": "End"}
        ],
        "connections": [
            {"sourceBlockId": 0, "targetBlockId": 1, "connectionType": "Success"},
            {"sourceBlockId": 1, "targetBlockId": 2, "connectionType": "Error"},
            {"sourceBlockId": 0, "targetBlockId": 2, "connectionType": "Success"},
            {"sourceBlockId": 0, "targetBlockId": 42, "connectionType": "Error"}
        ],
        "variables": [{"name": "total", "defaultValue": "0"}]
    }"#;

    let mut tx = runtime.storage.begin().await.unwrap();
    let revision_id = blockway::WorkflowStorage::insert_revision(&mut tx, wf, "v1", None, &Utc::now(), snapshot)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert!(runtime.revisions.restore(wf, revision_id).await.unwrap());

    let restored = runtime.storage.load_workflow(wf).await.unwrap().unwrap();
    let mut names: Vec<&str> = restored.blocks.iter().map(|b| b.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["E", "S"]);

    assert_eq!(restored.connections.len(), 1);
    let connection = &restored.connections[0];
    assert_eq!(connection.kind, ConnectionKind::Success);
    assert_eq!(restored.block(connection.source_block_id).map(|b| b.name.as_str()), Some("S"));
    assert_eq!(restored.block(connection.target_block_id).map(|b| b.name.as_str()), Some("E"));
    assert_eq!(restored.variables.len(), 1);
    assert_eq!(restored.active_revision_id, Some(revision_id));

    let run = runtime.engine.evaluate(wf, &HashMap::new(), false).await.unwrap();
    assert_eq!(run.path, vec!["S", "E"]);
}

fn interval_request(workflow_id: i64, start_offset: Duration) -> ScheduleRequest {
    ScheduleRequest {
        workflow_id,
        revision_id: None,
        name: "every hour".to_string(),
        description: None,
        trigger_type: TriggerType::Interval,
        start_at: Utc::now() + start_offset,
        interval_minutes: Some(60),
        is_active: true,
        timezone: Some("Not/AZone".to_string()),
    }
}

#[tokio::test]
async fn test_schedule_crud_normalizes_timezone() {
    let runtime = runtime().await;
    let wf = seed_workflow(&runtime).await;

    let created = runtime.schedules.create(interval_request(wf, Duration::hours(2))).await.unwrap();
    assert_eq!(created.timezone, "UTC");
    assert_eq!(created.next_run_at, Some(created.start_at));

    let mut request = interval_request(wf, Duration::hours(2));
    request.trigger_type = TriggerType::Daily;
    request.timezone = Some("Asia/Tokyo".to_string());
    let updated = runtime.schedules.update(created.id, request).await.unwrap();
    assert_eq!(updated.timezone, "Asia/Tokyo");
    assert_eq!(updated.trigger_type, TriggerType::Daily);

    assert_eq!(runtime.schedules.list(wf).await.unwrap().len(), 1);
    assert!(runtime.schedules.delete(created.id).await.unwrap());
    assert!(!runtime.schedules.delete(created.id).await.unwrap());

    let err = runtime.schedules.get(created.id).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WorkflowError>(),
        Some(WorkflowError::ScheduleNotFound(_))
    ));
}

#[tokio::test]
async fn test_tick_runs_due_schedule_and_reschedules() {
    let runtime = runtime().await;
    let wf = seed_workflow(&runtime).await;

    let mut schedule = runtime.schedules.create(interval_request(wf, -Duration::hours(3))).await.unwrap();
    schedule.next_run_at = Some(Utc::now() - Duration::minutes(1));
    runtime.storage.update_schedule(&schedule).await.unwrap();

    let now = Utc::now();
    assert_eq!(runtime.schedules.tick(now).await.unwrap(), 1);

    let after = runtime.schedules.get(schedule.id).await.unwrap();
    assert_eq!(after.last_run_at, Some(now));
    assert_eq!(after.next_run_at, Some(now + Duration::minutes(60)));
    assert!(after.is_active);
    assert_eq!(runtime.engine.executions(wf).await.unwrap().len(), 1);

    // Not due any more
    assert_eq!(runtime.schedules.tick(now).await.unwrap(), 0);
}

#[tokio::test]
async fn test_tick_deactivates_schedule_of_deleted_workflow() {
    let runtime = runtime().await;
    let wf = seed_workflow(&runtime).await;

    let mut schedule = runtime.schedules.create(interval_request(wf, -Duration::hours(1))).await.unwrap();
    schedule.next_run_at = Some(Utc::now() - Duration::minutes(5));
    runtime.storage.update_schedule(&schedule).await.unwrap();

    assert!(runtime.storage.delete_workflow(wf).await.unwrap());
    assert_eq!(runtime.schedules.tick(Utc::now()).await.unwrap(), 0);

    let after = runtime.schedules.get(schedule.id).await.unwrap();
    assert!(!after.is_active);
    assert_eq!(after.next_run_at, None);
}

#[tokio::test]
async fn test_run_now_finishes_one_shot_schedule() {
    let runtime = runtime().await;
    let wf = seed_workflow(&runtime).await;

    let mut request = interval_request(wf, Duration::days(1));
    request.trigger_type = TriggerType::Once;
    request.interval_minutes = None;
    let schedule = runtime.schedules.create(request).await.unwrap();
    assert!(schedule.next_run_at.is_some());

    let execution = runtime.schedules.run_now(schedule.id).await.unwrap();
    assert_eq!(execution.workflow_id, wf);

    let after = runtime.schedules.get(schedule.id).await.unwrap();
    assert!(after.last_run_at.is_some());
    assert_eq!(after.next_run_at, None);
    assert!(!after.is_active);
    assert_eq!(compute_next_run(&after, Utc::now()), None);
}
