//! SQLite persistence layer for workflow graphs
//!
//! Holds the block-type catalog, the workflow graph (blocks, connections,
//! variables), revisions, execution records and schedules. Operations that must
//! be atomic are exposed as associated functions taking a `SqliteConnection`
//! so callers can compose them inside one transaction.

use crate::workflow::types::{
    Block, BlockConnection, BlockId, ConnectionKind, TriggerType, Workflow, WorkflowExecution,
    WorkflowId, WorkflowRevision, WorkflowSchedule, WorkflowVariable, block_types,
};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row, Sqlite, SqliteConnection, Transaction,
};
use std::str::FromStr;

/// SQLite-based storage for workflow graphs and their audit records
#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    /// SQLite connection pool
    pool: SqlitePool,
}

/// Block data for insertion; ids are assigned by the database
#[derive(Debug, Clone)]
pub struct NewBlock {
    pub name: String,
    pub block_type_id: i64,
    pub config: Option<String>,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
}

impl WorkflowStorage {
    /// Create new storage instance with an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url`, then initialize the
    /// schema and seed the block-type catalog
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives and dies with its single connection
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let storage = Self::new(pool);
        storage.init_schema().await?;
        storage.seed_block_types().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction on the underlying pool
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Initialize the storage schema
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS block_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                active_revision_id INTEGER NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS blocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                block_type_id INTEGER NOT NULL REFERENCES block_types(id),
                json_config TEXT NULL,
                position_x REAL NULL,
                position_y REAL NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS block_connections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_block_id INTEGER NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
                target_block_id INTEGER NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
                connection_type TEXT NOT NULL,
                label TEXT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_variables (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                default_value TEXT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_revisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                version TEXT NOT NULL,
                label TEXT NULL,
                created_at TEXT NOT NULL,
                applied_at TEXT NULL,
                is_active INTEGER NOT NULL DEFAULT 0,
                snapshot_json TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_executions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                executed_at TEXT NOT NULL,
                input_json TEXT NOT NULL,
                result_json TEXT NOT NULL,
                path_json TEXT NOT NULL,
                actions_json TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_schedules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                -- no foreign key: orphaned schedules are deactivated by the poller
                workflow_id INTEGER NOT NULL,
                revision_id INTEGER NULL,
                name TEXT NOT NULL,
                description TEXT NULL,
                trigger_type TEXT NOT NULL,
                start_at TEXT NOT NULL,
                interval_minutes INTEGER NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                timezone TEXT NOT NULL DEFAULT 'UTC',
                last_run_at TEXT NULL,
                next_run_at TEXT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_blocks_workflow ON blocks(workflow_id)",
            "CREATE INDEX IF NOT EXISTS idx_connections_source ON block_connections(source_block_id)",
            "CREATE INDEX IF NOT EXISTS idx_revisions_workflow ON workflow_revisions(workflow_id)",
            "CREATE INDEX IF NOT EXISTS idx_executions_workflow ON workflow_executions(workflow_id)",
            "CREATE INDEX IF NOT EXISTS idx_schedules_active ON workflow_schedules(is_active)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Insert any catalog block types that are missing
    pub async fn seed_block_types(&self) -> Result<()> {
        for name in block_types::ALL {
            sqlx::query("INSERT OR IGNORE INTO block_types (name) VALUES (?)")
                .bind(*name)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// All catalog entries as (id, name)
    pub async fn list_block_types(&self) -> Result<Vec<(i64, String)>> {
        let rows = sqlx::query("SELECT id, name FROM block_types ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut types = Vec::with_capacity(rows.len());
        for row in rows {
            types.push((row.try_get("id")?, row.try_get("name")?));
        }
        Ok(types)
    }

    // ------------------------------------------------------------------
    // Workflow graph
    // ------------------------------------------------------------------

    pub async fn create_workflow(&self, name: &str) -> Result<WorkflowId> {
        let result = sqlx::query("INSERT INTO workflows (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(to_db_time(&Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn delete_workflow(&self, id: WorkflowId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn add_block(&self, workflow_id: WorkflowId, block: &NewBlock) -> Result<BlockId> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_block(&mut conn, workflow_id, block).await
    }

    pub async fn add_connection(
        &self,
        source_block_id: BlockId,
        target_block_id: BlockId,
        kind: ConnectionKind,
        label: Option<&str>,
    ) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_connection(&mut conn, source_block_id, target_block_id, kind, label).await
    }

    pub async fn add_variable(
        &self,
        workflow_id: WorkflowId,
        name: &str,
        default_value: Option<&str>,
    ) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_variable(&mut conn, workflow_id, name, default_value).await
    }

    /// Load a workflow with blocks, connections and variables resolved
    pub async fn load_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>> {
        let row = sqlx::query("SELECT id, name, active_revision_id FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let block_rows = sqlx::query(
            r#"
            SELECT b.id, b.workflow_id, b.name, b.block_type_id, t.name AS block_type,
                   b.json_config, b.position_x, b.position_y
            FROM blocks b
            JOIN block_types t ON t.id = b.block_type_id
            WHERE b.workflow_id = ?
            ORDER BY b.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut blocks = Vec::with_capacity(block_rows.len());
        for r in &block_rows {
            blocks.push(Block {
                id: r.try_get("id")?,
                workflow_id: r.try_get("workflow_id")?,
                name: r.try_get("name")?,
                block_type_id: r.try_get("block_type_id")?,
                block_type: r.try_get("block_type")?,
                config: r.try_get("json_config")?,
                position_x: r.try_get("position_x")?,
                position_y: r.try_get("position_y")?,
            });
        }

        let connection_rows = sqlx::query(
            r#"
            SELECT c.id, c.source_block_id, c.target_block_id, c.connection_type, c.label
            FROM block_connections c
            JOIN blocks b ON b.id = c.source_block_id
            WHERE b.workflow_id = ?
            ORDER BY c.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut connections = Vec::with_capacity(connection_rows.len());
        for r in &connection_rows {
            let kind: String = r.try_get("connection_type")?;
            connections.push(BlockConnection {
                id: r.try_get("id")?,
                source_block_id: r.try_get("source_block_id")?,
                target_block_id: r.try_get("target_block_id")?,
                kind: kind.parse()?,
                label: r.try_get("label")?,
            });
        }

        let variable_rows = sqlx::query(
            "SELECT id, workflow_id, name, default_value FROM workflow_variables WHERE workflow_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut variables = Vec::with_capacity(variable_rows.len());
        for r in &variable_rows {
            variables.push(WorkflowVariable {
                id: r.try_get("id")?,
                workflow_id: r.try_get("workflow_id")?,
                name: r.try_get("name")?,
                default_value: r.try_get("default_value")?,
            });
        }

        Ok(Some(Workflow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            active_revision_id: row.try_get("active_revision_id")?,
            blocks,
            connections,
            variables,
        }))
    }

    pub async fn workflow_exists(&self, id: WorkflowId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Remove every block, connection and variable of a workflow
    pub async fn delete_graph(conn: &mut SqliteConnection, workflow_id: WorkflowId) -> Result<()> {
        // Connections go with their blocks through ON DELETE CASCADE
        sqlx::query("DELETE FROM blocks WHERE workflow_id = ?")
            .bind(workflow_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM workflow_variables WHERE workflow_id = ?")
            .bind(workflow_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn insert_block(
        conn: &mut SqliteConnection,
        workflow_id: WorkflowId,
        block: &NewBlock,
    ) -> Result<BlockId> {
        let result = sqlx::query(
            r#"
            INSERT INTO blocks (workflow_id, name, block_type_id, json_config, position_x, position_y)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(workflow_id)
        .bind(&block.name)
        .bind(block.block_type_id)
        .bind(&block.config)
        .bind(block.position_x)
        .bind(block.position_y)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_connection(
        conn: &mut SqliteConnection,
        source_block_id: BlockId,
        target_block_id: BlockId,
        kind: ConnectionKind,
        label: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO block_connections (source_block_id, target_block_id, connection_type, label) VALUES (?, ?, ?, ?)",
        )
        .bind(source_block_id)
        .bind(target_block_id)
        .bind(kind.as_str())
        .bind(label)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_variable(
        conn: &mut SqliteConnection,
        workflow_id: WorkflowId,
        name: &str,
        default_value: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO workflow_variables (workflow_id, name, default_value) VALUES (?, ?, ?)",
        )
        .bind(workflow_id)
        .bind(name)
        .bind(default_value)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Revisions
    // ------------------------------------------------------------------

    /// Revisions of a workflow, newest first
    pub async fn list_revisions(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowRevision>> {
        let rows = sqlx::query(
            r#"
            SELECT id, workflow_id, version, label, created_at, applied_at, is_active, snapshot_json
            FROM workflow_revisions WHERE workflow_id = ? ORDER BY id DESC
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(revision_from_row).collect()
    }

    pub async fn get_revision(&self, id: i64) -> Result<Option<WorkflowRevision>> {
        let row = sqlx::query(
            r#"
            SELECT id, workflow_id, version, label, created_at, applied_at, is_active, snapshot_json
            FROM workflow_revisions WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(revision_from_row).transpose()
    }

    /// Version labels of all revisions of a workflow
    pub async fn revision_versions(conn: &mut SqliteConnection, workflow_id: WorkflowId) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT version FROM workflow_revisions WHERE workflow_id = ?")
            .bind(workflow_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in rows {
            versions.push(row.try_get("version")?);
        }
        Ok(versions)
    }

    pub async fn insert_revision(
        conn: &mut SqliteConnection,
        workflow_id: WorkflowId,
        version: &str,
        label: Option<&str>,
        created_at: &DateTime<Utc>,
        snapshot_json: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO workflow_revisions (workflow_id, version, label, created_at, is_active, snapshot_json)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(workflow_id)
        .bind(version)
        .bind(label)
        .bind(to_db_time(created_at))
        .bind(snapshot_json)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Make `revision_id` the only active revision and point the workflow at it.
    /// When `applied_at` is given it is stamped on the revision as well.
    pub async fn activate_revision(
        conn: &mut SqliteConnection,
        workflow_id: WorkflowId,
        revision_id: i64,
        applied_at: Option<&DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE workflow_revisions SET is_active = 0 WHERE workflow_id = ? AND id <> ?")
            .bind(workflow_id)
            .bind(revision_id)
            .execute(&mut *conn)
            .await?;

        match applied_at {
            Some(at) => {
                sqlx::query("UPDATE workflow_revisions SET is_active = 1, applied_at = ? WHERE id = ?")
                    .bind(to_db_time(at))
                    .bind(revision_id)
                    .execute(&mut *conn)
                    .await?;
            }
            None => {
                sqlx::query("UPDATE workflow_revisions SET is_active = 1 WHERE id = ?")
                    .bind(revision_id)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        sqlx::query("UPDATE workflows SET active_revision_id = ? WHERE id = ?")
            .bind(revision_id)
            .bind(workflow_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Executions
    // ------------------------------------------------------------------

    /// Append an execution record, returning its id
    pub async fn insert_execution(&self, execution: &WorkflowExecution) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO workflow_executions (workflow_id, executed_at, input_json, result_json, path_json, actions_json)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(execution.workflow_id)
        .bind(to_db_time(&execution.executed_at))
        .bind(serde_json::to_string(&execution.inputs)?)
        .bind(serde_json::to_string(&execution.result)?)
        .bind(serde_json::to_string(&execution.path)?)
        .bind(serde_json::to_string(&execution.actions)?)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Executions of a workflow, newest first
    pub async fn list_executions(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowExecution>> {
        let rows = sqlx::query(
            r#"
            SELECT id, workflow_id, executed_at, input_json, result_json, path_json, actions_json
            FROM workflow_executions WHERE workflow_id = ? ORDER BY id DESC
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        let mut executions = Vec::with_capacity(rows.len());
        for row in rows {
            let executed_at: String = row.try_get("executed_at")?;
            let inputs: String = row.try_get("input_json")?;
            let result: String = row.try_get("result_json")?;
            let path: String = row.try_get("path_json")?;
            let actions: String = row.try_get("actions_json")?;
            executions.push(WorkflowExecution {
                id: row.try_get("id")?,
                workflow_id: row.try_get("workflow_id")?,
                executed_at: from_db_time(&executed_at)?,
                inputs: serde_json::from_str(&inputs)?,
                result: serde_json::from_str(&result)?,
                path: serde_json::from_str(&path)?,
                actions: serde_json::from_str(&actions)?,
            });
        }
        Ok(executions)
    }

    // ------------------------------------------------------------------
    // Schedules
    // ------------------------------------------------------------------

    pub async fn insert_schedule(&self, schedule: &WorkflowSchedule) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO workflow_schedules
                (workflow_id, revision_id, name, description, trigger_type, start_at,
                 interval_minutes, is_active, timezone, last_run_at, next_run_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(schedule.workflow_id)
        .bind(schedule.revision_id)
        .bind(&schedule.name)
        .bind(&schedule.description)
        .bind(schedule.trigger_type.as_str())
        .bind(to_db_time(&schedule.start_at))
        .bind(schedule.interval_minutes)
        .bind(schedule.is_active)
        .bind(&schedule.timezone)
        .bind(schedule.last_run_at.as_ref().map(to_db_time))
        .bind(schedule.next_run_at.as_ref().map(to_db_time))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update_schedule(&self, schedule: &WorkflowSchedule) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::write_schedule(&mut conn, schedule).await
    }

    /// Persist several schedules in one transaction
    pub async fn update_schedules(&self, schedules: &[WorkflowSchedule]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for schedule in schedules {
            Self::write_schedule(&mut tx, schedule).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn write_schedule(conn: &mut SqliteConnection, schedule: &WorkflowSchedule) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_schedules SET
                revision_id = ?, name = ?, description = ?, trigger_type = ?, start_at = ?,
                interval_minutes = ?, is_active = ?, timezone = ?, last_run_at = ?, next_run_at = ?
            WHERE id = ?
            "#,
        )
        .bind(schedule.revision_id)
        .bind(&schedule.name)
        .bind(&schedule.description)
        .bind(schedule.trigger_type.as_str())
        .bind(to_db_time(&schedule.start_at))
        .bind(schedule.interval_minutes)
        .bind(schedule.is_active)
        .bind(&schedule.timezone)
        .bind(schedule.last_run_at.as_ref().map(to_db_time))
        .bind(schedule.next_run_at.as_ref().map(to_db_time))
        .bind(schedule.id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_schedule(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflow_schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_schedule(&self, id: i64) -> Result<Option<WorkflowSchedule>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SCHEDULE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(schedule_from_row).transpose()
    }

    pub async fn list_schedules(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowSchedule>> {
        let rows = sqlx::query(&format!("{} WHERE workflow_id = ? ORDER BY id", SCHEDULE_SELECT))
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(schedule_from_row).collect()
    }

    /// Active schedules whose next run is at or before `now`
    pub async fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<WorkflowSchedule>> {
        let rows = sqlx::query(&format!(
            "{} WHERE is_active = 1 AND next_run_at IS NOT NULL ORDER BY id",
            SCHEDULE_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut due = Vec::new();
        for row in &rows {
            let schedule = schedule_from_row(row)?;
            if schedule.next_run_at.is_some_and(|next| next <= now) {
                due.push(schedule);
            }
        }
        Ok(due)
    }
}

const SCHEDULE_SELECT: &str = r#"
    SELECT id, workflow_id, revision_id, name, description, trigger_type, start_at,
           interval_minutes, is_active, timezone, last_run_at, next_run_at
    FROM workflow_schedules"#;

fn revision_from_row(row: &SqliteRow) -> Result<WorkflowRevision> {
    let created_at: String = row.try_get("created_at")?;
    let applied_at: Option<String> = row.try_get("applied_at")?;
    Ok(WorkflowRevision {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        version: row.try_get("version")?,
        label: row.try_get("label")?,
        created_at: from_db_time(&created_at)?,
        applied_at: applied_at.as_deref().map(from_db_time).transpose()?,
        is_active: row.try_get("is_active")?,
        snapshot_json: row.try_get("snapshot_json")?,
    })
}

fn schedule_from_row(row: &SqliteRow) -> Result<WorkflowSchedule> {
    let trigger_type: String = row.try_get("trigger_type")?;
    let start_at: String = row.try_get("start_at")?;
    let last_run_at: Option<String> = row.try_get("last_run_at")?;
    let next_run_at: Option<String> = row.try_get("next_run_at")?;
    Ok(WorkflowSchedule {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        revision_id: row.try_get("revision_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        trigger_type: trigger_type.parse::<TriggerType>()?,
        start_at: from_db_time(&start_at)?,
        interval_minutes: row.try_get("interval_minutes")?,
        is_active: row.try_get("is_active")?,
        timezone: row.try_get("timezone")?,
        last_run_at: last_run_at.as_deref().map(from_db_time).transpose()?,
        next_run_at: next_run_at.as_deref().map(from_db_time).transpose()?,
    })
}

fn to_db_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn from_db_time(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| anyhow::anyhow!("invalid timestamp '{}': {}", raw, e))?
        .with_timezone(&Utc))
}
