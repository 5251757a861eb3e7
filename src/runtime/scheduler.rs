/// Schedule engine and background poller
///
/// `compute_next_run` is a pure function of a schedule and the current instant.
/// `ScheduleService` owns schedule CRUD, manual runs and the polling loop that
/// evaluates due schedules unattended (Wait blocks are skipped).

use crate::{
    error::WorkflowError,
    runtime::engine::ExecutionEngine,
    workflow::{
        storage::WorkflowStorage,
        types::{TriggerType, WorkflowExecution, WorkflowId, WorkflowSchedule},
    },
};
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Parse an IANA timezone id, falling back to UTC for anything unknown
pub fn resolve_timezone(id: &str) -> Tz {
    id.trim().parse::<Tz>().unwrap_or(Tz::UTC)
}

/// Resolve a local wall-clock time, stepping forward out of DST gaps
fn local_to_utc(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            local
                .checked_add_signed(Duration::hours(1))
                .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
        })
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

/// Next instant at which `schedule` should fire, or `None` when it is finished
pub fn compute_next_run(schedule: &WorkflowSchedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !schedule.is_active {
        return None;
    }

    if schedule.trigger_type == TriggerType::Daily {
        return Some(next_daily(schedule, now));
    }

    let interval = match (schedule.trigger_type, schedule.interval()) {
        (TriggerType::Interval, Some(interval)) => interval,
        // Longer than chrono can represent
        (TriggerType::Interval, None) if schedule.interval_minutes.is_some_and(|m| m > 0) => return None,
        _ => {
            // One-shot: fires once at start_at if that is still ahead
            return match schedule.last_run_at {
                Some(_) => None,
                None if schedule.start_at > now => Some(schedule.start_at),
                None => None,
            };
        }
    };

    match schedule.last_run_at {
        Some(last) => {
            let next = last.checked_add_signed(interval)?;
            if next <= now {
                now.checked_add_signed(interval)
            } else {
                Some(next)
            }
        }
        None => match schedule.next_run_at {
            Some(pending) if pending > now => Some(pending),
            _ if schedule.start_at > now => Some(schedule.start_at),
            _ => now.checked_add_signed(interval),
        },
    }
}

/// Daily trigger: the wall-clock time of `start_at`, in the schedule's timezone
fn next_daily(schedule: &WorkflowSchedule, now: DateTime<Utc>) -> DateTime<Utc> {
    let tz = resolve_timezone(&schedule.timezone);
    let time_of_day = schedule.start_at.with_timezone(&tz).time();
    let basis = schedule.last_run_at.unwrap_or(now).with_timezone(&tz);

    let mut date = basis.date_naive();
    let mut candidate = local_to_utc(&tz, date.and_time(time_of_day));
    if candidate <= basis.with_timezone(&Utc) {
        date = date.succ_opt().unwrap_or(date);
        candidate = local_to_utc(&tz, date.and_time(time_of_day));
    }
    if schedule.last_run_at.is_none() && candidate <= now {
        date = date.succ_opt().unwrap_or(date);
        candidate = local_to_utc(&tz, date.and_time(time_of_day));
    }
    candidate
}

/// Input for creating or updating a schedule
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub workflow_id: WorkflowId,
    pub revision_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: TriggerType,
    pub start_at: DateTime<Utc>,
    pub interval_minutes: Option<i64>,
    pub is_active: bool,
    pub timezone: Option<String>,
}

fn normalize_timezone(timezone: Option<&str>) -> String {
    match timezone.map(str::trim) {
        Some(id) if !id.is_empty() && id.parse::<Tz>().is_ok() => id.to_string(),
        Some(id) if !id.is_empty() => {
            tracing::warn!("⚠️ Unknown timezone '{}', using {}", id, DEFAULT_TIMEZONE);
            DEFAULT_TIMEZONE.to_string()
        }
        _ => DEFAULT_TIMEZONE.to_string(),
    }
}

/// Schedule CRUD plus the polling loop
#[derive(Debug, Clone)]
pub struct ScheduleService {
    engine: ExecutionEngine,
    storage: WorkflowStorage,
    poll_interval: std::time::Duration,
}

impl ScheduleService {
    pub fn new(engine: ExecutionEngine, storage: WorkflowStorage, poll_interval: std::time::Duration) -> Self {
        Self { engine, storage, poll_interval }
    }

    pub async fn create(&self, request: ScheduleRequest) -> Result<WorkflowSchedule> {
        if !self.storage.workflow_exists(request.workflow_id).await? {
            return Err(WorkflowError::WorkflowNotFound(request.workflow_id).into());
        }

        let mut schedule = WorkflowSchedule {
            id: 0,
            workflow_id: request.workflow_id,
            revision_id: request.revision_id,
            name: request.name,
            description: request.description,
            trigger_type: request.trigger_type,
            start_at: request.start_at,
            interval_minutes: request.interval_minutes,
            is_active: request.is_active,
            timezone: normalize_timezone(request.timezone.as_deref()),
            last_run_at: None,
            next_run_at: None,
        };
        schedule.next_run_at = compute_next_run(&schedule, Utc::now());
        schedule.id = self.storage.insert_schedule(&schedule).await?;

        tracing::info!("⏰ Created schedule {} '{}' for workflow {} (next run: {:?})",
            schedule.id, schedule.name, schedule.workflow_id, schedule.next_run_at);
        Ok(schedule)
    }

    /// Replace a schedule's definition; run history is kept
    pub async fn update(&self, id: i64, request: ScheduleRequest) -> Result<WorkflowSchedule> {
        let mut schedule = self.get(id).await?;
        if !self.storage.workflow_exists(request.workflow_id).await? {
            return Err(WorkflowError::WorkflowNotFound(request.workflow_id).into());
        }

        schedule.workflow_id = request.workflow_id;
        schedule.revision_id = request.revision_id;
        schedule.name = request.name;
        schedule.description = request.description;
        schedule.trigger_type = request.trigger_type;
        schedule.start_at = request.start_at;
        schedule.interval_minutes = request.interval_minutes;
        schedule.is_active = request.is_active;
        schedule.timezone = normalize_timezone(request.timezone.as_deref());
        // A pending run from the old definition must not survive the edit
        schedule.next_run_at = None;
        schedule.next_run_at = compute_next_run(&schedule, Utc::now());

        self.storage.update_schedule(&schedule).await?;
        tracing::info!("🔄 Updated schedule {} (next run: {:?})", schedule.id, schedule.next_run_at);
        Ok(schedule)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self.storage.delete_schedule(id).await?;
        if deleted {
            tracing::info!("🗑️ Deleted schedule {}", id);
        }
        Ok(deleted)
    }

    pub async fn get(&self, id: i64) -> Result<WorkflowSchedule> {
        Ok(self
            .storage
            .get_schedule(id)
            .await?
            .ok_or(WorkflowError::ScheduleNotFound(id))?)
    }

    pub async fn list(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowSchedule>> {
        self.storage.list_schedules(workflow_id).await
    }

    /// Evaluate a schedule's workflow immediately, outside the polling cadence
    pub async fn run_now(&self, id: i64) -> Result<WorkflowExecution> {
        let mut schedule = self.get(id).await?;
        tracing::info!("▶️ Manual run of schedule {} '{}'", schedule.id, schedule.name);

        let execution = self
            .engine
            .evaluate(schedule.workflow_id, &HashMap::new(), true)
            .await?;

        let now = Utc::now();
        Self::record_run(&mut schedule, now);
        self.storage.update_schedule(&schedule).await?;
        Ok(execution)
    }

    fn record_run(schedule: &mut WorkflowSchedule, now: DateTime<Utc>) {
        schedule.last_run_at = Some(now);
        schedule.next_run_at = compute_next_run(schedule, now);
        if schedule.next_run_at.is_none() {
            tracing::info!("🏁 Schedule {} has no further runs, deactivating", schedule.id);
            schedule.is_active = false;
        }
    }

    /// Run every schedule that is due at `now`; returns how many were evaluated
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.storage.due_schedules(now).await?;
        if due.is_empty() {
            return Ok(0);
        }
        tracing::debug!("⏰ {} schedule(s) due", due.len());

        let mut changed = Vec::with_capacity(due.len());
        let mut evaluated = 0;

        for mut schedule in due {
            let workflow = match self.storage.load_workflow(schedule.workflow_id).await {
                Ok(Some(workflow)) => workflow,
                Ok(None) => {
                    tracing::warn!("⚠️ Schedule {} targets missing workflow {}, deactivating",
                        schedule.id, schedule.workflow_id);
                    schedule.is_active = false;
                    schedule.next_run_at = None;
                    changed.push(schedule);
                    continue;
                }
                Err(e) => {
                    tracing::error!("❌ Failed to load workflow {} for schedule {}: {}",
                        schedule.workflow_id, schedule.id, e);
                    continue;
                }
            };

            match self.engine.evaluate_workflow(&workflow, &HashMap::new(), true).await {
                Ok(execution) => {
                    evaluated += 1;
                    tracing::info!("✅ Schedule {} ran workflow {} (execution {})",
                        schedule.id, workflow.id, execution.id);
                    Self::record_run(&mut schedule, now);
                    changed.push(schedule);
                }
                Err(e) => {
                    tracing::error!("❌ Schedule {} failed to run workflow {}: {}",
                        schedule.id, workflow.id, e);
                }
            }
        }

        self.storage.update_schedules(&changed).await?;
        Ok(evaluated)
    }

    /// Poll until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("⏰ Schedule poller started (every {:?})", self.poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("⏹️ Schedule poller stopping");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        tracing::error!("❌ Schedule poll failed: {}", e);
                    }
                }
            }
        }
    }
}
