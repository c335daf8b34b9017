//! Task record builders.

use chrono::{DateTime, Utc};
use drover_id::{InstanceId, JobKey};
use drover_tasks::{ScheduleStatus, TaskEvent, TaskRecord};

/// Parses a job key path, panicking on invalid input.
pub fn job_key(path: &str) -> JobKey {
    match path.parse() {
        Ok(key) => key,
        Err(e) => panic!("invalid job key '{path}' in test: {e}"),
    }
}

/// Builder for [`TaskRecord`] values.
///
/// Defaults: production, RUNNING, no events, task ID `{job}/{instance}/0`.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    record: TaskRecord,
}

impl TaskBuilder {
    pub fn new(job: &str, instance: u32, host: &str) -> Self {
        let job_key = job_key(job);
        Self {
            record: TaskRecord {
                task_id: format!("{job_key}/{instance}/0"),
                instance_id: InstanceId::new(instance),
                host: host.to_string(),
                job_key,
                is_production: true,
                status: ScheduleStatus::Running,
                events: Vec::new(),
            },
        }
    }

    /// A RUNNING task whose last RUNNING transition was `uptime_secs` before `now`.
    pub fn running(job: &str, instance: u32, host: &str, uptime_secs: i64, now: DateTime<Utc>) -> TaskRecord {
        Self::new(job, instance, host)
            .running_since(now, uptime_secs)
            .build()
    }

    pub fn task_id(mut self, task_id: impl Into<String>) -> Self {
        self.record.task_id = task_id.into();
        self
    }

    pub fn production(mut self, production: bool) -> Self {
        self.record.is_production = production;
        self
    }

    pub fn status(mut self, status: ScheduleStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn event(mut self, status: ScheduleStatus, timestamp_ms: i64) -> Self {
        self.record.events.push(TaskEvent::new(status, timestamp_ms));
        self
    }

    /// Append PENDING and RUNNING events placing the RUNNING transition
    /// `uptime_secs` before `now`.
    pub fn running_since(self, now: DateTime<Utc>, uptime_secs: i64) -> Self {
        let running_at = now.timestamp_millis() - uptime_secs * 1000;
        self.event(ScheduleStatus::Pending, running_at - 1_000)
            .event(ScheduleStatus::Running, running_at)
            .status(ScheduleStatus::Running)
    }

    pub fn build(self) -> TaskRecord {
        self.record
    }
}
