//! Task records as returned by a scheduler query.

use drover_id::{InstanceId, JobKey};
use serde::{Deserialize, Serialize};

use crate::ScheduleStatus;

/// One entry of a task's chronological event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub status: ScheduleStatus,

    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl TaskEvent {
    pub fn new(status: ScheduleStatus, timestamp_ms: i64) -> Self {
        Self {
            status,
            timestamp_ms,
        }
    }
}

/// A running or terminal task instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Scheduler-assigned ID, distinct for every incarnation of an instance.
    pub task_id: String,

    pub instance_id: InstanceId,

    pub host: String,

    pub job_key: JobKey,

    #[serde(default)]
    pub is_production: bool,

    pub status: ScheduleStatus,

    /// Events in chronological order.
    #[serde(default)]
    pub events: Vec<TaskEvent>,
}

impl TaskRecord {
    /// Timestamp of the most recent transition into RUNNING.
    pub fn last_running_ms(&self) -> Option<i64> {
        self.events
            .iter()
            .rev()
            .find(|event| event.status == ScheduleStatus::Running)
            .map(|event| event.timestamp_ms)
    }
}
