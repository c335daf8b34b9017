//! Task-status health check.

use std::collections::BTreeMap;

use drover_id::InstanceId;
use drover_tasks::{ScheduleStatus, TaskRecord};
use tracing::info;

/// Result of one health observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub healthy: bool,
    /// Whether an unhealthy instance may still recover.
    pub retriable: bool,
}

impl Health {
    pub const ALIVE: Self = Self {
        healthy: true,
        retriable: true,
    };

    pub const DEAD: Self = Self {
        healthy: false,
        retriable: true,
    };

    pub const REPLACED: Self = Self {
        healthy: false,
        retriable: false,
    };
}

/// Judges health from task status.
///
/// A task is healthy while it is RUNNING under the task ID first seen for
/// its instance. A different task ID means the instance was replaced, which
/// is not retriable.
#[derive(Debug, Default)]
pub struct StatusHealthCheck {
    task_ids: BTreeMap<InstanceId, String>,
}

impl StatusHealthCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health(&mut self, task: &TaskRecord) -> Health {
        if task.status != ScheduleStatus::Running {
            return Health::DEAD;
        }

        match self.task_ids.get(&task.instance_id) {
            Some(known) if *known == task.task_id => Health::ALIVE,
            Some(_) => Health::REPLACED,
            None => {
                info!(instance = %task.instance_id, task_id = %task.task_id, "detected running instance");
                self.task_ids
                    .insert(task.instance_id, task.task_id.clone());
                Health::ALIVE
            }
        }
    }
}
