//! Task query filters.

use std::collections::BTreeSet;

use drover_id::{InstanceId, JobKey};
use serde::{Deserialize, Serialize};

use crate::{ScheduleStatus, TaskRecord, ACTIVE_STATES, LIVE_STATES};

/// Filter for a scheduler task query.
///
/// Unset filters match everything; set filters must all match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_keys: Option<BTreeSet<JobKey>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<BTreeSet<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_ids: Option<BTreeSet<InstanceId>>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub statuses: BTreeSet<ScheduleStatus>,
}

impl TaskQuery {
    /// Query for tasks in [`LIVE_STATES`].
    pub fn live() -> Self {
        Self::default().with_statuses(LIVE_STATES.iter().copied())
    }

    /// Query for tasks in [`ACTIVE_STATES`].
    pub fn active() -> Self {
        Self::default().with_statuses(ACTIVE_STATES.iter().copied())
    }

    /// Restrict to the given jobs.
    pub fn with_job_keys<I>(mut self, job_keys: I) -> Self
    where
        I: IntoIterator<Item = JobKey>,
    {
        self.job_keys = Some(job_keys.into_iter().collect());
        self
    }

    /// Restrict to tasks on the given hosts.
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to the given instances.
    pub fn with_instances<I>(mut self, instance_ids: I) -> Self
    where
        I: IntoIterator<Item = InstanceId>,
    {
        self.instance_ids = Some(instance_ids.into_iter().collect());
        self
    }

    /// Replace the status filter.
    pub fn with_statuses<I>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = ScheduleStatus>,
    {
        self.statuses = statuses.into_iter().collect();
        self
    }

    /// Returns true if the task passes every filter set on this query.
    pub fn matches(&self, task: &TaskRecord) -> bool {
        if let Some(job_keys) = &self.job_keys {
            if !job_keys.contains(&task.job_key) {
                return false;
            }
        }

        if let Some(hosts) = &self.hosts {
            if !hosts.contains(&task.host) {
                return false;
            }
        }

        if let Some(instance_ids) = &self.instance_ids {
            if !instance_ids.contains(&task.instance_id) {
                return false;
            }
        }

        self.statuses.is_empty() || self.statuses.contains(&task.status)
    }
}
