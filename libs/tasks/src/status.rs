//! Task schedule status and the status sets queries are built from.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Init,
    Throttled,
    Pending,
    Assigned,
    Starting,
    Running,
    Finished,
    Preempting,
    Restarting,
    Draining,
    Failed,
    Killed,
    Killing,
    Lost,
}

/// Statuses of tasks that hold or are about to hold resources.
pub const ACTIVE_STATES: &[ScheduleStatus] = &[
    ScheduleStatus::Assigned,
    ScheduleStatus::Draining,
    ScheduleStatus::Killing,
    ScheduleStatus::Pending,
    ScheduleStatus::Preempting,
    ScheduleStatus::Restarting,
    ScheduleStatus::Running,
    ScheduleStatus::Starting,
    ScheduleStatus::Throttled,
];

/// Statuses of tasks that are running or winding down on a host.
pub const LIVE_STATES: &[ScheduleStatus] = &[
    ScheduleStatus::Killing,
    ScheduleStatus::Preempting,
    ScheduleStatus::Restarting,
    ScheduleStatus::Draining,
    ScheduleStatus::Running,
];

/// Statuses a task never leaves.
pub const TERMINAL_STATES: &[ScheduleStatus] = &[
    ScheduleStatus::Failed,
    ScheduleStatus::Finished,
    ScheduleStatus::Killed,
    ScheduleStatus::Lost,
];

impl ScheduleStatus {
    /// Returns true if the status is in [`ACTIVE_STATES`].
    pub fn is_active(&self) -> bool {
        ACTIVE_STATES.contains(self)
    }

    /// Returns true if the status is in [`LIVE_STATES`].
    pub fn is_live(&self) -> bool {
        LIVE_STATES.contains(self)
    }

    /// Returns true if the status is in [`TERMINAL_STATES`].
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATES.contains(self)
    }

    /// Upper-case name as used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Throttled => "THROTTLED",
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Preempting => "PREEMPTING",
            Self::Restarting => "RESTARTING",
            Self::Draining => "DRAINING",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
            Self::Killing => "KILLING",
            Self::Lost => "LOST",
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_states_are_active() {
        for status in LIVE_STATES {
            assert!(status.is_active(), "{status} should be active");
        }
    }

    #[test]
    fn test_terminal_states_disjoint_from_active() {
        for status in TERMINAL_STATES {
            assert!(!status.is_active());
            assert!(!status.is_live());
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ScheduleStatus::Running).unwrap();
        assert_eq!(json, "\"RUNNING\"");
        let parsed: ScheduleStatus = serde_json::from_str("\"KILLING\"").unwrap();
        assert_eq!(parsed, ScheduleStatus::Killing);
    }
}
