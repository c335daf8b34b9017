//! Rolling operation errors.
//!
//! Aborts and mid-rollout RPC failures are reported through
//! [`RestartOutcome`](crate::RestartOutcome), not as errors.

use drover_tasks::SchedulerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RolloutError {
    /// Restart settings failed validation.
    #[error("invalid restart settings: {0}")]
    InvalidSettings(String),

    /// The initial query for the job's active tasks failed.
    #[error("failed to query active tasks: {0}")]
    Query(#[from] SchedulerError),
}
