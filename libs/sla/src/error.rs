//! SLA engine errors.

use drover_tasks::SchedulerError;
use thiserror::Error;

/// Errors raised by the SLA engine.
#[derive(Debug, Error)]
pub enum SlaError {
    /// Percentile outside the open interval (0, 100).
    #[error("percentile must be within (0, 100), got {0}")]
    InvalidPercentile(f64),

    /// SLA percentage outside (0, 100].
    #[error("percentage must be within (0, 100], got {0}")]
    InvalidPercentage(f64),

    /// No grouping registered under the requested name.
    #[error("unknown grouping function '{name}', must be one of: {known}")]
    UnknownGrouping { name: String, known: String },

    /// A grouping function did not partition its input hosts.
    #[error("grouping '{grouping}' does not partition its input: {reason}")]
    InvalidPartition { grouping: String, reason: String },

    /// The scheduler query behind a vector failed.
    #[error("task query failed: {0}")]
    Scheduler(#[from] SchedulerError),
}

pub type SlaResult<T> = Result<T, SlaError>;
