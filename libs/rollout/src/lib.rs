//! Rolling restarts.
//!
//! A [`Restarter`] restarts a job's instances in batches. After each batch an
//! [`InstanceWatcher`] reports which instances failed to become healthy;
//! those are re-queued until the [`FailureBudget`] is exhausted.
//!
//! The operation always ends in a [`RestartReport`]:
//!
//! - `Done`: every instance restarted and became healthy, or there was
//!   nothing to restart
//! - `Aborted`: the failure budget was exhausted
//! - `RpcFailed`: the scheduler rejected a restart or could not be reached
//! - `Cancelled`: the caller cancelled between batches

mod budget;
mod error;
mod health;
mod restart;
mod settings;
mod watcher;

pub use budget::FailureBudget;
pub use error::RolloutError;
pub use health::{Health, StatusHealthCheck};
pub use restart::{RestartOutcome, RestartReport, Restarter};
pub use settings::{
    RestartSettings, DEFAULT_BATCH_SIZE, DEFAULT_HEALTH_CHECK_INTERVAL, DEFAULT_RESTART_THRESHOLD,
    DEFAULT_WATCH_DURATION,
};
pub use watcher::{InstanceWatcher, StatusWatcher};
