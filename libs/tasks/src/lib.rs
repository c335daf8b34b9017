//! # drover-tasks
//!
//! Task snapshot model and the narrow interfaces drover consumes from the
//! scheduler.
//!
//! ## Design Principles
//!
//! - Task records are immutable snapshots owned by the query that fetched them
//! - Every task carries its chronological event log
//! - Upstream failures are typed and never silently become "no tasks"
//! - Time is read through an injectable [`Clock`]
//!
//! ## Collaborators
//!
//! - [`SchedulerQuery`]: fetch tasks by job keys, hosts and/or statuses
//! - [`SchedulerMutate`]: restart an exact set of instances
//! - [`Clock`]: `now()` and `sleep()`; [`SystemClock`] in production

mod clock;
mod error;
mod query;
mod scheduler;
mod status;
mod task;

pub use clock::{Clock, SystemClock};
pub use error::SchedulerError;
pub use query::TaskQuery;
pub use scheduler::{ResponseCode, RpcResponse, SchedulerMutate, SchedulerQuery};
pub use status::{ScheduleStatus, ACTIVE_STATES, LIVE_STATES, TERMINAL_STATES};
pub use task::{TaskEvent, TaskRecord};
