//! Test doubles shared by the drover crates.
//!
//! - [`FakeClock`]: manually advanced clock; `sleep` advances instead of waiting
//! - [`FakeScheduler`]: in-memory [`SchedulerQuery`] + [`SchedulerMutate`]
//!   with scripted failures and call recording
//! - [`TaskBuilder`]: concise task record construction
//!
//! [`SchedulerQuery`]: drover_tasks::SchedulerQuery
//! [`SchedulerMutate`]: drover_tasks::SchedulerMutate

mod builders;
mod clock;
mod scheduler;

pub use builders::{job_key, TaskBuilder};
pub use clock::FakeClock;
pub use scheduler::{FakeScheduler, RestartCall};
