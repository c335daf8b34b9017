//! Uptime SLA engine.
//!
//! [`UptimeVector`] answers percentile questions about one job's instances.
//! [`DomainAnalyzer`] applies those answers across a cluster to decide which
//! host groups can be taken down without breaking any job's SLA, and
//! [`Sla`] builds both from a live scheduler.

mod domain;
mod error;
mod grouping;
pub mod report;
mod sla;
mod uptime;

pub use domain::{
    DomainAnalyzer, HostGroupReport, JobUptimeDetails, JobUptimeLimit, DEFAULT_MIN_INSTANCE_COUNT,
};
pub use error::{SlaError, SlaResult};
pub use grouping::{
    partition, Groupings, HostGrouping, HostGroups, KeyFn, NamedGrouping, PerHost, SingleGroup,
    ALL_HOSTS_GROUP, GROUP_BY_HOST, GROUP_NONE,
};
pub use sla::{Sla, CHECK_HOSTS_MIN_INSTANCE_COUNT};
pub use uptime::UptimeVector;
