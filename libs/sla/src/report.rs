//! Flat, per-host rows for safe-host and probe results.

use std::collections::BTreeSet;
use std::fmt;

use drover_id::JobKey;
use serde::Serialize;

use crate::domain::{HostGroupReport, JobUptimeDetails, JobUptimeLimit};

/// One job on one host that can go down with its group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafeHostRow {
    pub host: String,
    pub job: JobKey,
    pub percentage: f64,
    pub duration_secs: i64,
}

impl fmt::Display for SafeHostRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{:.2}\t{}",
            self.host, self.job, self.percentage, self.duration_secs
        )
    }
}

/// Predicted effect on one job of taking one host's group down.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeRow {
    pub host: String,
    pub job: JobKey,
    pub predicted_percentage: f64,
    pub safe: bool,
    pub safe_in_secs: Option<i64>,
}

impl ProbeRow {
    /// Wait time as rendered: seconds, or `n/a` when the SLA is unreachable.
    pub fn safe_in(&self) -> String {
        match self.safe_in_secs {
            Some(secs) => secs.max(0).to_string(),
            None => "n/a".to_string(),
        }
    }
}

impl fmt::Display for ProbeRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{:.2}\t{}\t{}",
            self.host,
            self.job,
            self.predicted_percentage,
            self.safe,
            self.safe_in()
        )
    }
}

/// Flatten safe-host groups into rows, skipping `exclude`d hosts.
pub fn safe_host_rows(
    groups: &[HostGroupReport<JobUptimeLimit>],
    exclude: &BTreeSet<String>,
) -> Vec<SafeHostRow> {
    let mut rows = Vec::new();
    for group in groups {
        for (host, limits) in group {
            if exclude.contains(host) {
                continue;
            }
            rows.extend(limits.iter().map(|limit| SafeHostRow {
                host: host.clone(),
                job: limit.job.clone(),
                percentage: limit.percentage,
                duration_secs: limit.duration_secs,
            }));
        }
    }
    rows
}

/// Safe hosts in report order, skipping `exclude`d hosts.
pub fn safe_host_names(
    groups: &[HostGroupReport<JobUptimeLimit>],
    exclude: &BTreeSet<String>,
) -> Vec<String> {
    groups
        .iter()
        .flat_map(|group| group.keys())
        .filter(|host| !exclude.contains(*host))
        .cloned()
        .collect()
}

/// Flatten probe groups into rows; with `unsafe_only`, keep unsafe rows only.
pub fn probe_rows(groups: &[HostGroupReport<JobUptimeDetails>], unsafe_only: bool) -> Vec<ProbeRow> {
    let mut rows = Vec::new();
    for group in groups {
        for (host, jobs) in group {
            rows.extend(
                jobs.iter()
                    .filter(|details| !unsafe_only || !details.safe)
                    .map(|details| ProbeRow {
                        host: host.clone(),
                        job: details.job.clone(),
                        predicted_percentage: details.predicted_percentage,
                        safe: details.safe,
                        safe_in_secs: details.safe_in_secs,
                    }),
            );
        }
    }
    rows
}

/// Hosts with at least one job that would be pushed below its SLA.
pub fn unsafe_hosts(groups: &[HostGroupReport<JobUptimeDetails>]) -> BTreeSet<String> {
    probe_rows(groups, true)
        .into_iter()
        .map(|row| row.host)
        .collect()
}
