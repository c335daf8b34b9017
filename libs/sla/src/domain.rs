//! Cluster-wide host-group safety analysis.
//!
//! [`DomainAnalyzer`] indexes the production tasks of a cluster by job and by
//! host, then answers whether taking a group of hosts down would push any
//! job below its uptime SLA.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use drover_id::JobKey;
use drover_tasks::TaskRecord;
use serde::Serialize;
use tracing::debug;

use crate::grouping::NamedGrouping;
use crate::{SlaResult, UptimeVector};

/// Jobs with fewer active instances than this are ignored by default.
pub const DEFAULT_MIN_INSTANCE_COUNT: usize = 2;

/// A job's uptime percentage over a duration.
///
/// Used both as the SLA a job must keep when a host group goes down and as
/// the predicted uptime reported for a safe group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobUptimeLimit {
    pub job: JobKey,
    pub percentage: f64,
    pub duration_secs: i64,
}

/// Predicted effect on one job of taking a host group down.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobUptimeDetails {
    pub job: JobKey,
    /// Predicted percentage of instances up for the duration.
    pub predicted_percentage: f64,
    pub safe: bool,
    /// Seconds until the SLA would be met again; `None` when it never can be.
    pub safe_in_secs: Option<i64>,
}

/// Per-host entries of one host group.
pub type HostGroupReport<T> = BTreeMap<String, Vec<T>>;

/// Outcome of simulating a set of hosts going down for one job.
#[derive(Debug, Clone)]
struct Simulation {
    percentage: f64,
    total_tasks: usize,
    vector: UptimeVector,
}

/// Analyzes host groups against job uptime SLAs.
///
/// Only production tasks of jobs with at least the minimum instance count
/// are indexed. All iteration is in key order, so results are stable for a
/// given input.
#[derive(Debug, Clone)]
pub struct DomainAnalyzer {
    now: DateTime<Utc>,
    tasks_by_job: BTreeMap<JobKey, Vec<TaskRecord>>,
    jobs_by_host: BTreeMap<String, BTreeSet<JobKey>>,
    hosts_by_job: BTreeMap<JobKey, BTreeSet<String>>,
    host_filter: Option<BTreeSet<String>>,
}

impl DomainAnalyzer {
    pub fn new(
        tasks: Vec<TaskRecord>,
        now: DateTime<Utc>,
        min_instance_count: usize,
        host_filter: Option<BTreeSet<String>>,
    ) -> Self {
        let mut tasks_by_job: BTreeMap<JobKey, Vec<TaskRecord>> = BTreeMap::new();
        for task in tasks.into_iter().filter(|task| task.is_production) {
            tasks_by_job.entry(task.job_key.clone()).or_default().push(task);
        }
        tasks_by_job.retain(|_, tasks| tasks.len() >= min_instance_count);

        let mut jobs_by_host: BTreeMap<String, BTreeSet<JobKey>> = BTreeMap::new();
        let mut hosts_by_job: BTreeMap<JobKey, BTreeSet<String>> = BTreeMap::new();
        for (job, tasks) in &tasks_by_job {
            for task in tasks {
                jobs_by_host
                    .entry(task.host.clone())
                    .or_default()
                    .insert(job.clone());
                hosts_by_job
                    .entry(job.clone())
                    .or_default()
                    .insert(task.host.clone());
            }
        }

        debug!(
            jobs = tasks_by_job.len(),
            hosts = jobs_by_host.len(),
            min_instance_count,
            "indexed production tasks"
        );

        Self {
            now,
            tasks_by_job,
            jobs_by_host,
            hosts_by_job,
            host_filter,
        }
    }

    /// An analyzer with no tasks.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), now, DEFAULT_MIN_INSTANCE_COUNT, None)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobKey> + '_ {
        self.tasks_by_job.keys()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> + '_ {
        self.jobs_by_host.keys().map(String::as_str)
    }

    pub fn jobs_on_host(&self, host: &str) -> Option<&BTreeSet<JobKey>> {
        self.jobs_by_host.get(host)
    }

    pub fn hosts_of_job(&self, job: &JobKey) -> Option<&BTreeSet<String>> {
        self.hosts_by_job.get(job)
    }

    /// Host groups that can all go down without any affected job dropping
    /// below its SLA.
    ///
    /// Every indexed host is grouped; a group's affected jobs are those on
    /// its hosts that pass the host filter. Each job is held to
    /// `job_limits[job]` when present, else to `percentage` over
    /// `duration_secs`. A group is rejected as soon as one job fails.
    pub fn safe_hosts(
        &self,
        percentage: f64,
        duration_secs: i64,
        job_limits: &BTreeMap<JobKey, JobUptimeLimit>,
        grouping: &NamedGrouping,
    ) -> SlaResult<Vec<HostGroupReport<JobUptimeLimit>>> {
        let all_hosts: BTreeSet<String> = self.jobs_by_host.keys().cloned().collect();
        let mut safe_groups = Vec::new();

        for (group_key, hosts) in grouping.partition(&all_hosts)? {
            let job_keys = self.affected_jobs(&hosts, self.host_filter.as_ref());
            let mut safe_hosts: HostGroupReport<JobUptimeLimit> = BTreeMap::new();
            let mut rejected = None;

            for job in &job_keys {
                let job_hosts = self.job_hosts_in(job, &hosts);
                let limit = job_limits.get(job).cloned().unwrap_or_else(|| JobUptimeLimit {
                    job: job.clone(),
                    percentage,
                    duration_secs,
                });

                let simulation = self.simulate_hosts_down(job, &job_hosts, limit.duration_secs);
                if simulation.percentage < limit.percentage {
                    rejected = Some((job, simulation.percentage, limit.percentage));
                    break;
                }

                let predicted = JobUptimeLimit {
                    job: job.clone(),
                    percentage: simulation.percentage,
                    duration_secs: limit.duration_secs,
                };
                for host in job_hosts {
                    safe_hosts.entry(host).or_default().push(predicted.clone());
                }
            }

            match rejected {
                Some((job, predicted, required)) => {
                    debug!(
                        group = %group_key,
                        job = %job,
                        predicted,
                        required,
                        "host group rejected"
                    );
                }
                None if !safe_hosts.is_empty() => safe_groups.push(safe_hosts),
                None => {}
            }
        }

        Ok(safe_groups)
    }

    /// Predict, for each filtered host group, the effect of taking it down
    /// on every job it runs.
    ///
    /// Only hosts in the host filter are probed; without a filter the result
    /// is empty.
    pub fn probe_hosts(
        &self,
        percentage: f64,
        duration_secs: i64,
        grouping: &NamedGrouping,
    ) -> SlaResult<Vec<HostGroupReport<JobUptimeDetails>>> {
        let Some(filter) = &self.host_filter else {
            return Ok(Vec::new());
        };

        let mut probed_groups = Vec::new();

        for (_, hosts) in grouping.partition(filter)? {
            let mut probed: HostGroupReport<JobUptimeDetails> = BTreeMap::new();

            for job in self.affected_jobs(&hosts, None) {
                let job_hosts = self.job_hosts_in(&job, &hosts);
                let simulation = self.simulate_hosts_down(&job, &job_hosts, duration_secs);
                let safe = simulation.percentage >= percentage;
                let safe_in_secs = if safe {
                    Some(0)
                } else {
                    simulation.vector.wait_time_to_sla(
                        percentage,
                        duration_secs,
                        Some(simulation.total_tasks),
                    )
                };

                let details = JobUptimeDetails {
                    job: job.clone(),
                    predicted_percentage: simulation.percentage,
                    safe,
                    safe_in_secs,
                };
                for host in job_hosts {
                    probed.entry(host).or_default().push(details.clone());
                }
            }

            if !probed.is_empty() {
                probed_groups.push(probed);
            }
        }

        Ok(probed_groups)
    }

    /// Jobs running on `hosts`, counting only hosts accepted by `filter`.
    fn affected_jobs(
        &self,
        hosts: &BTreeSet<String>,
        filter: Option<&BTreeSet<String>>,
    ) -> BTreeSet<JobKey> {
        hosts
            .iter()
            .filter(|host| filter.map_or(true, |filter| filter.contains(*host)))
            .filter_map(|host| self.jobs_by_host.get(host))
            .flatten()
            .cloned()
            .collect()
    }

    fn job_hosts_in(&self, job: &JobKey, hosts: &BTreeSet<String>) -> BTreeSet<String> {
        self.hosts_by_job
            .get(job)
            .map(|job_hosts| job_hosts.intersection(hosts).cloned().collect())
            .unwrap_or_default()
    }

    /// Uptime of `job` with its tasks on `hosts` removed, measured against
    /// the job's full task count.
    fn simulate_hosts_down(
        &self,
        job: &JobKey,
        hosts: &BTreeSet<String>,
        duration_secs: i64,
    ) -> Simulation {
        let tasks = self.tasks_by_job.get(job).map(Vec::as_slice).unwrap_or_default();
        let total_tasks = tasks.len();
        let vector = UptimeVector::new(
            tasks.iter().filter(|task| !hosts.contains(&task.host)),
            self.now,
        );

        Simulation {
            percentage: vector.task_up_count(duration_secs, Some(total_tasks)),
            total_tasks,
            vector,
        }
    }
}

#[cfg(test)]
mod tests {
    use drover_tasks::Clock;
    use drover_testing::{job_key, FakeClock, TaskBuilder};

    use super::*;
    use crate::grouping::{Groupings, KeyFn, GROUP_BY_HOST, GROUP_NONE};

    fn by_host() -> NamedGrouping {
        Groupings::default().get(GROUP_BY_HOST).unwrap()
    }

    fn by_rack() -> NamedGrouping {
        let mut groupings = Groupings::default();
        groupings.register(
            "by_rack",
            KeyFn::new(|host: &str| host.split('-').nth(1).unwrap_or(host).to_string()),
        );
        groupings.get("by_rack").unwrap()
    }

    fn hosts(names: &[&str]) -> Option<BTreeSet<String>> {
        Some(names.iter().map(|s| s.to_string()).collect())
    }

    fn host_names<T>(groups: &[HostGroupReport<T>]) -> Vec<Vec<&str>> {
        groups
            .iter()
            .map(|group| group.keys().map(String::as_str).collect())
            .collect()
    }

    /// Four instances of one job on h1..h4 with uptimes 100..400.
    fn four_hosts(now: DateTime<Utc>) -> Vec<TaskRecord> {
        (1..=4)
            .map(|i| TaskBuilder::running("west/r/prod/j1", i - 1, &format!("h{i}"), i as i64 * 100, now))
            .collect()
    }

    #[test]
    fn test_safe_hosts_single_job() {
        let now = FakeClock::new().now();
        let analyzer = DomainAnalyzer::new(four_hosts(now), now, 1, None);

        let groups = analyzer
            .safe_hosts(50.0, 200, &BTreeMap::new(), &by_host())
            .unwrap();

        // Losing h1 leaves three tasks at >= 200s (75%); losing h2..h4 leaves two (50%).
        assert_eq!(
            host_names(&groups),
            vec![vec!["h1"], vec!["h2"], vec!["h3"], vec!["h4"]]
        );
        assert_eq!(groups[0]["h1"][0].percentage, 75.0);
        assert_eq!(groups[0]["h1"][0].duration_secs, 200);
        for (i, host) in ["h2", "h3", "h4"].into_iter().enumerate() {
            assert_eq!(groups[i + 1][host][0].percentage, 50.0);
        }
    }

    #[test]
    fn test_safe_hosts_reports_predicted_percentage_under_override() {
        let now = FakeClock::new().now();
        let job = job_key("west/r/prod/j1");
        let analyzer = DomainAnalyzer::new(four_hosts(now), now, 1, None);
        let limits = BTreeMap::from([(
            job.clone(),
            JobUptimeLimit {
                job: job.clone(),
                percentage: 60.0,
                duration_secs: 150,
            },
        )]);

        let groups = analyzer.safe_hosts(99.0, 400, &limits, &by_host()).unwrap();

        // Only h1 down keeps 3/4 >= 150s; the record carries 75%, not the 60% limit.
        assert_eq!(host_names(&groups), vec![vec!["h1"]]);
        let record = &groups[0]["h1"][0];
        assert_eq!(record.job, job);
        assert_eq!(record.percentage, 75.0);
        assert_eq!(record.duration_secs, 150);
    }

    #[test]
    fn test_safe_hosts_rejects_all_below_threshold() {
        let now = FakeClock::new().now();
        let tasks = vec![
            TaskBuilder::running("west/r/prod/j1", 0, "h1", 100, now),
            TaskBuilder::running("west/r/prod/j1", 1, "h2", 200, now),
        ];
        let analyzer = DomainAnalyzer::new(tasks, now, 1, None);

        let groups = analyzer
            .safe_hosts(50.0, 400, &BTreeMap::new(), &by_host())
            .unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_safe_hosts_applies_job_override() {
        let now = FakeClock::new().now();
        let job = job_key("west/r/prod/j1");
        let analyzer = DomainAnalyzer::new(four_hosts(now), now, 1, None);
        let limits = BTreeMap::from([(
            job.clone(),
            JobUptimeLimit {
                job: job.clone(),
                percentage: 80.0,
                duration_secs: 150,
            },
        )]);

        let groups = analyzer.safe_hosts(50.0, 200, &limits, &by_host()).unwrap();

        // Only losing h1 (100s) keeps 3/4 >= 150s; that is still below 80%.
        assert!(groups.is_empty());
    }

    #[test]
    fn test_safe_hosts_first_failing_job_rejects_group() {
        let now = FakeClock::new().now();
        let tasks = vec![
            TaskBuilder::running("west/r/prod/a", 0, "h1", 500, now),
            TaskBuilder::running("west/r/prod/a", 1, "h2", 500, now),
            TaskBuilder::running("west/r/prod/b", 0, "h1", 500, now),
            TaskBuilder::running("west/r/prod/b", 1, "h3", 10, now),
        ];
        let analyzer = DomainAnalyzer::new(tasks, now, 1, None);

        let groups = analyzer
            .safe_hosts(50.0, 100, &BTreeMap::new(), &by_host())
            .unwrap();

        // h1 down: a keeps 50%, b drops to 0%. h2 down: a keeps 50%.
        // h3 down: b keeps 50%.
        assert_eq!(host_names(&groups), vec![vec!["h2"], vec!["h3"]]);
    }

    #[test]
    fn test_safe_hosts_by_rack() {
        let now = FakeClock::new().now();
        let tasks = vec![
            TaskBuilder::running("west/r/prod/j1", 0, "h-r1-1", 300, now),
            TaskBuilder::running("west/r/prod/j1", 1, "h-r1-2", 300, now),
            TaskBuilder::running("west/r/prod/j1", 2, "h-r2-1", 300, now),
            TaskBuilder::running("west/r/prod/j1", 3, "h-r2-2", 300, now),
            TaskBuilder::running("west/r/prod/j1", 4, "h-r3-1", 300, now),
            TaskBuilder::running("west/r/prod/j1", 5, "h-r3-2", 10, now),
        ];
        let analyzer = DomainAnalyzer::new(tasks, now, 1, None);

        let groups = analyzer
            .safe_hosts(50.0, 100, &BTreeMap::new(), &by_rack())
            .unwrap();

        // Losing r1 or r2 leaves 3/6 up; losing r3 leaves 4/6.
        assert_eq!(groups.len(), 3);
        assert_eq!(
            host_names(&groups)[0],
            vec!["h-r1-1", "h-r1-2"]
        );

        let groups = analyzer
            .safe_hosts(60.0, 100, &BTreeMap::new(), &by_rack())
            .unwrap();
        assert_eq!(host_names(&groups), vec![vec!["h-r3-1", "h-r3-2"]]);
    }

    #[test]
    fn test_safe_hosts_none_grouping() {
        let now = FakeClock::new().now();
        let analyzer = DomainAnalyzer::new(four_hosts(now), now, 1, None);
        let none = Groupings::default().get(GROUP_NONE).unwrap();

        let groups = analyzer.safe_hosts(50.0, 200, &BTreeMap::new(), &none).unwrap();
        assert!(groups.is_empty());

        let groups = analyzer.safe_hosts(0.0, 200, &BTreeMap::new(), &none).unwrap();
        assert_eq!(host_names(&groups), vec![vec!["h1", "h2", "h3", "h4"]]);
    }

    #[test]
    fn test_host_filter_limits_affected_jobs() {
        let now = FakeClock::new().now();
        let mut tasks = four_hosts(now);
        tasks.push(TaskBuilder::running("west/r/prod/j2", 0, "h5", 10, now));
        tasks.push(TaskBuilder::running("west/r/prod/j2", 1, "h6", 10, now));
        let analyzer = DomainAnalyzer::new(tasks, now, 1, hosts(&["h1", "h2"]));

        let groups = analyzer
            .safe_hosts(50.0, 200, &BTreeMap::new(), &by_host())
            .unwrap();
        assert_eq!(host_names(&groups), vec![vec!["h1"], vec!["h2"]]);
    }

    #[test]
    fn test_non_production_tasks_ignored() {
        let now = FakeClock::new().now();
        let tasks = vec![
            TaskBuilder::new("west/r/test/j1", 0, "h1")
                .production(false)
                .running_since(now, 10)
                .build(),
            TaskBuilder::new("west/r/test/j1", 1, "h2")
                .production(false)
                .running_since(now, 10)
                .build(),
        ];
        let analyzer = DomainAnalyzer::new(tasks, now, 1, None);

        assert_eq!(analyzer.jobs().count(), 0);
        assert_eq!(analyzer.hosts().count(), 0);
        assert!(analyzer
            .safe_hosts(50.0, 100, &BTreeMap::new(), &by_host())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_min_instance_count_filters_small_jobs() {
        let now = FakeClock::new().now();
        let mut tasks = four_hosts(now);
        tasks.push(TaskBuilder::running("west/r/prod/small", 0, "h9", 1, now));
        let analyzer = DomainAnalyzer::new(tasks, now, DEFAULT_MIN_INSTANCE_COUNT, None);

        assert_eq!(analyzer.jobs().count(), 1);
        assert!(analyzer.jobs_on_host("h9").is_none());
        assert_eq!(
            analyzer.hosts_of_job(&job_key("west/r/prod/j1")).map(BTreeSet::len),
            Some(4)
        );
    }

    #[test]
    fn test_probe_hosts() {
        let now = FakeClock::new().now();
        let analyzer = DomainAnalyzer::new(four_hosts(now), now, 1, hosts(&["h1", "h3"]));

        let groups = analyzer.probe_hosts(75.0, 200, &by_host()).unwrap();
        assert_eq!(host_names(&groups), vec![vec!["h1"], vec!["h3"]]);

        let h1 = &groups[0]["h1"][0];
        assert_eq!(h1.predicted_percentage, 75.0);
        assert!(h1.safe);
        assert_eq!(h1.safe_in_secs, Some(0));

        // Remaining uptimes 100, 200, 400 against a total of 4: the next
        // instance to cross 200s is the 100s one.
        let h3 = &groups[1]["h3"][0];
        assert_eq!(h3.predicted_percentage, 50.0);
        assert!(!h3.safe);
        assert_eq!(h3.safe_in_secs, Some(100));
    }

    #[test]
    fn test_probe_hosts_unreachable_sla() {
        let now = FakeClock::new().now();
        let analyzer = DomainAnalyzer::new(four_hosts(now), now, 1, hosts(&["h4"]));

        let groups = analyzer.probe_hosts(100.0, 100, &by_host()).unwrap();
        let details = &groups[0]["h4"][0];
        assert!(!details.safe);
        assert_eq!(details.safe_in_secs, None);
    }

    #[test]
    fn test_probe_hosts_skips_idle_hosts() {
        let now = FakeClock::new().now();
        let analyzer = DomainAnalyzer::new(four_hosts(now), now, 1, hosts(&["h1", "idle"]));

        let groups = analyzer.probe_hosts(50.0, 200, &by_host()).unwrap();
        assert_eq!(host_names(&groups), vec![vec!["h1"]]);
    }

    #[test]
    fn test_probe_without_filter_is_empty() {
        let now = FakeClock::new().now();
        let analyzer = DomainAnalyzer::new(four_hosts(now), now, 1, None);
        assert!(analyzer.probe_hosts(50.0, 200, &by_host()).unwrap().is_empty());
    }

    #[test]
    fn test_empty_analyzer() {
        let analyzer = DomainAnalyzer::empty(FakeClock::new().now());
        assert!(analyzer
            .safe_hosts(50.0, 100, &BTreeMap::new(), &by_host())
            .unwrap()
            .is_empty());
    }
}
