//! Scheduler-backed entry point to the SLA engine.

use std::collections::BTreeSet;
use std::sync::Arc;

use drover_id::{Cluster, JobKey};
use drover_tasks::{Clock, SchedulerQuery, TaskQuery, TaskRecord};
use tracing::{debug, instrument, warn};

use crate::domain::DomainAnalyzer;
use crate::grouping::NamedGrouping;
use crate::{SlaError, SlaResult, UptimeVector};

/// Minimum instance count applied by [`Sla::check_hosts`].
pub const CHECK_HOSTS_MIN_INSTANCE_COUNT: usize = 20;

/// Builds uptime vectors and domain analyzers from live scheduler state.
pub struct Sla<S> {
    scheduler: S,
    clock: Arc<dyn Clock>,
}

impl<S: SchedulerQuery> Sla<S> {
    pub fn new(scheduler: S, clock: Arc<dyn Clock>) -> Self {
        Self { scheduler, clock }
    }

    /// Uptime vector over the LIVE tasks of one job.
    #[instrument(skip(self, job), fields(job = %job))]
    pub async fn job_uptime_vector(&self, job: &JobKey) -> SlaResult<UptimeVector> {
        let query = TaskQuery::live().with_job_keys([job.clone()]);
        let tasks = self.scheduler.query_tasks(&query).await?;
        debug!(tasks = tasks.len(), "fetched job tasks");

        Ok(UptimeVector::new(&tasks, self.clock.now()))
    }

    /// Domain analyzer over the LIVE tasks of `cluster`.
    ///
    /// With `hosts`, the analyzer covers every job with a task on those hosts
    /// and filters to them; a host query failure is returned as an error.
    /// Without `hosts`, or with an empty set, the whole cluster is analyzed
    /// and a failed query yields an analyzer with no tasks.
    #[instrument(skip(self, cluster, hosts), fields(cluster = %cluster, hosts = hosts.map_or(0, |h| h.len())))]
    pub async fn domain_uptime_vector(
        &self,
        cluster: &Cluster,
        min_instance_count: usize,
        hosts: Option<&BTreeSet<String>>,
    ) -> SlaResult<DomainAnalyzer> {
        let hosts = hosts.filter(|hosts| !hosts.is_empty());
        let tasks = match hosts {
            Some(hosts) => self.tasks_for_hosts(cluster, hosts).await?,
            None => match self.scheduler.query_tasks(&TaskQuery::live()).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!(error = %e, "cluster task query failed, analyzing no tasks");
                    Vec::new()
                }
            },
        };

        let tasks = in_cluster(cluster, tasks);
        Ok(DomainAnalyzer::new(
            tasks,
            self.clock.now(),
            min_instance_count,
            hosts.cloned(),
        ))
    }

    /// Hosts among `hosts` that are not safe to take down together.
    ///
    /// When the grouping puts the hosts in more than one group, every host
    /// is reported: groups are only safe one at a time.
    #[instrument(skip(self, cluster, hosts, grouping), fields(cluster = %cluster, grouping = grouping.name()))]
    pub async fn check_hosts(
        &self,
        cluster: &Cluster,
        hosts: &BTreeSet<String>,
        percentage: f64,
        duration_secs: i64,
        grouping: &NamedGrouping,
    ) -> SlaResult<BTreeSet<String>> {
        if !(percentage > 0.0 && percentage <= 100.0) {
            return Err(SlaError::InvalidPercentage(percentage));
        }

        let analyzer = self
            .domain_uptime_vector(cluster, CHECK_HOSTS_MIN_INSTANCE_COUNT, Some(hosts))
            .await?;
        let groups = analyzer.probe_hosts(percentage, duration_secs, grouping)?;

        if groups.len() > 1 {
            warn!(groups = groups.len(), "hosts span more than one group, all are unsafe");
            return Ok(hosts.clone());
        }

        Ok(crate::report::unsafe_hosts(&groups))
    }

    async fn tasks_for_hosts(
        &self,
        cluster: &Cluster,
        hosts: &BTreeSet<String>,
    ) -> SlaResult<Vec<TaskRecord>> {
        let on_hosts = self
            .scheduler
            .query_tasks(&TaskQuery::live().with_hosts(hosts.iter().cloned()))
            .await?;

        let job_keys: BTreeSet<JobKey> = in_cluster(cluster, on_hosts)
            .into_iter()
            .map(|task| task.job_key)
            .collect();
        if job_keys.is_empty() {
            debug!("no jobs on requested hosts");
            return Ok(Vec::new());
        }

        debug!(jobs = job_keys.len(), "fetching tasks of jobs on requested hosts");
        Ok(self
            .scheduler
            .query_tasks(&TaskQuery::live().with_job_keys(job_keys))
            .await?)
    }
}

fn in_cluster(cluster: &Cluster, tasks: Vec<TaskRecord>) -> Vec<TaskRecord> {
    let before = tasks.len();
    let tasks: Vec<_> = tasks
        .into_iter()
        .filter(|task| &task.job_key.cluster == cluster)
        .collect();
    if tasks.len() != before {
        debug!(dropped = before - tasks.len(), "ignored tasks of other clusters");
    }
    tasks
}
