//! Instance health watching after a restart.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drover_id::{InstanceId, JobKey};
use drover_tasks::{Clock, ScheduleStatus, SchedulerQuery, TaskQuery, TaskRecord};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::health::StatusHealthCheck;
use crate::RestartSettings;

/// Waits for restarted instances to become healthy.
#[async_trait]
pub trait InstanceWatcher: Send + Sync {
    /// Watch `instances` of `job` until each is healthy or failed, returning
    /// the failed subset.
    async fn watch(&self, job: &JobKey, instances: &[InstanceId]) -> BTreeSet<InstanceId>;
}

#[async_trait]
impl<T: InstanceWatcher + ?Sized> InstanceWatcher for Arc<T> {
    async fn watch(&self, job: &JobKey, instances: &[InstanceId]) -> BTreeSet<InstanceId> {
        (**self).watch(job, instances).await
    }
}

/// Observed state of one watched instance.
#[derive(Debug, Clone, Copy)]
struct Observed {
    /// When the instance was first seen healthy; `None` if it never was.
    birthday_ms: Option<i64>,
    finished: bool,
    healthy: bool,
}

impl Observed {
    fn failed() -> Self {
        Self {
            birthday_ms: None,
            finished: true,
            healthy: false,
        }
    }
}

/// Polls the scheduler for RUNNING tasks and applies [`StatusHealthCheck`].
///
/// An instance is healthy once it has stayed RUNNING under one task ID for
/// the watch duration. It fails if it becomes unhealthy after being seen, if
/// its task is replaced, or if it is not seen healthy within the restart
/// threshold. A watch ends when every instance has finished, at
/// `restart_threshold + watch_duration`, or on [`terminate`].
///
/// [`terminate`]: StatusWatcher::terminate
pub struct StatusWatcher<S> {
    scheduler: S,
    clock: Arc<dyn Clock>,
    restart_threshold: Duration,
    watch_duration: Duration,
    health_check_interval: Duration,
    terminating: watch::Sender<bool>,
}

impl<S: SchedulerQuery> StatusWatcher<S> {
    pub fn new(scheduler: S, clock: Arc<dyn Clock>, settings: &RestartSettings) -> Self {
        let (terminating, _) = watch::channel(false);
        Self {
            scheduler,
            clock,
            restart_threshold: settings.restart_threshold,
            watch_duration: settings.watch_duration,
            health_check_interval: settings.health_check_interval,
            terminating,
        }
    }

    /// Stop the current and any later watch at the next poll boundary.
    ///
    /// Unfinished instances are reported failed.
    pub fn terminate(&self) {
        self.terminating.send_replace(true);
    }

    pub fn is_terminating(&self) -> bool {
        *self.terminating.borrow()
    }

    async fn running_tasks(
        &self,
        job: &JobKey,
        instances: &BTreeSet<InstanceId>,
    ) -> BTreeMap<InstanceId, TaskRecord> {
        let query = TaskQuery::default()
            .with_job_keys([job.clone()])
            .with_statuses([ScheduleStatus::Running])
            .with_instances(instances.iter().copied());

        match self.scheduler.query_tasks(&query).await {
            Ok(tasks) => tasks
                .into_iter()
                .map(|task| (task.instance_id, task))
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to query running tasks");
                BTreeMap::new()
            }
        }
    }
}

#[async_trait]
impl<S: SchedulerQuery> InstanceWatcher for StatusWatcher<S> {
    #[instrument(skip(self, job, instances), fields(job = %job, instances = ?instances))]
    async fn watch(&self, job: &JobKey, instances: &[InstanceId]) -> BTreeSet<InstanceId> {
        let watched: BTreeSet<InstanceId> = instances.iter().copied().collect();
        let mut health_check = StatusHealthCheck::new();
        let mut states: BTreeMap<InstanceId, Observed> = BTreeMap::new();
        let mut terminating = self.terminating.subscribe();

        let threshold_ms = millis(self.restart_threshold);
        let watch_ms = millis(self.watch_duration);
        let start = self.clock.now_ms();
        let expected_healthy_by = start.saturating_add(threshold_ms);
        let max_time = expected_healthy_by.saturating_add(watch_ms);

        info!("watching instances");

        loop {
            if *terminating.borrow() {
                warn!("watch terminated");
                return not_healthy(&watched, &states);
            }

            let running = self.running_tasks(job, &watched).await;
            let now = self.clock.now_ms();

            for instance in &watched {
                if states.get(instance).is_some_and(|state| state.finished) {
                    continue;
                }

                let health = running.get(instance).map(|task| health_check.health(task));
                match health {
                    Some(health) if health.healthy => {
                        let state = states.entry(*instance).or_insert(Observed {
                            birthday_ms: Some(now),
                            finished: false,
                            healthy: false,
                        });
                        let birthday = state.birthday_ms.unwrap_or(now);
                        if now > birthday.saturating_add(watch_ms) {
                            info!(instance = %instance, "instance healthy for the watch duration");
                            state.healthy = true;
                            state.finished = true;
                        }
                    }
                    other => {
                        let retriable = other.map_or(true, |health| health.retriable);
                        if let Some(state) = states.get_mut(instance) {
                            info!(instance = %instance, "instance became unhealthy");
                            state.healthy = false;
                            state.finished = true;
                        } else if now > expected_healthy_by || !retriable {
                            info!(
                                instance = %instance,
                                threshold_secs = self.restart_threshold.as_secs(),
                                "instance not healthy within restart threshold"
                            );
                            states.insert(*instance, Observed::failed());
                        }
                    }
                }
            }

            debug!(states = ?states, "instance health");

            if watched
                .iter()
                .all(|instance| states.get(instance).is_some_and(|state| state.finished))
            {
                return not_healthy(&watched, &states);
            }

            if now > max_time {
                warn!("watch timed out");
                return not_healthy(&watched, &states);
            }

            tokio::select! {
                _ = self.clock.sleep(self.health_check_interval) => {}
                _ = terminating.changed() => {}
            }
        }
    }
}

fn not_healthy(
    watched: &BTreeSet<InstanceId>,
    states: &BTreeMap<InstanceId, Observed>,
) -> BTreeSet<InstanceId> {
    watched
        .iter()
        .filter(|instance| !states.get(*instance).is_some_and(|state| state.healthy))
        .copied()
        .collect()
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
