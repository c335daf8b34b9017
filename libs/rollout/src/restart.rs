//! Batched rolling restart.

use std::collections::VecDeque;
use std::fmt;

use drover_id::{InstanceId, JobKey};
use drover_tasks::{RpcResponse, SchedulerMutate, SchedulerQuery, TaskQuery};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::{FailureBudget, InstanceWatcher, RestartSettings, RolloutError};

/// How a rolling restart ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartOutcome {
    /// Every instance restarted and became healthy, or there was nothing to do.
    Done,
    /// The failure budget was exhausted.
    Aborted,
    /// A restart RPC was rejected or could not be delivered.
    RpcFailed,
    /// Cancelled between batches.
    Cancelled,
}

impl RestartOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for RestartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::RpcFailed => "rpc failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Structured result of a rolling restart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestartReport {
    pub outcome: RestartOutcome,
    /// Last restart RPC response, or OK when no RPC was issued.
    pub response: RpcResponse,
    /// Number of batches sent to the scheduler.
    pub batches: usize,
    pub total_failures: u32,
    /// Instances left pending when the operation stopped, in queue order.
    pub pending: Vec<InstanceId>,
}

/// Restarts a job's instances in batches, watching each batch before the next.
///
/// Failed instances are re-queued at the end of the pending list until the
/// failure budget is exhausted.
pub struct Restarter<S, W> {
    job: JobKey,
    settings: RestartSettings,
    scheduler: S,
    watcher: W,
    cancel: Option<watch::Receiver<bool>>,
}

impl<S, W> Restarter<S, W>
where
    S: SchedulerQuery + SchedulerMutate,
    W: InstanceWatcher,
{
    pub fn new(
        job: JobKey,
        settings: RestartSettings,
        scheduler: S,
        watcher: W,
    ) -> Result<Self, RolloutError> {
        settings.validate()?;
        Ok(Self {
            job,
            settings,
            scheduler,
            watcher,
            cancel: None,
        })
    }

    /// Stop before the next batch once `cancel` turns true.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Restart `instances`, or every active instance when empty.
    #[instrument(skip(self, instances), fields(job = %self.job, batch_size = self.settings.batch_size))]
    pub async fn restart(&self, instances: &[InstanceId]) -> Result<RestartReport, RolloutError> {
        let active = self
            .scheduler
            .query_tasks(&TaskQuery::active().with_job_keys([self.job.clone()]))
            .await?;

        let mut ids: Vec<InstanceId> = if instances.is_empty() {
            active.iter().map(|task| task.instance_id).collect()
        } else {
            instances.to_vec()
        };
        ids.sort_unstable();
        ids.dedup();
        let mut pending: VecDeque<InstanceId> = ids.into();

        if pending.is_empty() {
            info!("no instances specified and no active instances found, nothing to do");
            return Ok(self.report(RestartOutcome::Done, RpcResponse::ok(), 0, 0, pending));
        }

        info!(instances = ?pending, "performing rolling restart");

        let mut budget = FailureBudget::new(
            self.settings.max_per_instance_failures,
            self.settings.max_total_failures,
        );
        let mut response = RpcResponse::ok();
        let mut batches = 0;

        while !pending.is_empty() && !budget.is_exhausted() {
            if self.is_cancelled() {
                warn!(pending = pending.len(), "rolling restart cancelled");
                return Ok(self.report(
                    RestartOutcome::Cancelled,
                    response,
                    batches,
                    budget.total_failures(),
                    pending,
                ));
            }

            let take = self.settings.batch_size.min(pending.len());
            let batch: Vec<InstanceId> = pending.drain(..take).collect();
            info!(batch = ?batch, "restarting instances");

            batches += 1;
            response = match self.scheduler.restart_instances(&self.job, &batch).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            };
            if !response.is_ok() {
                error!(
                    code = %response.code,
                    message = %response.message(),
                    "error restarting instances"
                );
                pending.extend(batch);
                return Ok(self.report(
                    RestartOutcome::RpcFailed,
                    response,
                    batches,
                    budget.total_failures(),
                    pending,
                ));
            }

            let failed: Vec<InstanceId> = self
                .watcher
                .watch(&self.job, &batch)
                .await
                .into_iter()
                .collect();
            if !failed.is_empty() {
                warn!(failed = ?failed, "instances failed to become healthy");
            }

            budget.record_failures(&failed);
            pending.extend(failed);
        }

        let outcome = if budget.is_exhausted() {
            warn!(
                total_failures = budget.total_failures(),
                "restart failure threshold reached, aborting"
            );
            RestartOutcome::Aborted
        } else {
            info!(batches, "all instances restarted successfully");
            RestartOutcome::Done
        };

        Ok(self.report(outcome, response, batches, budget.total_failures(), pending))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|cancel| *cancel.borrow())
    }

    fn report(
        &self,
        outcome: RestartOutcome,
        response: RpcResponse,
        batches: usize,
        total_failures: u32,
        pending: VecDeque<InstanceId>,
    ) -> RestartReport {
        RestartReport {
            outcome,
            response,
            batches,
            total_failures,
            pending: pending.into(),
        }
    }
}
