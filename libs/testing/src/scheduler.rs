//! In-memory scheduler.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use drover_id::{InstanceId, JobKey};
use drover_tasks::{
    RpcResponse, SchedulerError, SchedulerMutate, SchedulerQuery, TaskQuery, TaskRecord,
};
use parking_lot::Mutex;

/// A recorded restart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartCall {
    pub job_key: JobKey,
    pub instances: Vec<InstanceId>,
}

#[derive(Default)]
struct State {
    tasks: Vec<TaskRecord>,
    scripted_queries: VecDeque<Result<Vec<TaskRecord>, SchedulerError>>,
    scripted_restarts: VecDeque<Result<RpcResponse, SchedulerError>>,
    queries: Vec<TaskQuery>,
    restarts: Vec<RestartCall>,
}

/// Scheduler double answering queries from an in-memory task list.
///
/// Scripted results are consumed first, in order; once exhausted, queries
/// are answered by filtering the stored tasks and restarts succeed.
#[derive(Clone, Default)]
pub struct FakeScheduler {
    state: Arc<Mutex<State>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<TaskRecord>) -> Self {
        let scheduler = Self::new();
        scheduler.set_tasks(tasks);
        scheduler
    }

    /// Replace the stored task list.
    pub fn set_tasks(&self, tasks: Vec<TaskRecord>) {
        self.state.lock().tasks = tasks;
    }

    /// Queue the result of the next unscripted query.
    pub fn push_query_result(&self, result: Result<Vec<TaskRecord>, SchedulerError>) {
        self.state.lock().scripted_queries.push_back(result);
    }

    /// Queue the result of the next restart call.
    pub fn push_restart_result(&self, result: Result<RpcResponse, SchedulerError>) {
        self.state.lock().scripted_restarts.push_back(result);
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<TaskQuery> {
        self.state.lock().queries.clone()
    }

    /// Restart calls received so far.
    pub fn restarts(&self) -> Vec<RestartCall> {
        self.state.lock().restarts.clone()
    }
}

#[async_trait]
impl SchedulerQuery for FakeScheduler {
    async fn query_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRecord>, SchedulerError> {
        let mut state = self.state.lock();
        state.queries.push(query.clone());

        if let Some(result) = state.scripted_queries.pop_front() {
            return result;
        }

        Ok(state
            .tasks
            .iter()
            .filter(|task| query.matches(task))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SchedulerMutate for FakeScheduler {
    async fn restart_instances(
        &self,
        job_key: &JobKey,
        instances: &[InstanceId],
    ) -> Result<RpcResponse, SchedulerError> {
        let mut state = self.state.lock();
        state.restarts.push(RestartCall {
            job_key: job_key.clone(),
            instances: instances.to_vec(),
        });

        state
            .scripted_restarts
            .pop_front()
            .unwrap_or_else(|| Ok(RpcResponse::ok()))
    }
}
