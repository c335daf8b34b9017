//! Scheduler response codes and collaborator interfaces.

use std::sync::Arc;

use async_trait::async_trait;
use drover_id::{InstanceId, JobKey};
use serde::{Deserialize, Serialize};

use crate::{SchedulerError, TaskQuery, TaskRecord};

/// Outcome code attached to every scheduler response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    InvalidRequest,
    Ok,
    Error,
    Warning,
    AuthFailed,
    LockError,
    ErrorTransient,
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::AuthFailed => "AUTH_FAILED",
            Self::LockError => "LOCK_ERROR",
            Self::ErrorTransient => "ERROR_TRANSIENT",
        };
        f.write_str(name)
    }
}

/// Response code plus the human-readable details the scheduler attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub code: ResponseCode,

    #[serde(default)]
    pub messages: Vec<String>,
}

impl RpcResponse {
    pub fn new(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            messages: vec![message.into()],
        }
    }

    /// A successful response without details.
    pub fn ok() -> Self {
        Self {
            code: ResponseCode::Ok,
            messages: Vec::new(),
        }
    }

    /// A generic error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::Error, message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }

    /// All detail messages joined with `, `.
    pub fn message(&self) -> String {
        if self.messages.is_empty() {
            "no details".to_string()
        } else {
            self.messages.join(", ")
        }
    }
}

/// Read side of the scheduler.
///
/// Implementations return `Err(SchedulerError::Response(..))` when the
/// scheduler answers with a non-OK code; that must never be reported as an
/// empty task list.
#[async_trait]
pub trait SchedulerQuery: Send + Sync {
    async fn query_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRecord>, SchedulerError>;
}

/// Write side of the scheduler.
///
/// A decoded response is returned as `Ok` whatever its code; the caller
/// decides what a non-OK code means. `Err` is reserved for transport and
/// decode failures.
#[async_trait]
pub trait SchedulerMutate: Send + Sync {
    /// Restart exactly the given instances of a job.
    async fn restart_instances(
        &self,
        job_key: &JobKey,
        instances: &[InstanceId],
    ) -> Result<RpcResponse, SchedulerError>;
}

#[async_trait]
impl<T: SchedulerQuery + ?Sized> SchedulerQuery for Arc<T> {
    async fn query_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRecord>, SchedulerError> {
        (**self).query_tasks(query).await
    }
}

#[async_trait]
impl<T: SchedulerMutate + ?Sized> SchedulerMutate for Arc<T> {
    async fn restart_instances(
        &self,
        job_key: &JobKey,
        instances: &[InstanceId],
    ) -> Result<RpcResponse, SchedulerError> {
        (**self).restart_instances(job_key, instances).await
    }
}
