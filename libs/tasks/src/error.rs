//! Error types for scheduler calls.

use thiserror::Error;

use crate::RpcResponse;

/// Errors returned by scheduler collaborators.
#[derive(Debug, Error, Clone)]
pub enum SchedulerError {
    /// The scheduler answered with a non-OK response code.
    #[error("scheduler returned {}: {}", .0.code, .0.message())]
    Response(RpcResponse),

    /// The request never reached the scheduler or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The scheduler answered with a body that could not be decoded.
    #[error("invalid scheduler response: {0}")]
    Decode(String),
}

impl SchedulerError {
    /// Returns the scheduler response carried by this error, if any.
    pub fn response(&self) -> Option<&RpcResponse> {
        match self {
            SchedulerError::Response(response) => Some(response),
            _ => None,
        }
    }

    /// Converts this error into a response value for reporting.
    ///
    /// Transport and decode failures become an `ERROR` response carrying the
    /// failure text.
    pub fn into_response(self) -> RpcResponse {
        match self {
            SchedulerError::Response(response) => response,
            other => RpcResponse::error(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Decode(err.to_string())
    }
}
