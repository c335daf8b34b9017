//! HTTP client for the scheduler API.
//!
//! Every endpoint answers with the envelope
//! `{"code": "OK", "messages": [...], "result": {...}}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use drover_id::{InstanceId, JobKey};
use drover_tasks::{
    ResponseCode, RpcResponse, SchedulerError, SchedulerMutate, SchedulerQuery, TaskQuery,
    TaskRecord,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// Scheduler client over JSON HTTP.
#[derive(Debug, Clone)]
pub struct SchedulerClient {
    client: reqwest::Client,
    base_url: String,
}

impl SchedulerClient {
    /// Create a client for the scheduler at `api_url`.
    pub fn new(api_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST `body` and decode the response envelope.
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<Envelope<T>, SchedulerError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(url = %url, "scheduler request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SchedulerError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SchedulerError::Transport(e.to_string()))?;

        match serde_json::from_slice::<Envelope<T>>(&bytes) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(SchedulerError::Transport(format!(
                "HTTP {status} from {url}"
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

/// Response envelope shared by every scheduler endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: ResponseCode,

    #[serde(default)]
    messages: Vec<String>,

    result: Option<T>,
}

impl<T> Envelope<T> {
    fn response(&self) -> RpcResponse {
        RpcResponse {
            code: self.code,
            messages: self.messages.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TasksResult {
    #[serde(default)]
    tasks: Vec<TaskRecord>,
}

#[derive(Debug, Serialize)]
struct RestartRequest<'a> {
    instances: &'a [InstanceId],
}

#[async_trait]
impl SchedulerQuery for SchedulerClient {
    async fn query_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRecord>, SchedulerError> {
        let envelope: Envelope<TasksResult> = self.post("/api/tasks/query", query).await?;

        if envelope.code != ResponseCode::Ok {
            return Err(SchedulerError::Response(envelope.response()));
        }

        envelope
            .result
            .map(|result| result.tasks)
            .ok_or_else(|| SchedulerError::Decode("response has no result".to_string()))
    }
}

#[async_trait]
impl SchedulerMutate for SchedulerClient {
    async fn restart_instances(
        &self,
        job_key: &JobKey,
        instances: &[InstanceId],
    ) -> Result<RpcResponse, SchedulerError> {
        let path = format!(
            "/api/jobs/{}/{}/{}/{}/restart",
            job_key.cluster, job_key.role, job_key.environment, job_key.name
        );
        let envelope: Envelope<serde_json::Value> =
            self.post(&path, &RestartRequest { instances }).await?;

        Ok(envelope.response())
    }
}
