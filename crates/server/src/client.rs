// crates/server/src/client.rs
//! reqwest-backed [`JobApi`] against the dashboard backend.
//!
//! Endpoints (relative to the configured base URL):
//! - POST /api/jobs/{kind}/start?credential_id=…
//! - GET  /api/jobs/status/{job_id}
//! - GET  /api/jobs/{kind}/latest?credential_id=…
//! - POST /api/jobs/{kind}/generate  `{credential_id, pending_report_id}`

use std::time::Duration;

use adsdesk_jobs::{ContextId, GenerateResponse, JobApi, JobApiError, JobKind, RemoteJob, StartedJob};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub struct HttpJobApi {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    credential_id: &'a str,
    pending_report_id: Option<&'a str>,
}

impl HttpJobApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), JobApiError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                JobApiError::Transport("request timed out".to_string())
            } else {
                JobApiError::Transport(e.to_string())
            }
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| JobApiError::Transport(e.to_string()))?;
        Ok((status, body))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, JobApiError> {
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        decode(&body)
    }
}

/// Map a non-2xx answer, preferring the backend's own message.
fn status_error(status: StatusCode, body: &str) -> JobApiError {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["detail", "error", "message"]
            .into_iter()
            .find_map(|key| json.get(key).and_then(Value::as_str).map(str::to_string))
    });
    let message = detail
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| {
            format!(
                "Job API returned {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("error")
            )
        });
    tracing::warn!(status = status.as_u16(), message = %message, "Job API request rejected");
    JobApiError::Status {
        status: status.as_u16(),
        message,
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, JobApiError> {
    serde_json::from_str(body).map_err(|e| JobApiError::Decode(e.to_string()))
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn start(&self, kind: JobKind, context: &ContextId) -> Result<StartedJob, JobApiError> {
        let request = self
            .client
            .post(self.url(&format!("/api/jobs/{kind}/start")))
            .query(&[("credential_id", context.as_str())]);
        self.fetch(request).await
    }

    async fn status(&self, job_id: &str) -> Result<RemoteJob, JobApiError> {
        let request = self.client.get(self.url(&format!("/api/jobs/status/{job_id}")));
        self.fetch(request).await
    }

    async fn latest(&self, kind: JobKind, context: &ContextId) -> Result<Option<RemoteJob>, JobApiError> {
        let request = self
            .client
            .get(self.url(&format!("/api/jobs/{kind}/latest")))
            .query(&[("credential_id", context.as_str())]);
        let (status, body) = self.send(request).await?;
        // No job of this kind yet.
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        decode(&body)
    }

    async fn generate(
        &self,
        kind: JobKind,
        context: &ContextId,
        pending_token: Option<&str>,
    ) -> Result<GenerateResponse, JobApiError> {
        let request = self
            .client
            .post(self.url(&format!("/api/jobs/{kind}/generate")))
            .json(&GenerateRequest {
                credential_id: context.as_str(),
                pending_report_id: pending_token,
            });
        self.fetch(request).await
    }
}
