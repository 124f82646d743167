use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use shared::protocol::{SubmissionPayload, ANALYZE_PATH};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Raw reply from the report service; interpreting the status is left to the
/// submission controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("{0}")]
    Request(String),
}

#[async_trait]
pub trait ReportBackend: Send + Sync {
    async fn analyze(&self, payload: &SubmissionPayload)
        -> Result<BackendResponse, TransportError>;
}

pub struct HttpReportBackend {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpReportBackend {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint: analyze_endpoint(base_url),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        let detail = describe(&err);
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Connect(detail)
        } else {
            TransportError::Request(detail)
        }
    }
}

pub fn analyze_endpoint(base_url: &Url) -> String {
    format!("{}{ANALYZE_PATH}", base_url.as_str().trim_end_matches('/'))
}

#[async_trait]
impl ReportBackend for HttpReportBackend {
    async fn analyze(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<BackendResponse, TransportError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                let err = self.classify(err);
                warn!(endpoint = %self.endpoint, error = %err, "report request failed");
                err
            })?;

        let status = response.status().as_u16();
        let header_text = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header_text(header::CONTENT_TYPE);
        let content_disposition = header_text(header::CONTENT_DISPOSITION);

        let body = response
            .bytes()
            .await
            .map_err(|err| self.classify(err))?
            .to_vec();
        debug!(status, bytes = body.len(), "report service replied");

        Ok(BackendResponse {
            status,
            content_type,
            content_disposition,
            body,
        })
    }
}

fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
