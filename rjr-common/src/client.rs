//! HTTP client for the control server's job endpoints.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::errors::RunnerError;
use crate::shipper::LogTransport;
use crate::types::{JobMetadata, LogLine};

/// Wire shape of one shipped log line.
#[derive(Debug, Serialize)]
struct WireLogLine<'a> {
    timestamp: String,
    message: &'a str,
}

/// Client bound to one job id.
#[derive(Clone)]
pub struct ControlClient {
    http: Client,
    base_url: String,
    job_id: String,
}

impl ControlClient {
    pub fn new(base_url: &str, job_id: &str) -> Result<Self, RunnerError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(100))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            job_id: job_id.to_string(),
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/jobs/{}/{}", self.base_url, self.job_id, suffix)
    }

    fn artifact_endpoint(&self, name: &str) -> String {
        self.endpoint(&format!("artifacts/{}", urlencoding::encode(name)))
    }

    /// Fetch the job's metadata map. A failure here is fatal to the job.
    pub async fn fetch_metadata(&self) -> Result<JobMetadata, RunnerError> {
        let response = self
            .http
            .get(self.endpoint("metadata"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|err| RunnerError::MetadataFetch(err.to_string()))?;
        let map: HashMap<String, String> = response
            .json()
            .await
            .map_err(|err| RunnerError::MetadataFetch(err.to_string()))?;
        Ok(JobMetadata::from_map(map))
    }

    /// Upload a named text artifact.
    pub async fn upload_text(&self, name: &str, contents: &str) -> Result<(), RunnerError> {
        self.http
            .post(self.artifact_endpoint(name))
            .body(contents.to_string())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Upload a file's raw bytes as a named artifact.
    pub async fn upload_file(&self, name: &str, path: &Path) -> Result<(), RunnerError> {
        let bytes = tokio::fs::read(path).await?;
        self.http
            .post(self.artifact_endpoint(name))
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl LogTransport for ControlClient {
    async fn ship(&self, lines: &[LogLine]) -> Result<(), RunnerError> {
        let body: Vec<WireLogLine<'_>> = lines
            .iter()
            .map(|line| WireLogLine {
                timestamp: line.timestamp.to_rfc3339(),
                message: &line.message,
            })
            .collect();
        self.http
            .post(self.endpoint("logs"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
