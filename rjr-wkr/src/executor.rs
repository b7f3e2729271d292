//! Job lifecycle orchestration.
//!
//! One executor owns one job: the metadata, the log pipeline, the
//! deadline token, and the accumulated upload tasks. The final flush
//! always runs, whatever the workflow did.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rjr_common::RunnerConfig;
use rjr_common::artifacts::ArtifactUploader;
use rjr_common::client::ControlClient;
use rjr_common::logchan::{HeartbeatConfig, LogChannel};
use rjr_common::process::ProcessRunner;
use rjr_common::shipper::LogShipper;
use rjr_common::types::JobMetadata;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::workflows;

/// Everything a workflow needs from the engine, passed by reference so
/// the executor keeps ownership for the whole job.
pub struct JobContext {
    pub metadata: JobMetadata,
    pub channel: Arc<LogChannel>,
    pub runner: ProcessRunner,
    pub uploader: ArtifactUploader,
    pub work_dir: PathBuf,
}

/// Drives one job from metadata fetch to final flush.
pub struct JobExecutor {
    config: RunnerConfig,
    job_id: String,
    client: ControlClient,
    channel: Arc<LogChannel>,
    deadline: CancellationToken,
}

impl JobExecutor {
    pub fn new(config: RunnerConfig, job_id: String) -> Result<Self> {
        let client = ControlClient::new(&config.control_url, &job_id)?;
        Ok(Self {
            config,
            job_id,
            client,
            channel: LogChannel::new(),
            deadline: CancellationToken::new(),
        })
    }

    pub async fn run(self) -> Result<()> {
        // Every suspend point in the engine selects on this token.
        let deadline = self.deadline.clone();
        let limit = self.config.deadline();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            deadline.cancel();
        });

        let heartbeat = self.channel.spawn_heartbeat(HeartbeatConfig::default());
        let shipper =
            LogShipper::new(Arc::clone(&self.channel), Arc::new(self.client.clone())).spawn();

        let result = self.execute().await;

        // Terminal status goes out on the stream, best-effort: the
        // channel may already be faulted, in which case these are no-ops.
        if let Err(err) = &result {
            self.channel.push(format!("ERROR: {err:#}"));
        }
        let dropped = self.channel.dropped();
        if dropped > 0 {
            self.channel
                .push(format!("[runner] {dropped} log lines dropped under backpressure"));
        }
        let status = if result.is_ok() { "succeeded" } else { "failed" };
        self.channel
            .push(format!("[runner] job {} {status}", self.job_id));

        // Orderly shutdown: cut off producers, join the heartbeat so no
        // synthetic line can land late, then let the shipper finish the
        // final flush.
        self.channel.complete();
        let _ = heartbeat.await;
        let _ = shipper.await;
        timer.abort();

        if let Some(reason) = self.channel.fault_reason() {
            // The remote sink is unusable; leave a local marker so the
            // failure is diagnosable from the worker itself.
            self.write_crash_marker(&reason);
        }

        result
    }

    async fn execute(&self) -> Result<()> {
        let metadata = self
            .client
            .fetch_metadata()
            .await
            .context("metadata fetch")?;
        let kind = metadata.kind()?;
        info!(kind = %kind, "dispatching workflow");
        self.channel
            .push(format!("[runner] job {} started ({kind})", self.job_id));

        let work_dir = self.config.work_dir.join(&self.job_id);
        tokio::fs::create_dir_all(&work_dir)
            .await
            .with_context(|| format!("create work dir {}", work_dir.display()))?;

        let ctx = JobContext {
            metadata,
            runner: ProcessRunner::new(Arc::clone(&self.channel), self.deadline.clone()),
            uploader: ArtifactUploader::new(self.client.clone()),
            channel: Arc::clone(&self.channel),
            work_dir,
        };

        let workflow_result = workflows::dispatch(kind, &ctx).await;
        // Uploads queued before a failure still land; the first upload
        // error surfaces only when the workflow itself succeeded.
        let flush_result = ctx.uploader.flush().await.context("artifact uploads");
        workflow_result?;
        flush_result
    }

    fn write_crash_marker(&self, reason: &str) {
        let path = self.config.work_dir.join(format!("{}.crash", self.job_id));
        if let Err(err) = std::fs::create_dir_all(&self.config.work_dir)
            .and_then(|_| std::fs::write(&path, reason))
        {
            error!(error = %err, path = %path.display(), "failed to write crash marker");
        } else {
            error!(path = %path.display(), "log shipping faulted, wrote crash marker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> RunnerConfig {
        RunnerConfig {
            control_url: "http://localhost:9".to_string(),
            work_dir: dir.to_path_buf(),
            deadline_secs: 60,
        }
    }

    #[tokio::test]
    async fn test_crash_marker_lands_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let executor =
            JobExecutor::new(test_config(dir.path()), "job-7".to_string()).unwrap();
        executor.write_crash_marker("the transport died");

        let marker = dir.path().join("job-7.crash");
        let contents = std::fs::read_to_string(marker).unwrap();
        assert_eq!(contents, "the transport died");
    }

    #[tokio::test]
    async fn test_unreachable_control_server_fails_the_job() {
        // Port 9 (discard) refuses connections; the metadata fetch is the
        // first fatal step.
        let dir = tempfile::tempdir().unwrap();
        let executor =
            JobExecutor::new(test_config(dir.path()), "job-8".to_string()).unwrap();
        let err = executor.run().await.unwrap_err();
        assert!(format!("{err:#}").contains("metadata fetch"));
    }
}
