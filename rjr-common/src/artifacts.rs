//! Artifact upload coordination.
//!
//! Uploads run in the background so workflows keep moving; the executor
//! awaits the accumulated tasks before it reports terminal status.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::ControlClient;
use crate::errors::RunnerError;
use crate::process::ProcessRunner;

/// Queues artifact uploads against the control server.
pub struct ArtifactUploader {
    client: ControlClient,
    pending: Mutex<Vec<JoinHandle<Result<(), RunnerError>>>>,
}

impl ArtifactUploader {
    pub fn new(client: ControlClient) -> Self {
        Self {
            client,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue a named text artifact for upload.
    pub fn upload_text(&self, name: &str, contents: String) {
        let client = self.client.clone();
        let name = name.to_string();
        self.pending.lock().push(tokio::spawn(async move {
            debug!(artifact = %name, bytes = contents.len(), "uploading text artifact");
            client.upload_text(&name, &contents).await
        }));
    }

    /// Queue a single file's bytes for upload.
    pub fn upload_file(&self, name: &str, path: PathBuf) {
        let client = self.client.clone();
        let name = name.to_string();
        self.pending.lock().push(tokio::spawn(async move {
            debug!(artifact = %name, path = %path.display(), "uploading file artifact");
            client.upload_file(&name, &path).await
        }));
    }

    /// Archive `dir` with an external `tar --zstd` invocation and queue
    /// the archive for upload as `<name>.tar.zst`.
    pub async fn upload_directory(
        &self,
        runner: &ProcessRunner,
        name: &str,
        dir: &Path,
    ) -> Result<(), RunnerError> {
        let archive_name = format!("{}.tar.zst", name.replace(['/', ' '], "_"));
        let archive = std::env::temp_dir().join(&archive_name);
        let archive_str = archive.to_string_lossy().to_string();
        let dir_str = dir.to_string_lossy().to_string();
        runner
            .run_checked(
                "tar",
                &["--zstd", "-cf", &archive_str, "-C", &dir_str, "."],
                None,
                None,
            )
            .await?;
        self.upload_file(&archive_name, archive);
        Ok(())
    }

    /// Await every queued upload. Failures are logged and the first one is
    /// returned after all tasks have settled.
    pub async fn flush(&self) -> Result<(), RunnerError> {
        let handles: Vec<_> = std::mem::take(&mut *self.pending.lock());
        let mut first_err = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, "artifact upload failed");
                    first_err.get_or_insert(err);
                }
                Err(join_err) => {
                    warn!(error = %join_err, "artifact upload task died");
                    first_err.get_or_insert(RunnerError::Upload(join_err.to_string()));
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
