//! Supervised execution of external processes with streamed output.
//!
//! Every workflow step is a subprocess; this runner merges the child's
//! stdout and stderr into the job log channel line-by-line, optionally
//! capturing lines for the caller, and bounds the wait on the job-wide
//! deadline token.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::RunnerError;
use crate::logchan::LogChannel;
use crate::util::mask_secrets;

/// Caller-supplied buffer that collects output lines. Both stream readers
/// append concurrently, so access goes through a lock.
pub type CaptureBuffer = Arc<Mutex<Vec<String>>>;

pub fn capture_buffer() -> CaptureBuffer {
    Arc::new(Mutex::new(Vec::new()))
}

/// Runs external commands under the job's deadline, forwarding their
/// output to the log channel.
#[derive(Clone)]
pub struct ProcessRunner {
    channel: Arc<LogChannel>,
    deadline: CancellationToken,
}

impl ProcessRunner {
    pub fn new(channel: Arc<LogChannel>, deadline: CancellationToken) -> Self {
        Self { channel, deadline }
    }

    /// Start `program` with `args`, stream both output pipes to the log
    /// channel (and into `capture` when provided), and await exit.
    ///
    /// Lines keep their order within each stream; no ordering holds
    /// between stdout and stderr. If the deadline expires first the wait
    /// is abandoned after a best-effort `start_kill` — the child (and any
    /// grandchildren it spawned) may survive the runner.
    pub async fn run(
        &self,
        program: &str,
        args: &[&str],
        workdir: Option<&Path>,
        capture: Option<CaptureBuffer>,
    ) -> Result<i32, RunnerError> {
        let cmdline = mask_secrets(&format!("{} {}", program, args.join(" ")));
        self.channel.push(format!("$ {cmdline}"));
        debug!(command = %cmdline, "spawning process");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Io(std::io::Error::other("stdout was not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::Io(std::io::Error::other("stderr was not piped")))?;

        let stdout_task = tokio::spawn(consume_lines(
            stdout,
            Arc::clone(&self.channel),
            capture.clone(),
        ));
        let stderr_task = tokio::spawn(consume_lines(stderr, Arc::clone(&self.channel), capture));

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = self.deadline.cancelled() => None,
        };
        let Some(status) = waited else {
            warn!(command = %cmdline, "job deadline reached while waiting for process");
            let _ = child.start_kill();
            return Err(RunnerError::DeadlineExceeded);
        };
        let status = status?;

        // The readers finish once the pipes close.
        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let code = status.code().unwrap_or(-1);
        debug!(command = %cmdline, code, "process finished");
        Ok(code)
    }

    /// Run and require a zero exit status.
    pub async fn run_checked(
        &self,
        program: &str,
        args: &[&str],
        workdir: Option<&Path>,
        capture: Option<CaptureBuffer>,
    ) -> Result<(), RunnerError> {
        let code = self.run(program, args, workdir, capture).await?;
        if code != 0 {
            return Err(RunnerError::ProcessFailed {
                command: format!("{} {}", program, args.join(" ")),
                code,
            });
        }
        Ok(())
    }
}

async fn consume_lines<R>(stream: R, channel: Arc<LogChannel>, capture: Option<CaptureBuffer>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(buffer) = &capture {
            buffer.lock().push(line.clone());
        }
        channel.push(line);
    }
}
