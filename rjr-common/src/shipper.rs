//! Batch shipment of buffered log lines to the control server.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::RunnerError;
use crate::logchan::LogChannel;
use crate::types::LogLine;

/// Transport seam for shipping one batch of lines.
#[async_trait]
pub trait LogTransport: Send + Sync + 'static {
    async fn ship(&self, lines: &[LogLine]) -> Result<(), RunnerError>;
}

/// Drains the log channel and forwards batches until the channel completes
/// or shipping fails.
pub struct LogShipper<T: LogTransport> {
    channel: Arc<LogChannel>,
    transport: Arc<T>,
}

impl<T: LogTransport> LogShipper<T> {
    pub fn new(channel: Arc<LogChannel>, transport: Arc<T>) -> Self {
        Self { channel, transport }
    }

    /// Run until the channel completes. On a transport error the channel is
    /// faulted and shipping stops; there is no retry at this layer — the
    /// executor reports the fault through a local artifact instead.
    pub async fn run(self) {
        while let Some(batch) = self.channel.drain_batch().await {
            debug!(lines = batch.len(), "shipping log batch");
            if let Err(err) = self.transport.ship(&batch).await {
                warn!(error = %err, "log shipment failed, faulting channel");
                self.channel.fault(err.to_string());
                return;
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
