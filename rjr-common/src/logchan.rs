//! Bounded job log channel with drop-oldest overflow and heartbeat liveness.
//!
//! Every component that produces job output holds an `Arc<LogChannel>` and
//! pushes lines into it; the [`crate::shipper::LogShipper`] is the single
//! consumer. Producers never block and never observe an error: when the
//! queue is full the oldest unshipped line is discarded, and once the
//! channel has faulted pushes become no-ops.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::types::LogLine;

/// Default bound on unshipped lines.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Timing knobs for the heartbeat task.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often the heartbeat task checks for silence.
    pub poll_interval: Duration,
    /// How long the stream may stay silent before a synthetic line is sent.
    pub silence_threshold: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            silence_threshold: Duration::from_secs(120),
        }
    }
}

struct ChannelState {
    lines: VecDeque<LogLine>,
    last_activity: Instant,
    dropped: u64,
    completed: bool,
    fault: Option<String>,
}

/// Bounded multi-producer / single-consumer queue of log lines.
pub struct LogChannel {
    state: Mutex<ChannelState>,
    notify: Notify,
    capacity: usize,
}

impl LogChannel {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChannelState {
                lines: VecDeque::new(),
                last_activity: Instant::now(),
                dropped: 0,
                completed: false,
                fault: None,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        })
    }

    /// Enqueue one line, stamping it with the current time.
    pub fn push(&self, message: impl Into<String>) {
        self.push_line(LogLine::now(message));
    }

    /// Enqueue a pre-stamped line. Never blocks; overflow drops the oldest
    /// buffered entry instead.
    pub fn push_line(&self, line: LogLine) {
        {
            let mut state = self.state.lock();
            if state.completed || state.fault.is_some() {
                return;
            }
            if state.lines.len() == self.capacity {
                state.lines.pop_front();
                state.dropped += 1;
            }
            state.lines.push_back(line);
            state.last_activity = Instant::now();
        }
        self.notify.notify_one();
    }

    /// Wait until at least one line is buffered, then drain everything
    /// currently available as one batch.
    ///
    /// Returns `None` once the channel is completed or faulted and empty.
    pub async fn drain_batch(&self) -> Option<Vec<LogLine>> {
        loop {
            {
                let mut state = self.state.lock();
                if !state.lines.is_empty() {
                    return Some(state.lines.drain(..).collect());
                }
                if state.completed || state.fault.is_some() {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Mark the channel complete: producers are cut off and the shipper
    /// drains what remains, then stops.
    pub fn complete(&self) {
        self.state.lock().completed = true;
        self.notify.notify_one();
    }

    /// Record a terminal shipping fault. Later pushes are discarded so
    /// producers are never stuck behind a dead transport.
    pub fn fault(&self, reason: impl Into<String>) {
        {
            let mut state = self.state.lock();
            if state.fault.is_none() {
                state.fault = Some(reason.into());
            }
        }
        self.notify.notify_one();
    }

    pub fn fault_reason(&self) -> Option<String> {
        self.state.lock().fault.clone()
    }

    pub fn is_faulted(&self) -> bool {
        self.state.lock().fault.is_some()
    }

    /// Lines discarded by the drop-oldest policy so far.
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }

    /// Spawn the liveness heartbeat: a synthetic line is enqueued whenever
    /// the stream has been silent past the threshold, so the remote
    /// observer can tell "quiet but alive" from "hung".
    ///
    /// The task exits once the channel completes or faults; join the
    /// returned handle after [`LogChannel::complete`] so no synthetic line
    /// can land after the final flush.
    pub fn spawn_heartbeat(self: &Arc<Self>, config: HeartbeatConfig) -> JoinHandle<()> {
        let channel = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let idle = {
                    let state = channel.state.lock();
                    if state.completed || state.fault.is_some() {
                        break;
                    }
                    state.last_activity.elapsed()
                };
                if idle >= config.silence_threshold {
                    debug!(idle_secs = idle.as_secs(), "emitting heartbeat");
                    channel.push(format!(
                        "[heartbeat] job alive, no output for {}s",
                        idle.as_secs()
                    ));
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overflow_keeps_most_recent_lines_in_order() {
        let channel = LogChannel::with_capacity(5);
        for i in 0..12 {
            channel.push(format!("line {i}"));
        }
        let batch = channel.drain_batch().await.expect("batch expected");
        let messages: Vec<&str> = batch.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, ["line 7", "line 8", "line 9", "line 10", "line 11"]);
        assert_eq!(channel.dropped(), 7);
    }

    #[tokio::test]
    async fn test_drain_returns_none_after_complete() {
        let channel = LogChannel::new();
        channel.push("only");
        channel.complete();
        assert!(channel.drain_batch().await.is_some());
        assert!(channel.drain_batch().await.is_none());
    }

    #[tokio::test]
    async fn test_push_after_complete_is_discarded() {
        let channel = LogChannel::new();
        channel.complete();
        channel.push("late");
        assert!(channel.drain_batch().await.is_none());
    }

    #[tokio::test]
    async fn test_fault_releases_consumer_and_discards_pushes() {
        let channel = LogChannel::new();
        channel.fault("transport down");
        channel.push("after fault");
        assert!(channel.drain_batch().await.is_none());
        assert_eq!(channel.fault_reason().as_deref(), Some("transport down"));
        assert!(channel.is_faulted());
    }

    #[tokio::test]
    async fn test_drain_wakes_on_push() {
        let channel = LogChannel::new();
        let waiter = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.drain_batch().await })
        };
        tokio::task::yield_now().await;
        channel.push("wake up");
        let batch = waiter.await.unwrap().expect("batch expected");
        assert_eq!(batch[0].message, "wake up");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_fires_after_silence_threshold() {
        let channel = LogChannel::new();
        let config = HeartbeatConfig::default();
        let threshold = config.silence_threshold;
        let heartbeat = channel.spawn_heartbeat(config);

        tokio::time::sleep(threshold + Duration::from_millis(200)).await;
        let batch = channel.drain_batch().await.expect("heartbeat expected");
        assert!(batch.iter().any(|l| l.message.starts_with("[heartbeat]")));

        channel.complete();
        heartbeat.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_heartbeat_while_lines_keep_arriving() {
        let channel = LogChannel::new();
        let config = HeartbeatConfig::default();
        let threshold = config.silence_threshold;
        let heartbeat = channel.spawn_heartbeat(config);

        // Keep pushing at half the threshold; no silence window ever opens.
        for i in 0..6 {
            tokio::time::sleep(threshold / 2).await;
            channel.push(format!("real {i}"));
        }
        let batch = channel.drain_batch().await.expect("batch expected");
        assert!(batch.iter().all(|l| !l.message.starts_with("[heartbeat]")));

        channel.complete();
        heartbeat.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_heartbeat_per_silence_window() {
        let channel = LogChannel::new();
        let config = HeartbeatConfig::default();
        let threshold = config.silence_threshold;
        let heartbeat = channel.spawn_heartbeat(config);

        // A bit over two thresholds of silence: two heartbeats, not one
        // per poll tick.
        tokio::time::sleep(threshold * 2 + Duration::from_millis(300)).await;
        channel.complete();
        heartbeat.await.unwrap();

        let batch = channel.drain_batch().await.expect("batch expected");
        let count = batch
            .iter()
            .filter(|l| l.message.starts_with("[heartbeat]"))
            .count();
        assert_eq!(count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_task_exits_after_complete() {
        let channel = LogChannel::new();
        let heartbeat = channel.spawn_heartbeat(HeartbeatConfig::default());
        channel.complete();
        tokio::time::timeout(Duration::from_secs(1), heartbeat)
            .await
            .expect("heartbeat task should exit promptly")
            .unwrap();
    }
}
