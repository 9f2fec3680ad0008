//! Gateway keep-alive driver.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The heartbeat was cancelled externally.
    Cancelled,
    /// The receive loop stopped accepting outbound frames.
    Disconnected,
}

/// Send an `op: 1` frame every `interval` until cancelled.
///
/// The first frame goes out one full interval after start. Frames are
/// handed to `outbound`, which the receive loop drains onto the transport.
pub async fn run_heartbeat(
    interval: Duration,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
            _ = ticker.tick() => {
                let timestamp = chrono::Utc::now().timestamp();
                let text = match codec::encode(&codec::heartbeat(timestamp)) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to encode heartbeat");
                        continue;
                    }
                };
                debug!(timestamp, "keeping websocket alive");
                if outbound.send(text).is_err() {
                    return HeartbeatResult::Disconnected;
                }
            }
        }
    }
}

/// A running heartbeat task.
#[derive(Debug)]
pub struct HeartbeatHandle {
    cancel: CancellationToken,
    task: JoinHandle<HeartbeatResult>,
}

impl HeartbeatHandle {
    /// Spawn [`run_heartbeat`]. `cancel` should be a child of the
    /// connection's shutdown token so closing the connection stops it too.
    pub fn spawn(
        interval: Duration,
        outbound: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Self {
        let task = tokio::spawn(run_heartbeat(interval, outbound, cancel.clone()));
        Self { cancel, task }
    }

    /// Stop the task. Takes effect before the next frame could be sent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to finish.
    pub async fn stop(mut self) -> Option<HeartbeatResult> {
        self.cancel.cancel();
        (&mut self.task).await.ok()
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
