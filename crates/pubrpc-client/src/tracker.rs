//! Single-use completion cell for a pending operation.
//!
//! A [`Tracker`] is created at send time and owned by whichever registry
//! entry references it; completion consumes the tracker, so a second
//! completion attempt cannot compile. The paired [`TrackerHandle`] is what
//! the caller awaits.

use crate::error::ClientError;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Completion side of a pending operation.
#[derive(Debug)]
pub struct Tracker {
    sender: oneshot::Sender<Result<Value, ClientError>>,
    created_at: Instant,
}

/// Awaitable side of a pending operation. Resolved exactly once.
#[derive(Debug)]
pub struct TrackerHandle {
    receiver: oneshot::Receiver<Result<Value, ClientError>>,
}

impl Tracker {
    /// Create a tracker and its awaitable handle.
    pub fn new() -> (Self, TrackerHandle) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: tx,
                created_at: Instant::now(),
            },
            TrackerHandle { receiver: rx },
        )
    }

    /// Complete successfully with a value.
    pub fn finish(self, value: Value) {
        let _ = self.sender.send(Ok(value));
    }

    /// Complete with a failure.
    pub fn cancel(self, error: ClientError) {
        let _ = self.sender.send(Err(error));
    }

    /// Elapsed time since the tracker was created.
    pub fn time_spent(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl TrackerHandle {
    /// Await the outcome. A tracker dropped without completion (drop-reply
    /// cancellation) resolves as [`ClientError::Cancelled`].
    pub async fn wait(self) -> Result<Value, ClientError> {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Cancelled),
        }
    }
}
