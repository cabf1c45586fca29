//! Active-stream registry.
//!
//! A stream request stays registered for as long as the stream is open:
//! chunks are delivered to the caller-supplied sink, and only a terminal
//! frame (result or error) or an explicit cancellation removes the entry.
//! There is no timeout sweep here; a stream's liveness is caller-managed.

use crate::tracker::Tracker;
use dashmap::DashMap;
use pubrpc_types::RequestId;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Caller-supplied sink receiving stream chunks together with a handle
/// that can cancel the stream from inside the callback.
pub type ChunkSink = dyn Fn(Value, StreamCancel) + Send + Sync;

/// An open stream: the tracker resolves on the terminal frame, the sink
/// consumes data chunks.
pub struct StreamEntry {
    /// Completes when the terminal frame arrives.
    pub tracker: Tracker,
    /// Receives each data chunk.
    pub sink: Arc<ChunkSink>,
}

/// Cancellation handle passed to the chunk sink.
///
/// Holds a weak reference so a sink that outlives the client cannot keep
/// the registry alive.
#[derive(Clone)]
pub struct StreamCancel {
    streams: Weak<ActiveStreams>,
    id: RequestId,
}

impl StreamCancel {
    /// Cancel the stream locally. With `drop_reply` the entry is removed
    /// and its tracker dropped, so later frames for this id become
    /// unsolicited notifications. Without it nothing changes locally; the
    /// remote side is only informed through
    /// [`RpcClient::cancel_stream_request`](crate::client::RpcClient::cancel_stream_request).
    pub fn cancel(&self, drop_reply: bool) {
        if !drop_reply {
            debug!(request_id = %self.id, "Stream cancel without drop-reply is a local no-op");
            return;
        }
        if let Some(streams) = self.streams.upgrade() {
            streams.close(&self.id);
        }
    }
}

/// Registry of open streams, keyed by request identifier.
pub struct ActiveStreams {
    streams: DashMap<RequestId, StreamEntry>,
}

impl ActiveStreams {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            streams: DashMap::new(),
        })
    }

    /// Register an open stream.
    pub fn open(&self, id: RequestId, tracker: Tracker, sink: Arc<ChunkSink>) {
        self.streams.insert(id, StreamEntry { tracker, sink });
    }

    /// Clone out the sink for a stream. The clone is invoked outside the
    /// map's shard lock so a sink may itself cancel the stream.
    pub fn sink(&self, id: &RequestId) -> Option<Arc<ChunkSink>> {
        self.streams.get(id).map(|entry| Arc::clone(&entry.sink))
    }

    /// Remove a stream (terminal frame or cancellation), handing the entry
    /// back so the caller can complete its tracker.
    pub fn close(&self, id: &RequestId) -> Option<StreamEntry> {
        self.streams.remove(id).map(|(_, entry)| entry)
    }

    /// Is the identifier an open stream?
    pub fn contains(&self, id: &RequestId) -> bool {
        self.streams.contains_key(id)
    }

    /// Number of open streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// True when no streams are open.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Remove every stream and return the entries (used at client close).
    pub fn drain(&self) -> Vec<StreamEntry> {
        let ids: Vec<RequestId> = self.streams.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter_map(|id| self.close(id)).collect()
    }

    /// Build a cancellation handle for the given stream id.
    pub fn cancel_handle(self: &Arc<Self>, id: RequestId) -> StreamCancel {
        StreamCancel {
            streams: Arc::downgrade(self),
            id,
        }
    }
}
