//! Correlation engine: request/response and request/stream over a
//! publish/subscribe transport.
//!
//! [`RpcClient`] owns the pending and stream registries plus a single
//! dispatch task that drains the transport and classifies every inbound
//! frame: acknowledgement, result, error, stream chunk, or unsolicited
//! notification. Callers see plain `async` request methods; everything
//! else is demultiplexing.

use crate::config::{ClientConfig, ConfigError};
use crate::error::{ClientError, TransportError};
use crate::pending::PendingRequests;
use crate::stats::{ClientStats, StatsRecorder, StatsSnapshot};
use crate::streams::{ActiveStreams, ChunkSink, StreamCancel};
use crate::tracker::Tracker;
use crate::transport::Transport;
use bytes::Bytes;
use pubrpc_types::{Request, RequestId, Response};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Callback for unsolicited server events (notifications and stream frames
/// that match nothing).
pub type NotificationHandler = Arc<dyn Fn(Response) + Send + Sync>;

/// Request/response client over a pub/sub transport.
///
/// Construction spawns the dispatch task; [`close`](Self::close) shuts it
/// down and fails every outstanding request. A client dropped without
/// `close` leaves the dispatch task parked on the transport until the
/// remote side goes away.
pub struct RpcClient<T: Transport> {
    transport: T,
    config: ClientConfig,
    pending: Arc<PendingRequests>,
    streams: Arc<ActiveStreams>,
    stats: Arc<dyn StatsRecorder>,
    /// Kept alongside `stats` when the default recorder is in use, so
    /// callers can read a snapshot without downcasting.
    default_stats: Option<Arc<ClientStats>>,
    on_notification: NotificationHandler,
    closed: AtomicBool,
    dispatch: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> RpcClient<T> {
    /// Create a client with the default stats recorder and a notification
    /// handler that drops unsolicited events.
    pub fn new(transport: T, config: ClientConfig) -> Result<Arc<Self>, ConfigError> {
        let stats = Arc::new(ClientStats::default());
        Self::with_handlers(transport, config, Arc::new(|_| {}), stats)
    }

    /// Create a client with an explicit notification handler and stats
    /// recorder. Pass an `Arc<ClientStats>` to keep
    /// [`stats`](Self::stats) snapshots available.
    pub fn with_handlers(
        transport: T,
        config: ClientConfig,
        on_notification: NotificationHandler,
        stats: Arc<ClientStats>,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        let pending = PendingRequests::new(config.request_timeout, config.sweep_interval());
        let client = Arc::new(Self {
            transport,
            config,
            pending,
            streams: ActiveStreams::new(),
            stats: Arc::clone(&stats) as Arc<dyn StatsRecorder>,
            default_stats: Some(stats),
            on_notification,
            closed: AtomicBool::new(false),
            dispatch: parking_lot::Mutex::new(None),
        });
        let handle = tokio::spawn(Arc::clone(&client).run_dispatch());
        *client.dispatch.lock() = Some(handle);
        Ok(client)
    }

    /// Create a client with a caller-owned stats recorder. Snapshots are
    /// the recorder owner's business; [`stats`](Self::stats) returns `None`.
    pub fn with_recorder(
        transport: T,
        config: ClientConfig,
        on_notification: NotificationHandler,
        stats: Arc<dyn StatsRecorder>,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        let pending = PendingRequests::new(config.request_timeout, config.sweep_interval());
        let client = Arc::new(Self {
            transport,
            config,
            pending,
            streams: ActiveStreams::new(),
            stats,
            default_stats: None,
            on_notification,
            closed: AtomicBool::new(false),
            dispatch: parking_lot::Mutex::new(None),
        });
        let handle = tokio::spawn(Arc::clone(&client).run_dispatch());
        *client.dispatch.lock() = Some(handle);
        Ok(client)
    }

    /// Snapshot of the default stats recorder, `None` when a caller-owned
    /// recorder was installed.
    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.default_stats.as_ref().map(|s| s.snapshot())
    }

    /// Number of requests currently awaiting a reply.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of open streams.
    pub fn streams_len(&self) -> usize {
        self.streams.len()
    }

    /// Send a request with an explicit identifier and await its reply.
    ///
    /// The identifier is registered before the frame is handed to the
    /// transport, so a reply cannot outrun its registry entry. On transport
    /// failure the entry is removed and the error surfaces immediately;
    /// otherwise the call resolves with the reply, a remote error, a
    /// timeout, or `Closed`.
    pub async fn send_request(
        &self,
        id: RequestId,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<Value, ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        let request = Request::new(id.clone(), method, params);
        let (tracker, handle) = Tracker::new();
        self.pending.add(id.clone(), tracker);
        debug!(request_id = %id, method = %request.method, "Request registered");

        if let Err(e) = self.publish(&request).await {
            // Drop the tracker silently; the caller gets the send error.
            drop(self.pending.remove(&id));
            return Err(e);
        }
        handle.wait().await
    }

    /// [`send_request`](Self::send_request) with a generated identifier.
    pub async fn call(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.send_request(RequestId::generate(), method, params).await
    }

    /// Send a stream request. `sink` receives each data chunk together with
    /// a cancellation handle; the returned future resolves when a terminal
    /// frame closes the stream.
    pub async fn send_stream_request(
        &self,
        id: RequestId,
        method: impl Into<String>,
        params: Option<Value>,
        sink: impl Fn(Value, StreamCancel) + Send + Sync + 'static,
    ) -> Result<Value, ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        let request = Request::stream(id.clone(), method, params);
        let (tracker, handle) = Tracker::new();
        self.streams
            .open(id.clone(), tracker, Arc::new(sink) as Arc<ChunkSink>);
        debug!(request_id = %id, method = %request.method, "Stream registered");

        if let Err(e) = self.publish(&request).await {
            drop(self.streams.close(&id));
            return Err(e);
        }
        handle.wait().await
    }

    /// Cancel a pending request. With `drop_reply` the tracker is dropped
    /// and the caller's future resolves as `Cancelled`; later replies for
    /// the id become unsolicited notifications. Without it the entry stays
    /// and may still time out or resolve.
    ///
    /// When `notify_remote_cancel` is configured an untracked `rpc.cancel`
    /// request is published either way; otherwise a cancellation without
    /// `drop_reply` changes nothing and is logged as such.
    pub async fn cancel_request(&self, id: &RequestId, drop_reply: bool) {
        if drop_reply {
            match self.pending.remove(id) {
                Some(tracker) => drop(tracker),
                None => debug!(request_id = %id, "Cancel for unknown request id"),
            }
        }
        self.notify_cancel(id, drop_reply).await;
    }

    /// Cancel an open stream. Semantics mirror
    /// [`cancel_request`](Self::cancel_request) on the stream registry.
    pub async fn cancel_stream_request(&self, id: &RequestId, drop_reply: bool) {
        if drop_reply {
            match self.streams.close(id) {
                Some(entry) => drop(entry),
                None => debug!(request_id = %id, "Cancel for unknown stream id"),
            }
        }
        self.notify_cancel(id, drop_reply).await;
    }

    /// Shut the client down: close the transport, wait for the dispatch
    /// task to drain, then fail every outstanding request and stream with
    /// `Closed`. Idempotent; later calls return immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transport.close().await;
        let handle = self.dispatch.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        let orphaned = self.pending.drain();
        let streams = self.streams.drain();
        debug!(
            pending = orphaned.len(),
            streams = streams.len(),
            "Client closed, failing outstanding requests"
        );
        for tracker in orphaned {
            tracker.cancel(ClientError::Closed);
        }
        for entry in streams {
            entry.tracker.cancel(ClientError::Closed);
        }
    }

    /// Encode and transmit one request, feeding send-side stats.
    async fn publish(&self, request: &Request) -> Result<(), ClientError> {
        let bytes = request.to_bytes()?;
        let len = bytes.len();
        self.transport.send(Bytes::from(bytes)).await?;
        self.stats.record_sent(len);
        Ok(())
    }

    async fn notify_cancel(&self, id: &RequestId, drop_reply: bool) {
        if !self.config.notify_remote_cancel {
            if !drop_reply {
                debug!(request_id = %id, "Cancel without drop-reply and no remote notification is a no-op");
            }
            return;
        }
        // Untracked: no registry entry, no reply expected.
        if let Err(e) = self.publish(&Request::cancel(id.clone())).await {
            debug!(request_id = %id, error = %e, "Failed to publish cancel notice");
        }
    }

    async fn run_dispatch(self: Arc<Self>) {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }
            match self.transport.receive().await {
                Ok(batch) => {
                    for frame in batch {
                        self.handle_frame(&frame);
                    }
                }
                Err(TransportError::Closed) => {
                    debug!("Transport closed, dispatch loop exiting");
                    break;
                }
                Err(e) => {
                    // Transient by policy; the transport decides when it is
                    // really gone by returning Closed.
                    warn!(error = %e, "Receive failed, continuing");
                }
            }
        }
    }

    /// Classify and apply one inbound frame. Never fails: malformed or
    /// unmatched frames are logged and counted, nothing more.
    fn handle_frame(&self, frame: &Bytes) {
        let len = frame.len();
        let response: Response = match serde_json::from_slice(frame) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, bytes = len, "Discarding undecodable frame");
                self.stats.record_received(len, None);
                return;
            }
        };

        let round_trip = match response.id.clone() {
            Some(id) => self.handle_reply(id, response),
            None => self.handle_push(response),
        };
        self.stats.record_received(len, round_trip);
    }

    /// A frame with a top-level id: ack, error, or result for a pending
    /// request. Returns the resolved tracker's round-trip time, if any.
    fn handle_reply(&self, id: RequestId, mut response: Response) -> Option<Duration> {
        if let Some(error) = response.error.take() {
            let Some(tracker) = self.pending.remove(&id) else {
                debug!(request_id = %id, "Error reply for unknown request id");
                return None;
            };
            let elapsed = tracker.time_spent();
            debug!(request_id = %id, code = error.code, "Request failed remotely");
            tracker.cancel(ClientError::Remote(error));
            return Some(elapsed);
        }

        if response.is_ack() {
            // Received-but-working: restart the timeout window, nothing
            // resolves yet.
            if self.pending.touch(&id) {
                debug!(request_id = %id, "Request acknowledged, timeout restarted");
            } else {
                debug!(request_id = %id, "Ack for unknown request id");
            }
            return None;
        }

        let Some(tracker) = self.pending.remove(&id) else {
            debug!(request_id = %id, "Reply for unknown request id");
            return None;
        };
        let elapsed = tracker.time_spent();
        debug!(request_id = %id, elapsed_ms = elapsed.as_millis() as u64, "Request completed");
        tracker.finish(response.result.unwrap_or(Value::Null));
        Some(elapsed)
    }

    /// A frame without a top-level id: stream traffic or a server push.
    fn handle_push(&self, response: Response) -> Option<Duration> {
        let Some(stream_id) = response.stream.as_ref().and_then(|f| f.id.clone()) else {
            // Plain notification, or a stream envelope with no id in it.
            (self.on_notification)(response);
            return None;
        };

        if !self.streams.contains(&stream_id) {
            debug!(request_id = %stream_id, "Stream frame for unknown stream id");
            (self.on_notification)(response);
            return None;
        }

        if let Some(data) = response.stream.as_ref().and_then(|f| f.data.clone()) {
            // Data chunk: deliver, stream stays open. The sink runs on a
            // cloned Arc so it may cancel the stream it is serving.
            if let Some(sink) = self.streams.sink(&stream_id) {
                sink(data, self.streams.cancel_handle(stream_id));
            }
            return None;
        }

        // No chunk data: terminal frame, unless it carries neither result
        // nor error (malformed; hand it to the notification fallback).
        if response.error.is_none() && response.result.is_none() {
            (self.on_notification)(response);
            return None;
        }
        let Some(entry) = self.streams.close(&stream_id) else {
            (self.on_notification)(response);
            return None;
        };
        let elapsed = entry.tracker.time_spent();
        match response.error {
            Some(error) => {
                debug!(request_id = %stream_id, code = error.code, "Stream failed remotely");
                entry.tracker.cancel(ClientError::Remote(error));
            }
            None => {
                debug!(request_id = %stream_id, elapsed_ms = elapsed.as_millis() as u64, "Stream completed");
                entry
                    .tracker
                    .finish(response.result.unwrap_or(Value::Null));
            }
        }
        Some(elapsed)
    }
}
