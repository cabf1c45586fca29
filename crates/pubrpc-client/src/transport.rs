//! Transport seam.
//!
//! The engine never touches sockets directly; it publishes encoded frames
//! through [`Transport::send`] and pulls inbound batches through
//! [`Transport::receive`]. The [`channel`] module provides an in-memory
//! pair used by the integration tests.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;

/// Abstract message transport. One frame in, batches of frames out.
///
/// `receive` returning an empty batch is valid (a poll that found nothing);
/// only an `Err` signals trouble. Implementations must return
/// [`TransportError::Closed`] once the underlying channel is gone so the
/// dispatch loop can shut down instead of spinning.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Publish one encoded frame.
    async fn send(&self, frame: Bytes) -> Result<(), TransportError>;

    /// Wait for the next batch of inbound frames.
    async fn receive(&self) -> Result<Vec<Bytes>, TransportError>;

    /// Tear down the transport. Must wake a blocked `receive`; subsequent
    /// sends and receives fail with [`TransportError::Closed`].
    async fn close(&self);
}

/// In-memory transport over tokio mpsc channels.
pub mod channel {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::{mpsc, Mutex, Notify};

    /// Client-side endpoint: sends on one channel, receives on the other.
    pub struct ChannelTransport {
        outbound: mpsc::UnboundedSender<Bytes>,
        inbound: Mutex<mpsc::UnboundedReceiver<Bytes>>,
        closed: AtomicBool,
        shutdown: Notify,
    }

    /// Test-harness endpoint standing in for the remote peer.
    pub struct RemoteEnd {
        to_client: mpsc::UnboundedSender<Bytes>,
        from_client: mpsc::UnboundedReceiver<Bytes>,
    }

    /// Build a connected transport/peer pair.
    pub fn pair() -> (ChannelTransport, RemoteEnd) {
        let (to_remote, from_client) = mpsc::unbounded_channel();
        let (to_client, from_remote) = mpsc::unbounded_channel();
        (
            ChannelTransport {
                outbound: to_remote,
                inbound: Mutex::new(from_remote),
                closed: AtomicBool::new(false),
                shutdown: Notify::new(),
            },
            RemoteEnd {
                to_client,
                from_client,
            },
        )
    }

    #[async_trait]
    impl Transport for ChannelTransport {
        async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            self.outbound
                .send(frame)
                .map_err(|_| TransportError::Closed)
        }

        async fn receive(&self) -> Result<Vec<Bytes>, TransportError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            let mut inbound = self.inbound.lock().await;
            let first = tokio::select! {
                _ = self.shutdown.notified() => return Err(TransportError::Closed),
                frame = inbound.recv() => frame.ok_or(TransportError::Closed)?,
            };
            // Drain whatever else is already queued into the same batch.
            let mut batch = vec![first];
            while let Ok(frame) = inbound.try_recv() {
                batch.push(frame);
            }
            Ok(batch)
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
            // notify_one stores a permit, so a receive that checks the flag
            // just before close still wakes up.
            self.shutdown.notify_one();
        }
    }

    impl RemoteEnd {
        /// Push a frame toward the client.
        pub fn reply(&self, frame: impl Into<Bytes>) {
            let _ = self.to_client.send(frame.into());
        }

        /// Take the next frame the client published.
        pub async fn next_request(&mut self) -> Option<Bytes> {
            self.from_client.recv().await
        }

        /// Take the next frame if one is already queued.
        pub fn try_next_request(&mut self) -> Option<Bytes> {
            self.from_client.try_recv().ok()
        }
    }
}
