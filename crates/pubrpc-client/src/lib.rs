//! Request correlation over publish/subscribe transports.
//!
//! `pubrpc-client` turns an unreliable, connectionless pub/sub channel into
//! request/response and request/stream semantics in the style of JSON-RPC
//! 2.0. Outbound requests carry an opaque identifier; a single dispatch
//! task demultiplexes the shared inbound stream and resolves the matching
//! pending operation on reply, acknowledgement, error, or stream frame.
//! Requests with no reply are evicted by a lazy timeout sweep.
//!
//! Delivery is never guaranteed; the only failure detector is the timeout.
//!
//! ```no_run
//! use pubrpc_client::{ClientConfig, RpcClient};
//! use pubrpc_client::transport::channel;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, _remote) = channel::pair();
//! let client = RpcClient::new(transport, ClientConfig::default())?;
//! let reply = client.call("status.get", None).await?;
//! println!("{reply}");
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod pending;
pub mod stats;
pub mod streams;
pub mod tracker;
pub mod transport;

pub use client::{NotificationHandler, RpcClient};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, TransportError};
pub use pending::PendingRequests;
pub use stats::{ClientStats, NoopStats, StatsRecorder, StatsSnapshot};
pub use streams::{ActiveStreams, StreamCancel};
pub use tracker::{Tracker, TrackerHandle};
pub use transport::Transport;

pub use pubrpc_types::{
    Request, RequestId, RequestOptions, Response, RpcErrorPayload, StreamFrame, PROTOCOL_VERSION,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
