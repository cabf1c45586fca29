//! Client error types.
//!
//! Callers need to tell "remote said no" apart from "remote never answered",
//! so timeouts, remote errors, and transport failures are distinct variants.

use pubrpc_types::RpcErrorPayload;

/// Failure of a single request as seen by its caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The transport rejected or failed the send. The registry entry is
    /// cleaned up; no reply will ever be delivered for this request.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The remote side answered with a structured error payload.
    #[error("remote error: {0}")]
    Remote(RpcErrorPayload),

    /// No reply arrived within the configured window.
    #[error("request timed out")]
    Timeout,

    /// The request was cancelled locally and its tracker dropped.
    #[error("request cancelled")]
    Cancelled,

    /// The client was closed; outstanding and subsequent requests fail fast.
    #[error("client closed")]
    Closed,

    /// The request could not be encoded for the wire.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Errors surfaced by a [`Transport`](crate::transport::Transport)
/// implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The underlying channel or socket is gone.
    #[error("transport closed")]
    Closed,

    /// Send-side failure (socket error, full queue, ...).
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive-side failure.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Encode(e.to_string())
    }
}
