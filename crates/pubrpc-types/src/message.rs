//! Wire records exchanged over the transport.
//!
//! The shapes follow JSON-RPC 2.0 with two extensions: an `ack` field
//! ("request received, result later") and a `stream` envelope carrying
//! chunked replies. Payloads stay as `serde_json::Value`; interpreting
//! them is the caller's business.

use crate::id::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version marker carried by every request and response.
pub const PROTOCOL_VERSION: &str = "2.0";

fn protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

/// Outbound request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version marker.
    #[serde(rename = "jsonrpc", default = "protocol_version")]
    pub version: String,
    /// Correlation identifier.
    pub id: RequestId,
    /// Remote method name.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request options (streaming flag etc).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<RequestOptions>,
}

/// Options attached to a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Ask the remote side to reply with a stream of chunks.
    #[serde(default)]
    pub stream: bool,
}

impl Request {
    /// Create a plain request.
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: protocol_version(),
            id,
            method: method.into(),
            params,
            options: None,
        }
    }

    /// Create a request asking for streaming replies.
    pub fn stream(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            options: Some(RequestOptions { stream: true }),
            ..Self::new(id, method, params)
        }
    }

    /// Create an upstream cancellation notice for a previously sent request.
    pub fn cancel(id: RequestId) -> Self {
        Self::new(id, "rpc.cancel", None)
    }

    /// Encode for the transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Inbound response envelope.
///
/// Exactly one logical variant applies per message; `classify` helpers on
/// the client side pick it apart. `id` is absent for notifications and
/// stream frames (the stream envelope carries its own id).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version marker.
    #[serde(rename = "jsonrpc", default = "protocol_version")]
    pub version: String,
    /// Correlation identifier; absent for notifications and stream frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Acknowledgement marker: present and truthy means "result later".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<Value>,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorPayload>,
    /// Stream envelope for chunked replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamFrame>,
}

/// Stream envelope inside a response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamFrame {
    /// Identifier of the stream request this frame belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Chunk payload; absent on the terminal frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    /// True when the `ack` field is present and truthy (`true` or any
    /// object); `false` and `null` do not count.
    pub fn is_ack(&self) -> bool {
        match &self.ack {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) => false,
            Some(_) => true,
            None => false,
        }
    }

    /// Build a success result for `id`.
    pub fn result(id: RequestId, result: Value) -> Self {
        Self {
            version: protocol_version(),
            id: Some(id),
            result: Some(result),
            ..Default::default()
        }
    }

    /// Build an acknowledgement for `id`.
    pub fn ack(id: RequestId) -> Self {
        Self {
            version: protocol_version(),
            id: Some(id),
            ack: Some(Value::Bool(true)),
            ..Default::default()
        }
    }

    /// Build an error reply for `id`.
    pub fn error(id: RequestId, error: RpcErrorPayload) -> Self {
        Self {
            version: protocol_version(),
            id: Some(id),
            error: Some(error),
            ..Default::default()
        }
    }

    /// Build a stream data chunk for stream `id`.
    pub fn stream_chunk(id: RequestId, data: Value) -> Self {
        Self {
            version: protocol_version(),
            stream: Some(StreamFrame {
                id: Some(id),
                data: Some(data),
            }),
            ..Default::default()
        }
    }

    /// Build a terminal stream frame carrying the final result.
    pub fn stream_result(id: RequestId, result: Value) -> Self {
        Self {
            version: protocol_version(),
            result: Some(result),
            stream: Some(StreamFrame {
                id: Some(id),
                data: None,
            }),
            ..Default::default()
        }
    }

    /// Build a terminal stream frame carrying an error.
    pub fn stream_error(id: RequestId, error: RpcErrorPayload) -> Self {
        Self {
            version: protocol_version(),
            error: Some(error),
            stream: Some(StreamFrame {
                id: Some(id),
                data: None,
            }),
            ..Default::default()
        }
    }

    /// Encode for the transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Structured error payload from a matched reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorPayload {
    /// Numeric error code (JSON-RPC style).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    /// Human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Short title for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Arbitrary extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorPayload {
    /// Create a payload with a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for RpcErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.code.unwrap_or(0),
            self.message.as_deref().unwrap_or("unknown remote error")
        )
    }
}

impl std::error::Error for RpcErrorPayload {}
