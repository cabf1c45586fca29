//! # pubrpc-types — wire records for the pubrpc correlation layer
//!
//! Shared request/response shapes and identifiers, kept free of any
//! transport or runtime concern so both clients and test harnesses can
//! depend on them.

pub mod id;
pub mod message;

// Re-export main types
pub use id::RequestId;
pub use message::{
    Request, RequestOptions, Response, RpcErrorPayload, StreamFrame, PROTOCOL_VERSION,
};
