//! Request identifiers for correlation.
//!
//! The wire allows either a JSON number or a JSON string, so `RequestId`
//! is an untagged enum over both. Uniqueness among in-flight requests is
//! the caller's responsibility; `generate()` produces a time+random
//! composite that is unique in practice.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier correlating a request with its replies.
///
/// Opaque, comparable, and hashable. Numeric ids are preferred on the wire
/// (compact); string ids exist for callers that bring their own scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier (fits JSON number range when generated here).
    Num(u64),
    /// Caller-supplied string identifier.
    Str(String),
}

impl RequestId {
    /// Generate a fresh identifier: milliseconds since the Unix epoch
    /// shifted left 16 bits, OR-ed with 16 random bits.
    pub fn generate() -> Self {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let salt: u16 = rand::thread_rng().gen();
        Self::Num((now_ms << 16) | u64::from(salt))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Num(n) => write!(f, "{}", n),
            RequestId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Num(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::Str(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::Str(s)
    }
}
