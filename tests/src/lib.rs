//! # pubrpc Test Suite
//!
//! Unified test crate exercising the correlation engine end to end over
//! the in-memory channel transport.
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── request_flows.rs   # request/response, ack, timeout eviction
//!     ├── stream_flows.rs    # chunked replies, terminal frames, cancel
//!     └── lifecycle.rs       # close semantics, stats
//! ```
//!
//! ```bash
//! cargo test -p pubrpc-tests
//! cargo test -p pubrpc-tests integration::
//! ```

#![allow(dead_code)]

pub mod integration;

/// Install a fmt subscriber once so `RUST_LOG=pubrpc_client=debug` shows
/// dispatch decisions while a test is being debugged.
#[cfg(test)]
pub(crate) fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
