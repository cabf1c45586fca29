pub mod lifecycle;
pub mod stream_flows;
