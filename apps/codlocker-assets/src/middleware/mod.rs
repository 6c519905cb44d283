//! HTTP middleware for the asset service.

pub mod offline;
pub mod request_log;

pub use offline::offline_gate;
pub use request_log::{log_requests, RequestLogger};

/// Probe endpoints: never gated, never logged.
pub const PROBE_PATHS: [&str; 2] = ["/health", "/ready"];
