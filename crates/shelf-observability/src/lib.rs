//! Observability infrastructure for the shelf engine.
//!
//! This crate provides:
//! - `init_tracing` - global `tracing` subscriber with env filter and JSON or human output
//! - `request_span` / `http_request_span` - per-request spans carrying the request id
//! - `ensure_request_id` - read or mint the `x-request-id` of an inbound request

mod logging;
mod span;

pub use logging::*;
pub use span::*;

// Re-export the request id and log format from shelf-core for convenience
pub use shelf_core::{LogFormat, RequestId};
