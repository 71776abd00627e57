//! Upstream fetch plumbing with per-upstream timeouts and retries.
//!
//! This crate provides:
//! - `FetchClient` - HTTP client that applies an upstream's timeout and retry policy
//! - `Upstream` - the external services the engine talks to, with their defaults
//! - `TimeoutConfig` - connect and total deadlines
//! - `RetryPolicy` - bounded retries with backoff, executed by [`retry::run`]
//! - `Sleeper` - injectable delay so backoff is testable without waiting

mod client;
mod error;
pub mod retry;
mod timeout;
mod upstream;

pub use client::*;
pub use error::*;
pub use retry::{BackoffStrategy, Jitter, RecordingSleeper, RetryCondition, RetryPolicy, Sleeper, TokioSleeper};
pub use timeout::*;
pub use upstream::*;
