//! Core abstractions for the shelf aggregation engine.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `ProductKey` - Validated barcode identifier, the join key across stores
//! - `ShelfError` - Error taxonomy surfaced to callers
//! - `ShelfConfig` - Layered configuration (defaults, file, environment)
//! - `Clock` - Injectable time source
//! - `RequestId` - Per-request correlation identifier

mod clock;
mod config;
mod context;
mod error;
mod key;

pub use clock::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use key::*;
