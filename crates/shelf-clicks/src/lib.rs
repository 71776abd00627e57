//! Affiliate click attribution for the shelf engine.
//!
//! This crate provides:
//! - `ClickEvent` / `ClickStats` - what is recorded and reported per product
//! - `ActorPool` - one serialized actor task per product key
//! - `ClickLedger` - actor path first, store fallback when the actor is unreachable
//!
//! Counting is at-least-once across the actor/fallback boundary: a click
//! that times out on the actor may still land there and also be written to
//! the fallback counter.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_clicks::{ClickEvent, ClickLedger};
//!
//! let receipt = ledger.record_click(event).await?;
//! println!("count={} fallback={}", receipt.new_count, receipt.fallback);
//! ```

mod actor;
mod error;
mod event;
mod ledger;

pub use actor::{actor_clicks_key, actor_count_key, ActorId, ActorPool};
pub use error::{ClickError, ClickResult};
pub use event::*;
pub use ledger::{fallback_clicks_prefix, fallback_count_key, ClickLedger};
