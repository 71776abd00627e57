//! Security infrastructure for the shelf engine.
//!
//! This crate provides:
//! - `RateLimiter` - sliding-window quota per (upstream, identity), persisted in a `Store`
//! - `RateLimit` - ceiling and window configuration
//! - `AdminToken` - static bearer-token check for admin routes
//!
//! # Example
//!
//! ```ignore
//! use shelf_security::{RateLimit, RateLimiter, AdminToken};
//!
//! let limiter = RateLimiter::new("usda", RateLimit::per_hour(900), cache, clock);
//! match limiter.check("203.0.113.9").await? {
//!     RateDecision::Allowed { .. } => { /* call upstream */ }
//!     RateDecision::Limited { retry_after_seconds } => { /* 429 */ }
//! }
//!
//! let admin = AdminToken::new("s3cret");
//! admin.verify_header(request_authorization_header)?;
//! ```

mod error;
mod limits;
mod token;

pub use error::*;
pub use limits::*;
pub use token::*;
