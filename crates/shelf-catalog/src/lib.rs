//! Canonical product records for the shelf engine.
//!
//! This crate provides:
//! - `MergedProduct` and its parts - the externally visible record
//! - `OverrideRecord` / `OverrideStore` - admin corrections that win over upstream data
//! - `merge` - the pure precedence rules
//! - `MergeOrchestrator` - cache-aside assembly from the upstream adapters
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_catalog::MergeOrchestrator;
//!
//! let (merged, status) = orchestrator.get_merged(&key, false).await?;
//! println!("{} ({status})", merged.name);
//! ```

mod error;
pub mod merge;
mod orchestrator;
mod overrides;
mod record;

pub use error::{CatalogError, CatalogResult};
pub use orchestrator::{merged_cache_key, MergeOrchestrator};
pub use overrides::{override_cache_key, OverrideStore};
pub use record::*;

// Re-export adapter records for convenience
pub use shelf_sources::{OfferRecord, Price, UpstreamProductRecord};
