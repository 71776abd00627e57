//! TTL key-value cache store for the shelf engine.
//!
//! Provides:
//! - `Store` - the byte-level async KV interface (`get`, `put`, `delete`, `list`)
//! - `MemoryStore` - in-process store with per-entry expiry
//! - `TieredStore` - primary store plus an optional lower-consistency fallback
//! - `Cache` - JSON-typed wrapper with per-operation deadlines
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_cache::{cache_key, Cache, MemoryStore};
//!
//! let cache = Cache::new(MemoryStore::shared());
//! let key = cache_key!("merged", "8901030895555");
//! cache.set(&key, &merged, Some(Duration::from_secs(14_400))).await?;
//! let hit: Option<MergedProduct> = cache.get(&key).await?;
//! ```

mod error;
mod kv;
mod memory;
mod status;
mod store;
mod tiered;

pub use error::{CacheError, CacheResult};
pub use kv::Cache;
pub use memory::MemoryStore;
pub use status::CacheStatus;
pub use store::{SharedStore, Store};
pub use tiered::{ReadPolicy, TieredStore, UnavailableStore, WritePolicy};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Cache, CacheError, CacheStatus, MemoryStore, SharedStore, Store, TieredStore,
    };
}
