//! Byte-level store interface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::CacheResult;

/// A key/value store with per-entry TTL.
///
/// Values are opaque bytes; typed access goes through [`crate::Cache`].
/// Implementations may be embedded, Redis-like, or a managed service.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read a value. Expired entries read as `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Write a value. `None` TTL means the entry never expires.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// List live keys starting with `prefix`, sorted ascending.
    async fn list(&self, prefix: &str) -> CacheResult<Vec<String>>;

    /// Backend name for logs.
    fn name(&self) -> &str {
        "store"
    }
}

/// Shared store handle.
pub type SharedStore = Arc<dyn Store>;
