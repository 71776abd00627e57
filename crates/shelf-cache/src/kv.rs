//! Typed store wrapper with automatic serialization.

use std::future::Future;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::store::SharedStore;
use crate::{CacheError, CacheResult};

/// Type-safe cache over any [`crate::Store`].
///
/// Values are stored as JSON. Every operation can carry a deadline; an
/// operation that overruns it fails with [`CacheError::Timeout`].
#[derive(Clone)]
pub struct Cache {
    store: SharedStore,
    timeout: Option<Duration>,
}

impl Cache {
    /// Wrap a store with no deadline.
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bound every operation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The underlying byte store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Get a value from the cache.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let merged: Option<MergedProduct> = cache.get("merged:8901030895555").await?;
    /// ```
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.bounded(key, self.store.get(key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Set a value in the cache. `None` TTL keeps it until deleted.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// cache.set("merged:8901030895555", &merged, Some(ttl)).await?;
    /// ```
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.bounded(key, self.store.put(key, bytes, ttl)).await
    }

    /// Delete a value from the cache.
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.bounded(key, self.store.delete(key)).await
    }

    /// Check if a live key exists.
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.bounded(key, self.store.get(key)).await?.is_some())
    }

    /// Live keys under `prefix`, sorted ascending.
    pub async fn keys(&self, prefix: &str) -> CacheResult<Vec<String>> {
        self.bounded(prefix, self.store.list(prefix)).await
    }

    async fn bounded<T, F>(&self, key: &str, op: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| CacheError::Timeout(format!("{key} after {}ms", limit.as_millis())))?,
            None => op.await,
        }
    }
}

/// Helper to build cache keys with namespacing.
///
/// # Example
///
/// ```rust,ignore
/// let key = cache_key!("actor", id, "count");
/// // Returns "actor:<id>:count"
/// ```
#[macro_export]
macro_rules! cache_key {
    ($prefix:expr, $($part:expr),+) => {{
        let mut key = String::from($prefix);
        $(
            key.push(':');
            key.push_str(&$part.to_string());
        )+
        key
    }};
}
