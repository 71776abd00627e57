//! Primary store with an optional lower-consistency fallback tier.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::store::{SharedStore, Store};
use crate::{CacheError, CacheResult};

/// Whether a read may be answered by the fallback tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Primary only; a primary failure is an error.
    #[default]
    PrimaryOnly,
    /// Consult the fallback when the primary fails.
    AllowFallback,
}

/// Where a write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Primary only; a primary failure is an error.
    #[default]
    PrimaryOnly,
    /// Write the primary and mirror to the fallback. If the primary fails the
    /// write still succeeds when the fallback accepted it.
    Mirror,
}

/// A store composed of a primary and an optional fallback.
///
/// Callers choose per operation whether the fallback is acceptable through
/// [`TieredStore::get_with`] / [`TieredStore::put_with`], or take a
/// [`TieredStore::view`] with other defaults over the same tiers. The
/// [`Store`] implementation uses the defaults configured at construction.
///
/// With a tier timeout set, each tier is bounded separately, so a hung
/// primary still leaves time to consult the fallback.
#[derive(Clone)]
pub struct TieredStore {
    primary: SharedStore,
    fallback: Option<SharedStore>,
    default_read: ReadPolicy,
    default_write: WritePolicy,
    tier_timeout: Option<Duration>,
}

impl TieredStore {
    /// Create a tiered store with no fallback.
    pub fn new(primary: SharedStore) -> Self {
        Self {
            primary,
            fallback: None,
            default_read: ReadPolicy::PrimaryOnly,
            default_write: WritePolicy::PrimaryOnly,
            tier_timeout: None,
        }
    }

    /// Attach a fallback tier.
    pub fn with_fallback(mut self, fallback: SharedStore) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Set the policies used through the [`Store`] trait.
    pub fn with_defaults(mut self, read: ReadPolicy, write: WritePolicy) -> Self {
        self.default_read = read;
        self.default_write = write;
        self
    }

    /// Bound every operation on each tier by `timeout`.
    pub fn with_tier_timeout(mut self, timeout: Duration) -> Self {
        self.tier_timeout = Some(timeout);
        self
    }

    /// The same tiers behind different default policies.
    pub fn view(&self, read: ReadPolicy, write: WritePolicy) -> Self {
        self.clone().with_defaults(read, write)
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Read with an explicit policy.
    pub async fn get_with(&self, key: &str, policy: ReadPolicy) -> CacheResult<Option<Vec<u8>>> {
        match self.bounded(key, self.primary.get(key)).await {
            Ok(value) => Ok(value),
            Err(e) => match (policy, &self.fallback) {
                (ReadPolicy::AllowFallback, Some(fallback)) => {
                    warn!(key, error = %e, backend = self.primary.name(), "primary read failed, using fallback tier");
                    self.bounded(key, fallback.get(key)).await
                }
                _ => Err(e),
            },
        }
    }

    /// Write with an explicit policy.
    pub async fn put_with(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        policy: WritePolicy,
    ) -> CacheResult<()> {
        let fallback = match (policy, &self.fallback) {
            (WritePolicy::Mirror, Some(fallback)) => fallback,
            _ => return self.bounded(key, self.primary.put(key, value, ttl)).await,
        };

        let primary = self.bounded(key, self.primary.put(key, value.clone(), ttl)).await;
        let mirrored = self.bounded(key, fallback.put(key, value, ttl)).await;
        match (primary, mirrored) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => {
                debug!(key, error = %e, "fallback mirror write failed");
                Ok(())
            }
            (Err(e), Ok(())) => {
                warn!(key, error = %e, "primary write failed, kept in fallback tier only");
                Ok(())
            }
            (Err(e), Err(_)) => Err(e),
        }
    }

    async fn bounded<T, F>(&self, key: &str, op: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        match self.tier_timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| CacheError::Timeout(format!("{key} after {}ms", limit.as_millis())))?,
            None => op.await,
        }
    }
}

#[async_trait]
impl Store for TieredStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.get_with(key, self.default_read).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.put_with(key, value, ttl, self.default_write).await
    }

    /// Deletes hit both tiers so an invalidation can't resurface from the fallback.
    async fn delete(&self, key: &str) -> CacheResult<()> {
        let primary = self.bounded(key, self.primary.delete(key)).await;
        if let Some(fallback) = &self.fallback {
            if let Err(e) = self.bounded(key, fallback.delete(key)).await {
                debug!(key, error = %e, "fallback delete failed");
            }
        }
        primary
    }

    async fn list(&self, prefix: &str) -> CacheResult<Vec<String>> {
        match self.bounded(prefix, self.primary.list(prefix)).await {
            Ok(keys) => Ok(keys),
            Err(e) if self.default_read == ReadPolicy::AllowFallback => match &self.fallback {
                Some(fallback) => self.bounded(prefix, fallback.list(prefix)).await,
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "tiered"
    }
}

/// A store that is always down. Handy for exercising failure paths.
#[derive(Debug, Default)]
pub struct UnavailableStore;

#[async_trait]
impl Store for UnavailableStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Err(CacheError::Unavailable("store offline".into()))
    }

    async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> CacheResult<()> {
        Err(CacheError::Unavailable("store offline".into()))
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::Unavailable("store offline".into()))
    }

    async fn list(&self, _prefix: &str) -> CacheResult<Vec<String>> {
        Err(CacheError::Unavailable("store offline".into()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn test_primary_only_read_fails_when_primary_down() {
        let store = TieredStore::new(Arc::new(UnavailableStore)).with_fallback(MemoryStore::shared());
        assert!(store.get_with("k", ReadPolicy::PrimaryOnly).await.is_err());
    }

    #[tokio::test]
    async fn test_fallback_read_when_allowed() {
        let fallback = MemoryStore::shared();
        fallback.put("k", b"v".to_vec(), None).await.unwrap();

        let store = TieredStore::new(Arc::new(UnavailableStore)).with_fallback(fallback);
        let value = store.get_with("k", ReadPolicy::AllowFallback).await.unwrap();
        assert_eq!(value, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_mirror_write_survives_primary_outage() {
        let fallback = MemoryStore::shared();
        let store = TieredStore::new(Arc::new(UnavailableStore))
            .with_fallback(fallback.clone())
            .with_defaults(ReadPolicy::AllowFallback, WritePolicy::Mirror);

        store.put("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(fallback.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_primary_only_write_does_not_touch_fallback() {
        let primary = MemoryStore::shared();
        let fallback = MemoryStore::shared();
        let store = TieredStore::new(primary.clone()).with_fallback(fallback.clone());

        store
            .put_with("k", b"v".to_vec(), None, WritePolicy::PrimaryOnly)
            .await
            .unwrap();
        assert!(primary.get("k").await.unwrap().is_some());
        assert!(fallback.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_clears_both_tiers() {
        let primary = MemoryStore::shared();
        let fallback = MemoryStore::shared();
        let store = TieredStore::new(primary.clone())
            .with_fallback(fallback.clone())
            .with_defaults(ReadPolicy::AllowFallback, WritePolicy::Mirror);

        store.put("k", b"v".to_vec(), None).await.unwrap();
        store.delete("k").await.unwrap();
        assert!(primary.get("k").await.unwrap().is_none());
        assert!(fallback.get("k").await.unwrap().is_none());
    }

    struct HungStore;

    #[async_trait]
    impl Store for HungStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
            std::future::pending().await
        }
        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> CacheResult<()> {
            std::future::pending().await
        }
        async fn delete(&self, _key: &str) -> CacheResult<()> {
            std::future::pending().await
        }
        async fn list(&self, _prefix: &str) -> CacheResult<Vec<String>> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_primary_times_out_per_tier_and_falls_back() {
        let fallback = MemoryStore::shared();
        fallback.put("k", b"v".to_vec(), None).await.unwrap();
        let store = TieredStore::new(Arc::new(HungStore))
            .with_fallback(fallback)
            .with_tier_timeout(Duration::from_millis(500));

        let value = store.get_with("k", ReadPolicy::AllowFallback).await.unwrap();
        assert_eq!(value, Some(b"v".to_vec()));

        let err = store.get_with("k", ReadPolicy::PrimaryOnly).await.unwrap_err();
        assert!(matches!(err, CacheError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_view_shares_tiers_with_other_defaults() {
        let fallback = MemoryStore::shared();
        let mirrored = TieredStore::new(Arc::new(UnavailableStore))
            .with_fallback(fallback.clone())
            .with_defaults(ReadPolicy::AllowFallback, WritePolicy::Mirror);
        let strict = mirrored.view(ReadPolicy::PrimaryOnly, WritePolicy::PrimaryOnly);

        assert!(strict.put("k", b"v".to_vec(), None).await.is_err());
        assert!(fallback.get("k").await.unwrap().is_none());

        mirrored.put("k", b"v".to_vec(), None).await.unwrap();
        assert!(fallback.get("k").await.unwrap().is_some());
        assert!(strict.get("k").await.is_err());
    }
}
