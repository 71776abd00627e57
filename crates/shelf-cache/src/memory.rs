//! In-process store with per-entry expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shelf_core::{SharedClock, SystemClock};

use crate::store::{SharedStore, Store};
use crate::CacheResult;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory [`Store`].
///
/// Expired entries are dropped lazily on read and in bulk by [`MemoryStore::sweep`].
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: SharedClock,
    name: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    /// Create a store reading time from `clock`.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            name: "memory".into(),
        }
    }

    /// Set the backend name reported in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Create a shared handle on the system clock.
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn expiry(&self, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.map(|ttl| {
            let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
            self.clock
                .now()
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: drop it unless a writer replaced it in between.
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = Entry {
            value,
            expires_at: self.expiry(ttl),
        };
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let now = self.clock.now();
        let entries = self.entries.read();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::ManualClock;

    fn store_with_clock() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        (MemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (store, _) = store_with_clock();
        store.put("a", b"1".to_vec(), None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);

        // Deleting again is fine.
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let (store, clock) = store_with_clock();
        store
            .put("merged:1", b"{}".to_vec(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(9));
        assert!(store.get("merged:1").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.get("merged:1").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_prefix_sorted_and_live() {
        let (store, clock) = store_with_clock();
        store.put("clicks:1:b", vec![], None).await.unwrap();
        store.put("clicks:1:a", vec![], None).await.unwrap();
        store
            .put("clicks:1:c", vec![], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        store.put("clicks:2:a", vec![], None).await.unwrap();

        clock.advance(Duration::from_secs(2));
        let keys = store.list("clicks:1:").await.unwrap();
        assert_eq!(keys, vec!["clicks:1:a", "clicks:1:b"]);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired() {
        let (store, clock) = store_with_clock();
        store
            .put("x", vec![1], Some(Duration::from_secs(5)))
            .await
            .unwrap();
        store.put("y", vec![2], None).await.unwrap();

        clock.advance(Duration::from_secs(6));
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let (store, clock) = store_with_clock();
        store
            .put("k", vec![1], Some(Duration::from_secs(5)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(4));
        store.put("k", vec![2], None).await.unwrap();
        clock.advance(Duration::from_secs(10));
        assert_eq!(store.get("k").await.unwrap(), Some(vec![2]));
    }
}
