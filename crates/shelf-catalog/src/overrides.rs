//! Admin override storage.

use shelf_cache::{cache_key, Cache};
use shelf_core::{ProductKey, SharedClock};
use tracing::{info, warn};

use crate::orchestrator::merged_cache_key;
use crate::record::OverrideRecord;
use crate::{CatalogError, CatalogResult};

/// Longest accepted override text field.
const MAX_TEXT_LEN: usize = 2_000;

/// Store key of a product's override.
pub fn override_cache_key(key: &ProductKey) -> String {
    cache_key!("override", key)
}

/// Persistent admin overrides, one record per product.
///
/// Writing an override deletes the product's merged snapshot so the next
/// read recomputes with the new values. The snapshot is deleted before the
/// override is stored, so a failed write never leaves a stale snapshot
/// behind a stored override.
#[derive(Clone)]
pub struct OverrideStore {
    cache: Cache,
    clock: SharedClock,
}

impl OverrideStore {
    pub fn new(cache: Cache, clock: SharedClock) -> Self {
        Self { cache, clock }
    }

    /// Current override, or an empty record.
    pub async fn get(&self, key: &ProductKey) -> CatalogResult<OverrideRecord> {
        Ok(self
            .cache
            .get(&override_cache_key(key))
            .await?
            .unwrap_or_default())
    }

    /// Replace the override and invalidate the merged snapshot.
    ///
    /// Blank fields are dropped before storing. Returns the stored record.
    pub async fn put(&self, key: &ProductKey, record: OverrideRecord) -> CatalogResult<OverrideRecord> {
        let mut record = record.normalized();
        validate(&record)?;
        record.updated_at = Some(self.clock.now());

        let snapshot_key = merged_cache_key(key);
        self.cache.delete(&snapshot_key).await?;
        self.cache.set(&override_cache_key(key), &record, None).await?;
        // Catches a merge that read the old override and cached it meanwhile.
        if let Err(e) = self.cache.delete(&snapshot_key).await {
            warn!(key = %key, error = %e, "second snapshot invalidation failed");
        }
        info!(key = %key, empty = record.is_empty(), "override stored, merged snapshot invalidated");
        Ok(record)
    }
}

fn validate(record: &OverrideRecord) -> CatalogResult<()> {
    for (field, value) in [
        ("name", &record.name),
        ("brand", &record.brand),
        ("ingredients", &record.ingredients),
    ] {
        if value.as_ref().is_some_and(|v| v.chars().count() > MAX_TEXT_LEN) {
            return Err(CatalogError::InvalidOverride(format!(
                "{field} longer than {MAX_TEXT_LEN} characters"
            )));
        }
    }
    if let Some(image) = record
        .images
        .iter()
        .flatten()
        .find(|url| !(url.starts_with("https://") || url.starts_with("http://")))
    {
        return Err(CatalogError::InvalidOverride(format!(
            "image `{image}` is not an http(s) URL"
        )));
    }
    Ok(())
}
