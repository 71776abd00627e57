//! Cache-aside assembly of merged products.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use shelf_cache::{cache_key, Cache, CacheStatus};
use shelf_core::{ProductKey, SharedClock};
use shelf_sources::{OfferQuery, OfferRecord, OfferSource, ProductSource, SourceResult, UpstreamProductRecord};
use tracing::{debug, info, warn};

use crate::merge::{merge, MergeInputs};
use crate::overrides::OverrideStore;
use crate::record::{MarketplaceStatus, MergedProduct, OverrideRecord, OverrideStatus, SourceStatus, Sources};
use crate::CatalogResult;

/// `updated_at` of the override a merge was computed from.
type OverrideStamp = Option<DateTime<Utc>>;

/// Store key of a product's merged snapshot.
pub fn merged_cache_key(key: &ProductKey) -> String {
    cache_key!("merged", key)
}

/// Builds [`MergedProduct`]s from the upstream adapters and overrides,
/// serving cached snapshots when fresh.
///
/// No single upstream failure aborts a merge; the affected `source.*`
/// entry is marked unavailable instead. An unreadable override store
/// degrades the same way, and such a merge is never cached.
#[derive(Clone)]
pub struct MergeOrchestrator {
    products: Arc<dyn ProductSource>,
    offers: Arc<dyn OfferSource>,
    overrides: OverrideStore,
    cache: Cache,
    clock: SharedClock,
    ttl: Duration,
}

impl MergeOrchestrator {
    pub fn new(
        products: Arc<dyn ProductSource>,
        offers: Arc<dyn OfferSource>,
        overrides: OverrideStore,
        cache: Cache,
        clock: SharedClock,
        ttl: Duration,
    ) -> Self {
        Self {
            products,
            offers,
            overrides,
            cache,
            clock,
            ttl,
        }
    }

    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the merged record for `key`, computing it on a miss.
    ///
    /// A cache read failure counts as a miss. The snapshot write finishes
    /// before this returns, but runs on its own task so it still completes
    /// if the caller goes away.
    pub async fn get_merged(
        &self,
        key: &ProductKey,
        force_refresh: bool,
    ) -> CatalogResult<(MergedProduct, CacheStatus)> {
        if !force_refresh {
            match self.cache.get::<MergedProduct>(&merged_cache_key(key)).await {
                Ok(Some(merged)) => {
                    debug!(key = %key, "merged snapshot hit");
                    return Ok((merged, CacheStatus::Hit));
                }
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "merged snapshot read failed, recomputing"),
            }
        }

        let started = Instant::now();
        let (merged, seen) = self.compute(key).await;
        info!(
            key = %key,
            obf = merged.source.obf.available,
            ebay = merged.source.ebay.available,
            overrides = merged.source.overrides.applied,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "merged product computed"
        );

        match seen {
            Some(stamp) => {
                let write = tokio::spawn(self.clone().store_snapshot(key.clone(), merged.clone(), stamp));
                if let Err(e) = write.await {
                    warn!(key = %key, error = %e, "merged snapshot task failed");
                }
            }
            None => debug!(key = %key, "override store unreadable, snapshot not cached"),
        }

        Ok((merged, CacheStatus::Miss))
    }

    /// Drop the merged snapshot for `key`.
    pub async fn invalidate(&self, key: &ProductKey) -> CatalogResult<()> {
        self.cache.delete(&merged_cache_key(key)).await?;
        Ok(())
    }

    /// Write the snapshot, then drop it again if the override moved on while
    /// it was being computed.
    async fn store_snapshot(self, key: ProductKey, snapshot: MergedProduct, seen: OverrideStamp) {
        let cache_key = merged_cache_key(&key);
        if let Err(e) = self.cache.set(&cache_key, &snapshot, Some(self.ttl)).await {
            warn!(key = %cache_key, error = %e, "merged snapshot write failed");
            return;
        }

        let stale = match self.overrides.get(&key).await {
            Ok(current) => current.updated_at != seen,
            Err(e) => {
                warn!(key = %key, error = %e, "override recheck failed");
                true
            }
        };
        if stale {
            debug!(key = %key, "override changed during merge, dropping snapshot");
            if let Err(e) = self.cache.delete(&cache_key).await {
                warn!(key = %cache_key, error = %e, "stale snapshot delete failed");
            }
        }
    }

    /// Merge from the upstreams and the override. The stamp is `None` when
    /// the override store could not be read.
    async fn compute(&self, key: &ProductKey) -> (MergedProduct, Option<OverrideStamp>) {
        let exact = OfferQuery::Gtin(key.to_string());

        // The GTIN search needs only the key, so it runs alongside the
        // product lookup and the override read.
        let (upstream, exact_offers, overrides) = futures::join!(
            self.products.product(key),
            self.offers.search(&exact),
            self.overrides.get(key),
        );

        let (overrides, overrides_status, seen) = match overrides {
            Ok(record) => {
                let stamp = record.updated_at;
                (record, OverrideStatus::default(), Some(stamp))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "override read failed, merging without it");
                (
                    OverrideRecord::default(),
                    OverrideStatus::unreadable("override store unavailable"),
                    None,
                )
            }
        };

        let (upstream, obf) = match upstream {
            Ok(record) => (Some(record), SourceStatus::available()),
            Err(e) => {
                warn!(key = %key, upstream = %e.upstream(), error = %e, "product lookup failed");
                (None, SourceStatus::unavailable(e.note()))
            }
        };

        let (offers, ebay) = self
            .resolve_offers(key, exact, exact_offers, upstream.as_ref())
            .await;

        let sources = Sources {
            obf,
            ebay,
            overrides: overrides_status,
        };
        let merged = merge(
            MergeInputs {
                key,
                upstream: upstream.as_ref(),
                offers: &offers,
                overrides: &overrides,
            },
            sources,
            self.clock.now(),
        );
        (merged, seen)
    }

    /// Fall back to a free-text search when the GTIN search found nothing.
    async fn resolve_offers(
        &self,
        key: &ProductKey,
        exact: OfferQuery,
        exact_offers: SourceResult<Vec<OfferRecord>>,
        upstream: Option<&UpstreamProductRecord>,
    ) -> (Vec<OfferRecord>, MarketplaceStatus) {
        let (query, result) = match exact_offers {
            Ok(offers) if offers.is_empty() => {
                let text = OfferQuery::Text(text_query(key, upstream));
                debug!(key = %key, query = %text, "no exact offers, trying text search");
                let result = self.offers.search(&text).await;
                (text, result)
            }
            other => (exact, other),
        };

        match result {
            Ok(offers) => (
                offers,
                MarketplaceStatus {
                    available: true,
                    note: None,
                    query: Some(query.to_string()),
                },
            ),
            Err(e) => {
                warn!(key = %key, query = %query, error = %e, "offer search failed");
                (
                    Vec::new(),
                    MarketplaceStatus {
                        available: false,
                        note: Some(e.note()),
                        query: Some(query.to_string()),
                    },
                )
            }
        }
    }
}

/// Free-text query for a product: brand and name, either alone, or the key.
fn text_query(key: &ProductKey, upstream: Option<&UpstreamProductRecord>) -> String {
    let brand = upstream.and_then(|u| u.brand.as_deref()).filter(|s| !s.trim().is_empty());
    let name = upstream.and_then(|u| u.name.as_deref()).filter(|s| !s.trim().is_empty());
    match (brand, name) {
        (Some(brand), Some(name)) if name.to_lowercase().contains(&brand.to_lowercase()) => {
            name.trim().to_string()
        }
        (Some(brand), Some(name)) => format!("{} {}", brand.trim(), name.trim()),
        (None, Some(name)) => name.trim().to_string(),
        (Some(brand), None) => brand.trim().to_string(),
        (None, None) => key.to_string(),
    }
}
