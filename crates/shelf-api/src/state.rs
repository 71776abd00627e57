//! Services shared by the handlers.

use std::sync::Arc;
use std::time::Duration;

use shelf_cache::{Cache, MemoryStore, ReadPolicy, SharedStore, TieredStore, WritePolicy};
use shelf_catalog::{MergeOrchestrator, OverrideStore};
use shelf_clicks::{ActorPool, ClickLedger};
use shelf_core::{SharedClock, ShelfConfig, ShelfResult};
use shelf_fetch::Upstream;
use shelf_security::{AdminToken, RateLimit, RateLimiter};
use shelf_sources::{
    MarketplaceAdapter, NutritionAdapter, NutritionSource, OpenFoodAdapter, TokenCache,
};
use tracing::info;

/// Deadline for one operation on one store tier.
const STORE_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything a handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub catalog: MergeOrchestrator,
    pub clicks: ClickLedger,
    pub nutrition: Arc<dyn NutritionSource>,
    pub admin: AdminToken,
    /// In-process stores owned by this state, swept by the server.
    memory: Vec<Arc<MemoryStore>>,
}

impl AppState {
    pub fn new(
        catalog: MergeOrchestrator,
        clicks: ClickLedger,
        nutrition: Arc<dyn NutritionSource>,
        admin: AdminToken,
    ) -> Self {
        Self {
            catalog,
            clicks,
            nutrition,
            admin,
            memory: Vec::new(),
        }
    }

    /// In-process stores created by [`AppState::from_config`].
    pub fn memory_stores(&self) -> &[Arc<MemoryStore>] {
        &self.memory
    }

    /// Drop expired entries from every in-process store. Returns how many
    /// were removed.
    pub fn sweep_memory(&self) -> usize {
        self.memory.iter().map(|store| store.sweep()).sum()
    }

    /// Wire the production services.
    ///
    /// `kv` is the shared key/value store. It is fronted by an in-process
    /// tier that answers reads when `kv` fails and receives mirrored writes.
    /// Overrides bypass that tier: they are read from and written to `kv`
    /// only, so an override write during an outage fails instead of landing
    /// in one process.
    pub fn from_config(config: &ShelfConfig, kv: SharedStore, clock: SharedClock) -> ShelfResult<Self> {
        let local = Arc::new(MemoryStore::with_clock(clock.clone()).named("local"));
        let tiers = TieredStore::new(kv)
            .with_fallback(local.clone())
            .with_tier_timeout(STORE_TIMEOUT);
        let cache = Cache::new(
            tiers
                .view(ReadPolicy::AllowFallback, WritePolicy::Mirror)
                .shared(),
        );
        let strict = Cache::new(
            tiers
                .view(ReadPolicy::PrimaryOnly, WritePolicy::PrimaryOnly)
                .shared(),
        );

        let products = Arc::new(OpenFoodAdapter::new(&config.openfood)?);
        let offers = Arc::new(MarketplaceAdapter::new(
            &config.marketplace,
            TokenCache::new(cache.clone(), clock.clone()),
        )?);
        let limiter = RateLimiter::new(
            Upstream::Nutrition.name(),
            RateLimit::new(
                config.nutrition.hourly_ceiling,
                Duration::from_secs(config.nutrition.window_secs),
            ),
            cache.clone(),
            clock.clone(),
        );
        let nutrition = Arc::new(NutritionAdapter::new(&config.nutrition, limiter)?);

        let catalog = MergeOrchestrator::new(
            products,
            offers,
            OverrideStore::new(strict, clock.clone()),
            cache.clone(),
            clock.clone(),
            config.cache.merged_ttl(),
        );

        let actor_memory = Arc::new(MemoryStore::with_clock(clock.clone()).named("actors"));
        let actors = Arc::new(ActorPool::new(Cache::new(actor_memory.clone()), &config.clicks));
        let clicks = ClickLedger::new(actors, cache, clock, &config.clicks);

        let admin = AdminToken::from_config(config.admin.token.as_deref());
        info!(
            admin = admin.is_enabled(),
            marketplace = config.marketplace.has_credentials(),
            nutrition = config.nutrition.api_key.is_some(),
            merged_ttl_secs = config.cache.merged_ttl_secs,
            "services wired"
        );

        let mut state = Self::new(catalog, clicks, nutrition, admin);
        state.memory = vec![local, actor_memory];
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shelf_cache::{Store, UnavailableStore};
    use shelf_catalog::OverrideRecord;
    use shelf_clicks::ClickEvent;
    use shelf_core::{ProductKey, SystemClock};

    fn key() -> ProductKey {
        ProductKey::parse("8901030895555").unwrap()
    }

    fn outage_state() -> AppState {
        AppState::from_config(&ShelfConfig::default(), Arc::new(UnavailableStore), SystemClock::shared()).unwrap()
    }

    #[tokio::test]
    async fn test_override_write_fails_during_kv_outage() {
        let state = outage_state();
        let result = state
            .catalog
            .overrides()
            .put(
                &key(),
                OverrideRecord {
                    brand: Some("Acme".into()),
                    ..OverrideRecord::default()
                },
            )
            .await;
        assert!(result.is_err());
        assert!(state.memory_stores()[0].is_empty());
    }

    #[tokio::test]
    async fn test_fallback_clicks_mirror_into_swept_local_tier() {
        let state = outage_state();
        state.clicks.actors().set_offline(true);

        let receipt = state
            .clicks
            .record_click(ClickEvent::new(key(), "https://aff/1", Utc::now()))
            .await
            .unwrap();
        assert!(receipt.fallback);
        assert_eq!(receipt.new_count, 1);

        let names: Vec<_> = state.memory_stores().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["local", "actors"]);
        assert!(!state.memory_stores()[0].is_empty());
        assert_eq!(state.sweep_memory(), 0);
    }
}
