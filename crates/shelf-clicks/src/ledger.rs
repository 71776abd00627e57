//! Click ledger: actor path first, store fallback second.

use std::sync::Arc;

use shelf_cache::Cache;
use shelf_core::{ClicksConfig, ProductKey, SharedClock};
use tracing::{info, warn};

use crate::actor::ActorPool;
use crate::event::{ClickEvent, ClickReceipt, ClickStats};
use crate::ClickResult;

/// Fallback counter key for a product.
pub fn fallback_count_key(key: &ProductKey) -> String {
    format!("AFFILIATE:COUNT:{key}")
}

/// Prefix under which fallback click events are stored, one key each.
pub fn fallback_clicks_prefix(key: &ProductKey) -> String {
    format!("AFFILIATE:CLICKS:{key}:")
}

/// Authoritative click counts with a degraded path.
///
/// The fallback counter is separate from the actor's and is not
/// reconciled with it. Fallback writes are not transactional: concurrent
/// fallback clicks on one key may lose increments.
#[derive(Clone)]
pub struct ClickLedger {
    actors: Arc<ActorPool>,
    fallback: Cache,
    clock: SharedClock,
    recent_limit: usize,
}

impl ClickLedger {
    pub fn new(actors: Arc<ActorPool>, fallback: Cache, clock: SharedClock, config: &ClicksConfig) -> Self {
        Self {
            actors,
            fallback,
            clock,
            recent_limit: config.recent_limit,
        }
    }

    pub fn actors(&self) -> &ActorPool {
        &self.actors
    }

    /// Count a click and return the new total for its key.
    pub async fn record_click(&self, event: ClickEvent) -> ClickResult<ClickReceipt> {
        match self.actors.record(event.clone()).await {
            Ok(new_count) => Ok(ClickReceipt {
                new_count,
                fallback: false,
            }),
            Err(e) => {
                warn!(key = %event.product_key, error = %e, "click actor failed, recording to fallback");
                let new_count = self.record_fallback(event).await?;
                Ok(ClickReceipt {
                    new_count,
                    fallback: true,
                })
            }
        }
    }

    pub async fn get_stats(&self, key: &ProductKey) -> ClickResult<ClickStats> {
        match self.actors.stats(key).await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                warn!(key = %key, error = %e, "click actor failed, reading fallback stats");
                self.fallback_stats(key).await
            }
        }
    }

    /// Forget every click for `key`, on both paths.
    pub async fn clear(&self, key: &ProductKey) -> ClickResult<()> {
        if let Err(e) = self.actors.clear(key).await {
            warn!(key = %key, error = %e, "click actor failed, clearing its storage directly");
            self.actors.clear_storage(key).await?;
        }

        self.fallback.delete(&fallback_count_key(key)).await?;
        let stored = self.fallback.keys(&fallback_clicks_prefix(key)).await?;
        for event_key in &stored {
            self.fallback.delete(event_key).await?;
        }
        info!(key = %key, fallback_events = stored.len(), "clicks cleared");
        Ok(())
    }

    async fn record_fallback(&self, event: ClickEvent) -> ClickResult<u64> {
        let key = event.product_key.clone();
        let prefix = fallback_clicks_prefix(&key);
        let event_key = format!(
            "{prefix}{:013}-{:06x}",
            self.clock.now_millis().max(0),
            rand::random::<u32>() & 0x00ff_ffff
        );
        self.fallback.set(&event_key, &event, None).await?;

        let count_key = fallback_count_key(&key);
        let count = self.fallback.get::<u64>(&count_key).await?.unwrap_or(0) + 1;
        self.fallback.set(&count_key, &count, None).await?;

        // Keys sort by timestamp, oldest first.
        let stored = self.fallback.keys(&prefix).await?;
        if stored.len() > self.recent_limit {
            for stale in &stored[..stored.len() - self.recent_limit] {
                self.fallback.delete(stale).await?;
            }
        }
        Ok(count)
    }

    async fn fallback_stats(&self, key: &ProductKey) -> ClickResult<ClickStats> {
        let count = self
            .fallback
            .get::<u64>(&fallback_count_key(key))
            .await?
            .unwrap_or(0);

        let stored = self.fallback.keys(&fallback_clicks_prefix(key)).await?;
        let mut clicks = Vec::new();
        for event_key in stored.iter().rev().take(self.recent_limit) {
            if let Some(event) = self.fallback.get::<ClickEvent>(event_key).await? {
                clicks.push(event);
            }
        }
        Ok(ClickStats::new(count, &clicks, true))
    }
}
