//! Marketplace offers adapter and its OAuth token cache.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use shelf_cache::Cache;
use shelf_core::{MarketplaceConfig, SharedClock};
use shelf_fetch::{FetchClient, TimeoutConfig, Upstream};
use tracing::{debug, info, warn};

use crate::record::{OfferRecord, Price};
use crate::source::{OfferQuery, OfferSource};
use crate::{SourceError, SourceResult};

/// Store key of the cached application token.
pub const TOKEN_CACHE_KEY: &str = "ebay:token";

/// OAuth scope requested for public browse access.
pub const MARKETPLACE_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";

/// Tokens are dropped this long before the upstream says they expire.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedToken {
    value: String,
    expires_at_ms: i64,
}

/// Cache of the client-credentials token.
///
/// Concurrent callers that miss at the same time each exchange credentials;
/// the last write wins. The upstream tolerates the duplicates.
#[derive(Clone)]
pub struct TokenCache {
    cache: Cache,
    clock: SharedClock,
}

impl TokenCache {
    pub fn new(cache: Cache, clock: SharedClock) -> Self {
        Self { cache, clock }
    }

    /// A live cached token, if any. Read failures count as a miss.
    pub async fn get(&self) -> Option<String> {
        match self.cache.get::<CachedToken>(TOKEN_CACHE_KEY).await {
            Ok(Some(token)) if token.expires_at_ms > self.clock.now_millis() => Some(token.value),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "token cache read failed");
                None
            }
        }
    }

    /// Cache `value` for `expires_in` seconds minus the safety margin.
    pub async fn put(&self, value: &str, expires_in: u64) {
        let ttl_secs = expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        if ttl_secs == 0 {
            return;
        }
        let token = CachedToken {
            value: value.to_string(),
            expires_at_ms: self.clock.now_millis() + (ttl_secs as i64) * 1000,
        };
        if let Err(e) = self
            .cache
            .set(TOKEN_CACHE_KEY, &token, Some(Duration::from_secs(ttl_secs)))
            .await
        {
            warn!(error = %e, "token cache write failed");
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SearchResponse {
    item_summaries: Vec<ItemSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ItemSummary {
    item_id: String,
    title: String,
    price: Option<Price>,
    seller: Option<Seller>,
    item_web_url: Option<String>,
    item_affiliate_web_url: Option<String>,
    image: Option<Image>,
    brand: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Seller {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Image {
    image_url: Option<String>,
}

/// Adapter for marketplace item search.
///
/// Searches run under the marketplace retry policy: a 429 is retried after a
/// fixed 500 ms, at most twice; any other non-2xx fails immediately.
#[derive(Clone)]
pub struct MarketplaceAdapter {
    search_client: FetchClient,
    auth_client: FetchClient,
    config: MarketplaceConfig,
    tokens: TokenCache,
}

impl MarketplaceAdapter {
    pub fn new(config: &MarketplaceConfig, tokens: TokenCache) -> SourceResult<Self> {
        let timeout = TimeoutConfig::from_millis(config.timeout_ms);
        let search_client = FetchClient::builder(Upstream::Marketplace)
            .timeout(timeout)
            .build()
            .map_err(SourceError::fetch(Upstream::Marketplace))?;
        let auth_client = FetchClient::builder(Upstream::MarketplaceAuth)
            .timeout(timeout)
            .build()
            .map_err(SourceError::fetch(Upstream::MarketplaceAuth))?;
        Ok(Self::from_clients(config, tokens, search_client, auth_client))
    }

    /// Assemble from prebuilt clients (custom retry sleepers, policies).
    pub fn from_clients(
        config: &MarketplaceConfig,
        tokens: TokenCache,
        search_client: FetchClient,
        auth_client: FetchClient,
    ) -> Self {
        let mut config = config.clone();
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        config.identity_url = config.identity_url.trim_end_matches('/').to_string();
        Self {
            search_client,
            auth_client,
            config,
            tokens,
        }
    }

    /// The cached application token, exchanging credentials on a miss.
    pub async fn get_token(&self) -> SourceResult<String> {
        if let Some(token) = self.tokens.get().await {
            return Ok(token);
        }

        let (client_id, client_secret) = match (&self.config.client_id, &self.config.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => {
                return Err(SourceError::NotConfigured {
                    upstream: Upstream::MarketplaceAuth,
                    reason: "marketplace credentials missing".into(),
                })
            }
        };

        let url = format!("{}/identity/v1/oauth2/token", self.config.identity_url);
        let response: TokenResponse = self
            .auth_client
            .json(|http| {
                http.post(&url)
                    .basic_auth(client_id, Some(client_secret))
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("scope", MARKETPLACE_SCOPE),
                    ])
            })
            .await
            .map_err(SourceError::fetch(Upstream::MarketplaceAuth))?;

        info!(expires_in = response.expires_in, "marketplace token refreshed");
        self.tokens
            .put(&response.access_token, response.expires_in)
            .await;
        Ok(response.access_token)
    }

    /// Search with an explicit token.
    pub async fn search_with_token(
        &self,
        token: &str,
        query: &OfferQuery,
    ) -> SourceResult<Vec<OfferRecord>> {
        let url = format!("{}/buy/browse/v1/item_summary/search", self.config.base_url);
        let param = if query.is_exact() { "gtin" } else { "q" };
        let limit = self.config.result_limit.to_string();
        let campaign_context = self
            .config
            .campaign_id
            .as_deref()
            .map(|id| format!("affiliateCampaignId={id}"));

        let response: SearchResponse = self
            .search_client
            .json(|http| {
                let mut request = http
                    .get(&url)
                    .bearer_auth(token)
                    .header("X-EBAY-C-MARKETPLACE-ID", &self.config.marketplace_id)
                    .query(&[(param, query.as_str()), ("limit", limit.as_str())]);
                if let Some(ctx) = &campaign_context {
                    request = request.header("X-EBAY-C-ENDUSERCTX", ctx);
                }
                request
            })
            .await
            .map_err(SourceError::fetch(Upstream::Marketplace))?;

        let offers: Vec<OfferRecord> = response
            .item_summaries
            .into_iter()
            .map(|item| self.to_offer(item))
            .collect();
        debug!(query = %query, offers = offers.len(), "marketplace search");
        Ok(offers)
    }

    fn to_offer(&self, item: ItemSummary) -> OfferRecord {
        let affiliate_url = item.item_affiliate_web_url.or_else(|| {
            let campaign = self.config.campaign_id.as_deref()?;
            item.item_web_url
                .as_deref()
                .and_then(|url| with_campaign(url, campaign))
        });
        OfferRecord {
            item_id: item.item_id,
            title: item.title,
            price: item.price,
            seller: item.seller.and_then(|s| s.username),
            url: item.item_web_url,
            affiliate_url,
            image: item.image.and_then(|i| i.image_url),
            brand: item.brand.filter(|b| !b.trim().is_empty()),
        }
    }
}

/// Append the affiliate campaign id to a listing URL.
fn with_campaign(url: &str, campaign_id: &str) -> Option<String> {
    let mut url = Url::parse(url).ok()?;
    url.query_pairs_mut().append_pair("campid", campaign_id);
    Some(url.into())
}

#[async_trait]
impl OfferSource for MarketplaceAdapter {
    async fn search(&self, query: &OfferQuery) -> SourceResult<Vec<OfferRecord>> {
        let token = self.get_token().await?;
        self.search_with_token(&token, query).await
    }
}

impl std::fmt::Debug for MarketplaceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceAdapter")
            .field("base_url", &self.config.base_url)
            .field("marketplace_id", &self.config.marketplace_id)
            .finish()
    }
}
