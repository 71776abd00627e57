//! Nutrition database adapter.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use shelf_core::NutritionConfig;
use shelf_fetch::{FetchClient, FetchError, RetryPolicy, Sleeper, TimeoutConfig, TokioSleeper, Upstream};
use shelf_security::{LimitError, RateDecision, RateLimiter};
use tracing::{debug, warn};

use crate::record::{Food, Nutrient};
use crate::source::NutritionSource;
use crate::{SourceError, SourceResult};

const UPSTREAM: Upstream = Upstream::Nutrition;
const PAGE_SIZE: &str = "10";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    foods: Vec<SearchFood>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFood {
    fdc_id: u64,
    #[serde(default)]
    description: String,
    brand_owner: Option<String>,
    data_type: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<SearchNutrient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNutrient {
    nutrient_name: Option<String>,
    value: Option<f64>,
    unit_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailFood {
    fdc_id: u64,
    #[serde(default)]
    description: String,
    brand_owner: Option<String>,
    data_type: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<DetailNutrient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailNutrient {
    nutrient: Option<NutrientInfo>,
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NutrientInfo {
    name: String,
    unit_name: Option<String>,
}

impl From<SearchFood> for Food {
    fn from(raw: SearchFood) -> Self {
        let nutrients = raw
            .food_nutrients
            .into_iter()
            .filter_map(|n| {
                Some(Nutrient {
                    name: n.nutrient_name?,
                    amount: n.value?,
                    unit: n.unit_name.unwrap_or_default().to_lowercase(),
                })
            })
            .collect();
        Food {
            fdc_id: raw.fdc_id,
            description: raw.description,
            brand_owner: raw.brand_owner,
            data_type: raw.data_type,
            nutrients,
        }
    }
}

impl From<DetailFood> for Food {
    fn from(raw: DetailFood) -> Self {
        let nutrients = raw
            .food_nutrients
            .into_iter()
            .filter_map(|n| {
                let info = n.nutrient?;
                Some(Nutrient {
                    name: info.name,
                    amount: n.amount?,
                    unit: info.unit_name.unwrap_or_default().to_lowercase(),
                })
            })
            .collect();
        Food {
            fdc_id: raw.fdc_id,
            description: raw.description,
            brand_owner: raw.brand_owner,
            data_type: raw.data_type,
            nutrients,
        }
    }
}

/// Adapter for the nutrition database.
///
/// Every call first passes the per-client [`RateLimiter`]; over quota fails
/// with `RateLimited` without touching the upstream. 429 and 5xx responses
/// are retried with jittered exponential backoff, then reported as
/// unavailable. A 404 or an empty result is `NotFound`.
#[derive(Clone)]
pub struct NutritionAdapter {
    client: FetchClient,
    limiter: RateLimiter,
    base_url: String,
    api_key: Option<String>,
}

impl NutritionAdapter {
    pub fn new(config: &NutritionConfig, limiter: RateLimiter) -> SourceResult<Self> {
        Self::with_sleeper(config, limiter, Arc::new(TokioSleeper))
    }

    /// Like [`NutritionAdapter::new`] with a custom backoff sleeper.
    pub fn with_sleeper(
        config: &NutritionConfig,
        limiter: RateLimiter,
        sleeper: Arc<dyn Sleeper>,
    ) -> SourceResult<Self> {
        let retry: RetryPolicy = UPSTREAM
            .default_retry_policy()
            .with_max_attempts(config.max_attempts);
        let client = FetchClient::builder(UPSTREAM)
            .timeout(TimeoutConfig::from_millis(config.timeout_ms))
            .retry(retry)
            .sleeper(sleeper)
            .build()
            .map_err(SourceError::fetch(UPSTREAM))?;
        Ok(Self {
            client,
            limiter,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn api_key(&self) -> SourceResult<&str> {
        self.api_key.as_deref().ok_or_else(|| SourceError::NotConfigured {
            upstream: UPSTREAM,
            reason: "nutrition api key missing".into(),
        })
    }

    /// Charge one call to `client`'s window.
    async fn admit(&self, client: &str) -> SourceResult<()> {
        match self.limiter.check(client).await {
            Ok(RateDecision::Allowed { .. }) => Ok(()),
            Ok(RateDecision::Limited {
                retry_after_seconds,
            }) => Err(SourceError::RateLimited {
                upstream: UPSTREAM,
                retry_after_seconds,
            }),
            Err(LimitError::Store(source)) => {
                // Window state unavailable: let the call through.
                warn!(client, error = %source, "rate window unavailable, admitting call");
                Ok(())
            }
            Err(other) => Err(SourceError::NotConfigured {
                upstream: UPSTREAM,
                reason: other.to_string(),
            }),
        }
    }
}

/// 404 means the entity is missing; anything else is an upstream failure.
fn not_found_or_fetch(what: String) -> impl FnOnce(FetchError) -> SourceError {
    move |source| {
        if source.is_not_found() {
            SourceError::NotFound {
                upstream: UPSTREAM,
                what,
            }
        } else {
            SourceError::Fetch {
                upstream: UPSTREAM,
                source,
            }
        }
    }
}

#[async_trait]
impl NutritionSource for NutritionAdapter {
    async fn search(&self, client: &str, query: &str) -> SourceResult<Vec<Food>> {
        let api_key = self.api_key()?;
        self.admit(client).await?;

        let url = format!("{}/v1/foods/search", self.base_url);
        let response: SearchResponse = self
            .client
            .get_json(
                &url,
                &[("query", query), ("pageSize", PAGE_SIZE), ("api_key", api_key)],
            )
            .await
            .map_err(not_found_or_fetch(format!("foods matching `{query}`")))?;

        if response.foods.is_empty() {
            return Err(SourceError::NotFound {
                upstream: UPSTREAM,
                what: format!("foods matching `{query}`"),
            });
        }
        debug!(query, foods = response.foods.len(), "nutrition search");
        Ok(response.foods.into_iter().map(Food::from).collect())
    }

    async fn food(&self, client: &str, fdc_id: u64) -> SourceResult<Food> {
        let api_key = self.api_key()?;
        self.admit(client).await?;

        let url = format!("{}/v1/food/{}", self.base_url, fdc_id);
        let food: DetailFood = self
            .client
            .get_json(&url, &[("api_key", api_key)])
            .await
            .map_err(not_found_or_fetch(format!("food {fdc_id}")))?;
        Ok(food.into())
    }
}

impl std::fmt::Debug for NutritionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NutritionAdapter")
            .field("base_url", &self.base_url)
            .field("limiter", &self.limiter)
            .finish()
    }
}
