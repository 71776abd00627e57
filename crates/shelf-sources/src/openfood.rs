//! Open product database adapter.

use async_trait::async_trait;
use serde::Deserialize;
use shelf_core::{OpenFoodConfig, ProductKey};
use shelf_fetch::{FetchClient, TimeoutConfig, Upstream};
use tracing::debug;

use crate::record::UpstreamProductRecord;
use crate::source::ProductSource;
use crate::{SourceError, SourceResult};

const UPSTREAM: Upstream = Upstream::OpenFood;

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: i64,
    product: Option<RawProduct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    product_name: Option<String>,
    product_name_en: Option<String>,
    brands: Option<String>,
    categories: Option<String>,
    image_front_url: Option<String>,
    image_url: Option<String>,
    image_ingredients_url: Option<String>,
    image_nutrition_url: Option<String>,
    ingredients_text: Option<String>,
    labels_tags: Vec<String>,
    allergens_tags: Vec<String>,
}

impl RawProduct {
    fn into_record(self) -> UpstreamProductRecord {
        let hero_image = non_blank(self.image_front_url.clone()).or_else(|| non_blank(self.image_url.clone()));

        let mut images: Vec<String> = Vec::new();
        for url in [
            self.image_front_url,
            self.image_url,
            self.image_ingredients_url,
            self.image_nutrition_url,
        ]
        .into_iter()
        .filter_map(non_blank)
        {
            if !images.contains(&url) {
                images.push(url);
            }
        }

        UpstreamProductRecord {
            name: non_blank(self.product_name).or_else(|| non_blank(self.product_name_en)),
            brand: first_of_list(self.brands.as_deref()),
            category: first_of_list(self.categories.as_deref()),
            hero_image,
            images,
            ingredients: non_blank(self.ingredients_text),
            labels: self.labels_tags,
            allergens: self.allergens_tags,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First entry of a comma-separated upstream list.
fn first_of_list(value: Option<&str>) -> Option<String> {
    value?
        .split(',')
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Adapter for the open product database.
///
/// One GET per product, no retry. A non-2xx status, `status != 1` or a
/// malformed body all mean the record is unavailable.
#[derive(Debug, Clone)]
pub struct OpenFoodAdapter {
    client: FetchClient,
    base_url: String,
}

impl OpenFoodAdapter {
    pub fn new(config: &OpenFoodConfig) -> SourceResult<Self> {
        let client = FetchClient::builder(UPSTREAM)
            .timeout(TimeoutConfig::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(SourceError::fetch(UPSTREAM))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn product_url(&self, key: &ProductKey) -> String {
        format!("{}/api/v2/product/{}.json", self.base_url, key)
    }
}

#[async_trait]
impl ProductSource for OpenFoodAdapter {
    async fn product(&self, key: &ProductKey) -> SourceResult<UpstreamProductRecord> {
        let url = self.product_url(key);
        let response: ProductResponse = self
            .client
            .get_json(&url, &[])
            .await
            .map_err(SourceError::fetch(UPSTREAM))?;

        match response {
            ProductResponse {
                status: 1,
                product: Some(product),
            } => {
                debug!(key = %key, "open product record fetched");
                Ok(product.into_record())
            }
            _ => Err(SourceError::NotFound {
                upstream: UPSTREAM,
                what: format!("product {key}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn adapter_for(app: Router) -> OpenFoodAdapter {
        let base_url = serve(app).await;
        OpenFoodAdapter::new(&OpenFoodConfig {
            base_url,
            ..OpenFoodConfig::default()
        })
        .unwrap()
    }

    fn key() -> ProductKey {
        ProductKey::parse("8901030895555").unwrap()
    }

    #[tokio::test]
    async fn test_product_is_mapped() {
        let app = Router::new().route(
            "/api/v2/product/:file",
            get(|Path(file): Path<String>| async move {
                assert_eq!(file, "8901030895555.json");
                Json(json!({
                    "status": 1,
                    "product": {
                        "product_name": "Green Tea",
                        "brands": "Leafy, Leafy Co",
                        "categories": "Beverages, Teas",
                        "image_front_url": "https://img/front.jpg",
                        "image_url": "https://img/front.jpg",
                        "image_nutrition_url": "https://img/nutrition.jpg",
                        "ingredients_text": "green tea leaves",
                        "labels_tags": ["en:organic"],
                        "allergens_tags": []
                    }
                }))
            }),
        );
        let adapter = adapter_for(app).await;

        let record = adapter.product(&key()).await.unwrap();
        assert_eq!(record.name.as_deref(), Some("Green Tea"));
        assert_eq!(record.brand.as_deref(), Some("Leafy"));
        assert_eq!(record.category.as_deref(), Some("Beverages"));
        assert_eq!(record.hero_image.as_deref(), Some("https://img/front.jpg"));
        assert_eq!(
            record.images,
            vec!["https://img/front.jpg", "https://img/nutrition.jpg"]
        );
        assert_eq!(record.labels, vec!["en:organic"]);
    }

    #[tokio::test]
    async fn test_status_zero_is_not_found() {
        let app = Router::new().route(
            "/api/v2/product/:file",
            get(|| async { Json(json!({"status": 0, "status_verbose": "product not found"})) }),
        );
        let adapter = adapter_for(app).await;

        let err = adapter.product(&key()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable_without_retry() {
        let app = Router::new().route(
            "/api/v2/product/:file",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let adapter = adapter_for(app).await;

        let err = adapter.product(&key()).await.unwrap_err();
        assert_eq!(err.note(), "HTTP 503");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let app = Router::new().route("/api/v2/product/:file", get(|| async { "<html>" }));
        let adapter = adapter_for(app).await;

        let err = adapter.product(&key()).await.unwrap_err();
        assert_eq!(err.note(), "malformed response");
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let record = RawProduct {
            product_name: Some("  ".into()),
            product_name_en: Some("Tea".into()),
            brands: Some(" , ".into()),
            ..RawProduct::default()
        }
        .into_record();
        assert_eq!(record.name.as_deref(), Some("Tea"));
        assert_eq!(record.brand, None);
        assert!(record.images.is_empty());
    }
}
