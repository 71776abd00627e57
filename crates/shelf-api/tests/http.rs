use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use shelf_api::{router, AppState};
use shelf_cache::{Cache, MemoryStore};
use shelf_catalog::{MergeOrchestrator, OverrideStore};
use shelf_clicks::{ActorPool, ClickLedger};
use shelf_core::{ClicksConfig, ProductKey, ServerConfig, SharedClock, SystemClock};
use shelf_fetch::Upstream;
use shelf_security::AdminToken;
use shelf_sources::{
    Food, NutritionSource, OfferQuery, OfferRecord, OfferSource, ProductSource, SourceError,
    SourceResult, UpstreamProductRecord,
};
use tower::ServiceExt;

const TOKEN: &str = "s3cret";
const KEY: &str = "8901030895555";

#[derive(Default)]
struct Products {
    calls: AtomicUsize,
}

#[async_trait]
impl ProductSource for Products {
    async fn product(&self, key: &ProductKey) -> SourceResult<UpstreamProductRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if key.as_str() != KEY {
            return Err(SourceError::NotFound {
                upstream: Upstream::OpenFood,
                what: format!("product {key}"),
            });
        }
        Ok(UpstreamProductRecord {
            name: Some("Masala Chai".into()),
            brand: Some("Tata".into()),
            category: Some("Tea".into()),
            hero_image: Some("https://img/chai.jpg".into()),
            images: vec!["https://img/chai.jpg".into()],
            ingredients: Some("black tea, spices".into()),
            labels: vec!["en:vegetarian".into()],
            allergens: vec![],
        })
    }
}

struct Offers;

#[async_trait]
impl OfferSource for Offers {
    async fn search(&self, query: &OfferQuery) -> SourceResult<Vec<OfferRecord>> {
        if !query.is_exact() {
            return Ok(vec![]);
        }
        Ok(vec![OfferRecord {
            item_id: "v1|1|0".into(),
            title: "Masala Chai 250g".into(),
            price: None,
            seller: Some("teashop".into()),
            url: Some("https://market/item/1".into()),
            affiliate_url: Some("https://market/item/1?campid=5338".into()),
            image: Some("https://img/offer.jpg".into()),
            brand: None,
        }])
    }
}

struct Nutrition;

#[async_trait]
impl NutritionSource for Nutrition {
    async fn search(&self, client: &str, query: &str) -> SourceResult<Vec<Food>> {
        if client == "203.0.113.66" {
            return Err(SourceError::RateLimited {
                upstream: Upstream::Nutrition,
                retry_after_seconds: 120,
            });
        }
        Ok(vec![Food {
            fdc_id: 1,
            description: query.to_string(),
            brand_owner: None,
            data_type: None,
            nutrients: vec![],
        }])
    }

    async fn food(&self, _client: &str, fdc_id: u64) -> SourceResult<Food> {
        Err(SourceError::NotFound {
            upstream: Upstream::Nutrition,
            what: format!("food {fdc_id}"),
        })
    }
}

struct Harness {
    app: Router,
    clicks: ClickLedger,
    products: Arc<Products>,
}

fn harness() -> Harness {
    let clock: SharedClock = SystemClock::shared();
    let cache = Cache::new(MemoryStore::shared());
    let products = Arc::new(Products::default());
    let catalog = MergeOrchestrator::new(
        products.clone(),
        Arc::new(Offers),
        OverrideStore::new(cache.clone(), clock.clone()),
        cache.clone(),
        clock.clone(),
        Duration::from_secs(14_400),
    );
    let config = ClicksConfig::default();
    let actors = Arc::new(ActorPool::new(Cache::new(MemoryStore::shared()), &config));
    let clicks = ClickLedger::new(actors, cache, clock, &config);
    let state = AppState::new(
        catalog,
        clicks.clone(),
        Arc::new(Nutrition),
        AdminToken::new(TOKEN),
    );
    Harness {
        app: router(state, &ServerConfig::default()),
        clicks,
        products,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value, admin: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "shelf-test/1.0")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1");
    if admin {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_health_echoes_request_id() {
    let h = harness();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(headers["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_merged_miss_then_hit() {
    let h = harness();
    let uri = format!("/products/{KEY}/merged");

    let (status, headers, body) = send(&h.app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache"], "MISS");
    assert_eq!(body["name"], "Masala Chai");
    assert_eq!(body["brand"], "Tata");
    assert_eq!(body["labels"], json!(["vegetarian"]));
    assert_eq!(body["offers"]["primary"]["itemId"], "v1|1|0");
    assert_eq!(body["source"]["obf"]["available"], true);
    assert_eq!(body["source"]["overrides"]["applied"], false);
    settle().await;

    let (_, headers, again) = send(&h.app, get(&uri)).await;
    assert_eq!(headers["x-cache"], "HIT");
    assert_eq!(again, body);
    assert_eq!(h.products.calls.load(Ordering::SeqCst), 1);

    let (_, headers, _) = send(&h.app, get(&format!("{uri}?forceRefresh=true"))).await;
    assert_eq!(headers["x-cache"], "MISS");
    assert_eq!(h.products.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_override_scenario() {
    let h = harness();
    let merged_uri = format!("/products/{KEY}/merged");
    send(&h.app, get(&merged_uri)).await;
    settle().await;

    let (status, _, body) = send(
        &h.app,
        post_json(
            &format!("/products/{KEY}/override"),
            json!({"brand": "Acme", "name": null}),
            true,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["override"]["brand"], "Acme");
    assert!(body["override"]["updatedAt"].is_string());

    let (_, headers, merged) = send(&h.app, get(&merged_uri)).await;
    assert_eq!(headers["x-cache"], "MISS");
    assert_eq!(merged["brand"], "Acme");
    assert_eq!(merged["name"], "Masala Chai");
    assert_eq!(merged["source"]["overrides"]["applied"], true);

    let (status, _, current) = send(&h.app, admin_get(&format!("/products/{KEY}/override"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["brand"], "Acme");
}

#[tokio::test]
async fn test_override_rejects_bad_image() {
    let h = harness();
    let (status, _, body) = send(
        &h.app,
        post_json(
            &format!("/products/{KEY}/override"),
            json!({"images": ["ftp://nope"]}),
            true,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn test_invalid_key_rejected() {
    let h = harness();
    let (status, _, body) = send(&h.app, get("/products/abc123/merged")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
    assert_eq!(h.products.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let h = harness();
    let (status, _, body) = send(&h.app, get(&format!("/products/{KEY}/stats"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth_failure");

    let request = Request::builder()
        .uri(format!("/products/{KEY}/stats"))
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_click_counting_and_fallback() {
    let h = harness();
    let click = json!({"key": KEY, "offerItemId": "v1|1|0", "affiliateUrl": "https://market/item/1"});

    for n in 1..=3 {
        let (status, _, body) = send(&h.app, post_json("/affiliate/click", click.clone(), false)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "newCount": n}));
    }

    let (_, _, stats) = send(&h.app, admin_get(&format!("/products/{KEY}/stats"))).await;
    assert_eq!(stats["count"], 3);
    assert_eq!(stats["recentClicks"][0]["clientIp"], "203.0.113.9");
    assert_eq!(stats["recentClicks"][0]["userAgent"], "shelf-test/1.0");
    assert!(stats.get("fallback").is_none());

    h.clicks.actors().set_offline(true);
    let (status, _, body) = send(&h.app, post_json("/affiliate/click", click, false)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "newCount": 1, "fallback": true}));

    let (_, _, stats) = send(&h.app, admin_get(&format!("/products/{KEY}/stats"))).await;
    assert_eq!(stats["fallback"], true);
    assert_eq!(stats["count"], 1);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/products/{KEY}/clear"))
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    h.clicks.actors().set_offline(false);
    let (_, _, stats) = send(&h.app, admin_get(&format!("/products/{KEY}/stats"))).await;
    assert_eq!(stats, json!({"count": 0, "recentClicks": []}));
}

#[tokio::test]
async fn test_click_requires_affiliate_url() {
    let h = harness();
    let (status, _, body) = send(
        &h.app,
        post_json("/affiliate/click", json!({"key": KEY, "affiliateUrl": " "}), false),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let (status, _, _) = send(&h.app, post_json("/affiliate/click", json!({"key": KEY}), false)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_nutrition_routes() {
    let h = harness();
    let (status, _, body) = send(&h.app, get("/nutrition/search?query=banana")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["foods"][0]["description"], "banana");

    let (status, _, _) = send(&h.app, get("/nutrition/search?query=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/nutrition/search?query=banana")
        .header("x-forwarded-for", "203.0.113.66")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers[header::RETRY_AFTER], "120");
    assert_eq!(body["error"], "rate_limited");
    assert_eq!(body["retryAfterSeconds"], 120);

    let (status, _, body) = send(&h.app, get("/nutrition/foods/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
