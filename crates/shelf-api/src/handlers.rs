//! Route handlers.

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shelf_cache::CacheStatus;
use shelf_catalog::OverrideRecord;
use shelf_clicks::{ClickEvent, ClickReceipt, ClickStats};
use shelf_core::{ProductKey, ShelfError};
use shelf_sources::Food;
use tracing::info;

use crate::{ApiError, AppState};

type ApiResult<T> = Result<T, ApiError>;

fn parse_key(raw: &str) -> ApiResult<ProductKey> {
    Ok(ProductKey::parse(raw)?)
}

fn invalid(rejection: JsonRejection) -> ApiError {
    ApiError(ShelfError::InvalidInput(rejection.body_text()))
}

/// Caller address: first `X-Forwarded-For` hop, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn peer(connect: Option<ConnectInfo<SocketAddr>>) -> Option<SocketAddr> {
    connect.map(|ConnectInfo(addr)| addr)
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedParams {
    #[serde(default)]
    pub force_refresh: bool,
}

pub async fn merged(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<MergedParams>,
) -> ApiResult<Response> {
    let key = parse_key(&key)?;
    let (merged, status) = state.catalog.get_merged(&key, params.force_refresh).await?;
    Ok(([(CacheStatus::HEADER, status.as_str())], Json(merged)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRequest {
    pub key: String,
    #[serde(default)]
    pub offer_item_id: Option<String>,
    pub affiliate_url: String,
    /// Unix milliseconds; defaults to receipt time.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ClickResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub receipt: ClickReceipt,
}

pub async fn record_click(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<ClickRequest>, JsonRejection>,
) -> ApiResult<Json<ClickResponse>> {
    let Json(request) = body.map_err(invalid)?;
    let key = parse_key(&request.key)?;
    if request.affiliate_url.trim().is_empty() {
        return Err(ApiError(ShelfError::InvalidInput("affiliateUrl is required".into())));
    }

    let timestamp = request
        .timestamp
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);
    let mut event = ClickEvent::new(key, request.affiliate_url.trim(), timestamp)
        .with_client_ip(client_ip(&headers, peer(connect)));
    if let Some(item) = request.offer_item_id {
        event = event.with_offer_item(item);
    }
    if let Some(ua) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        event = event.with_user_agent(ua);
    }

    let receipt = state.clicks.record_click(event).await?;
    Ok(Json(ClickResponse { ok: true, receipt }))
}

pub async fn stats(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<ClickStats>> {
    let key = parse_key(&key)?;
    Ok(Json(state.clicks.get_stats(&key).await?))
}

pub async fn clear(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<Value>> {
    let key = parse_key(&key)?;
    state.clicks.clear(&key).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn get_override(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<OverrideRecord>> {
    let key = parse_key(&key)?;
    Ok(Json(state.catalog.overrides().get(&key).await?))
}

pub async fn put_override(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Result<Json<OverrideRecord>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let key = parse_key(&key)?;
    let Json(record) = body.map_err(invalid)?;
    let stored = state.catalog.overrides().put(&key, record).await?;
    info!(key = %key, "override updated");
    Ok(Json(json!({ "ok": true, "override": stored })))
}

#[derive(Debug, Default, Deserialize)]
pub struct NutritionParams {
    #[serde(default)]
    pub query: String,
}

pub async fn nutrition_search(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<NutritionParams>,
) -> ApiResult<Json<Value>> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(ApiError(ShelfError::InvalidInput("query is required".into())));
    }
    let client = client_ip(&headers, peer(connect));
    let foods = state.nutrition.search(&client, query).await?;
    Ok(Json(json!({ "query": query, "foods": foods })))
}

pub async fn nutrition_food(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(fdc_id): Path<u64>,
) -> ApiResult<Json<Food>> {
    let client = client_ip(&headers, peer(connect));
    Ok(Json(state.nutrition.food(&client, fdc_id).await?))
}
