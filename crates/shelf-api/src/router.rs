//! Route table.

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use shelf_core::ServerConfig;
use shelf_observability::http_request_span;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::handlers;
use crate::middleware::{propagate_request_id, require_admin};
use crate::AppState;

/// Build the full router.
///
/// Admin routes (`stats`, `clear`, `override`) sit behind the bearer-token
/// check; everything else is public.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let admin = Router::new()
        .route("/products/:key/stats", get(handlers::stats))
        .route("/products/:key/clear", post(handlers::clear))
        .route(
            "/products/:key/override",
            get(handlers::get_override).post(handlers::put_override),
        )
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/products/:key/merged", get(handlers::merged))
        .route("/affiliate/click", post(handlers::record_click))
        .route("/nutrition/search", get(handlers::nutrition_search))
        .route("/nutrition/foods/:fdc_id", get(handlers::nutrition_food))
        .merge(admin)
        .layer(TimeoutLayer::new(Duration::from_millis(server.request_timeout_ms)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| http_request_span(request))
                .on_response(|response: &Response, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    tracing::info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        "response"
                    );
                }),
        )
        .layer(from_fn(propagate_request_id))
        .with_state(state)
}
