//! Request middleware.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use shelf_observability::{stamp_request_id, RequestId};

use crate::{ApiError, AppState};

/// Reject admin routes without the configured bearer token.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    state.admin.verify_header(authorization)?;
    Ok(next.run(request).await)
}

/// Resolve the request id before tracing sees the request and echo it back.
pub async fn propagate_request_id(mut request: Request, next: Next) -> Response {
    let id = stamp_request_id(&mut request);
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(RequestId::HEADER, value);
    }
    response
}
