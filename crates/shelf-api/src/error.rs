//! HTTP error mapping.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shelf_catalog::CatalogError;
use shelf_clicks::ClickError;
use shelf_core::ShelfError;
use shelf_security::AuthError;
use shelf_sources::SourceError;
use tracing::{error, warn};

/// An engine error on its way to becoming a response.
///
/// Body shape is `{"error": <kind>, "message": <text>}`; rate-limit
/// responses add `retryAfterSeconds` and a `Retry-After` header.
#[derive(Debug)]
pub struct ApiError(pub ShelfError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ShelfError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ShelfError::AuthFailure => StatusCode::UNAUTHORIZED,
            ShelfError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ShelfError::NotFound(_) => StatusCode::NOT_FOUND,
            ShelfError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            ShelfError::ActorUnavailable(_) | ShelfError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, status = status.as_u16(), "request failed");
        } else {
            warn!(error = %self.0, status = status.as_u16(), "request rejected");
        }

        let mut body = json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        let retry_after = match &self.0 {
            ShelfError::RateLimited {
                retry_after_seconds,
                ..
            } => Some(*retry_after_seconds),
            _ => None,
        };
        if let Some(seconds) = retry_after {
            body["retryAfterSeconds"] = json!(seconds);
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<ShelfError> for ApiError {
    fn from(e: ShelfError) -> Self {
        Self(e)
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        Self(e.into())
    }
}

impl From<ClickError> for ApiError {
    fn from(e: ClickError) -> Self {
        Self(e.into())
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        Self(e.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ShelfError::InvalidInput("bad key".into()), 400),
            (ShelfError::AuthFailure, 401),
            (ShelfError::NotFound("food 1".into()), 404),
            (ShelfError::unavailable("usda", "timeout"), 502),
            (ShelfError::ActorUnavailable("a".into()), 500),
            (ShelfError::Internal("boom".into()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status().as_u16(), expected);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError(ShelfError::RateLimited {
            upstream: "usda".into(),
            retry_after_seconds: 42,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
