//! Request spans and request-id propagation.

use http::{HeaderValue, Request};
use shelf_core::RequestId;
use tracing::Span;

/// Span wrapping one inbound request.
pub fn request_span(request_id: &RequestId, method: &str, path: &str) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request_id,
        method,
        path,
        status = tracing::field::Empty,
    )
}

/// The request's id: the inbound `x-request-id` when well-formed, else a fresh one.
pub fn ensure_request_id<B>(request: &Request<B>) -> RequestId {
    RequestId::from_header(
        request
            .headers()
            .get(RequestId::HEADER)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Resolve the request id and write it back onto the request headers so
/// later layers and handlers see the same value.
pub fn stamp_request_id<B>(request: &mut Request<B>) -> RequestId {
    let id = ensure_request_id(request);
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        request.headers_mut().insert(RequestId::HEADER, value);
    }
    id
}

/// Span for an HTTP request, for use as a `TraceLayer` span maker.
pub fn http_request_span<B>(request: &Request<B>) -> Span {
    request_span(
        &ensure_request_id(request),
        request.method().as_str(),
        request.uri().path(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_id_is_kept() {
        let mut request = Request::builder()
            .uri("/health")
            .header("x-request-id", "abc-123")
            .body(())
            .unwrap();
        assert_eq!(stamp_request_id(&mut request).as_str(), "abc-123");
        assert_eq!(request.headers()["x-request-id"], "abc-123");
    }

    #[test]
    fn test_missing_or_bad_id_is_replaced() {
        let mut request = Request::builder()
            .uri("/health")
            .header("x-request-id", "has spaces")
            .body(())
            .unwrap();
        let id = stamp_request_id(&mut request);
        assert_ne!(id.as_str(), "has spaces");
        assert_eq!(request.headers()["x-request-id"], id.as_str());

        let again = ensure_request_id(&request);
        assert_eq!(again, id);
    }

    #[test]
    fn test_span_builds_without_subscriber() {
        let request = Request::builder().uri("/products/1/merged").body(()).unwrap();
        let _span = http_request_span(&request);
    }
}
