//! Request inspection helpers.
//!
//! # Responsibilities
//! - Expose the request ID assigned by the router layers
//! - Resolve the `Content-Type` header into a payload kind
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (`SetRequestIdLayer`)
//! - Header values that are not valid UTF-8 are treated as absent

use axum::http::{header, HeaderMap, HeaderName};

use crate::proxy::payload::{ContentKind, PayloadError};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID set by the router layers, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Raw `Content-Type` value.
pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

/// Payload kind announced by the request.
pub fn content_kind(headers: &HeaderMap) -> Result<ContentKind, PayloadError> {
    ContentKind::from_header(content_type(headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_request_id_is_unknown() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), "abc");
    }

    #[test]
    fn content_kind_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(content_kind(&headers).is_err());
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/rdf"));
        assert_eq!(content_kind(&headers), Ok(ContentKind::Dql));
    }
}
