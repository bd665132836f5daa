//! Offline validation routes (`/validate/dql`, `/validate/schema`).
//!
//! Never touches a backend. Both routes share the same gate: POST only,
//! `application/dql` only, non-empty UTF-8 body.

use std::time::Instant;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::dql;
use crate::http::request::content_type;
use crate::http::response::json_error;
use crate::observability::metrics;
use crate::proxy::payload::{media_type, DQL_MEDIA_TYPE};

pub async fn validate_dql(method: Method, headers: HeaderMap, body: Bytes) -> Response {
    let started = Instant::now();
    let response = match accept(&method, &headers, &body) {
        Err(rejection) => rejection,
        Ok(text) => match dql::validate_dql(text) {
            Ok(kind) => valid(kind.label()),
            Err(e) => {
                tracing::debug!(error = %e, "DQL validation failed");
                json_error(StatusCode::BAD_REQUEST, e)
            }
        },
    };
    metrics::record_request("validate_dql", response.status().as_u16(), started.elapsed());
    response
}

pub async fn validate_schema(method: Method, headers: HeaderMap, body: Bytes) -> Response {
    let started = Instant::now();
    let response = match accept(&method, &headers, &body) {
        Err(rejection) => rejection,
        Ok(text) => match dql::validate_schema(text) {
            Ok(summary) => {
                tracing::debug!(
                    predicates = summary.predicates.len(),
                    types = summary.types.len(),
                    "Schema validated"
                );
                valid("schema")
            }
            Err(e) => json_error(StatusCode::BAD_REQUEST, e),
        },
    };
    metrics::record_request("validate_schema", response.status().as_u16(), started.elapsed());
    response
}

fn accept<'a>(method: &Method, headers: &HeaderMap, body: &'a [u8]) -> Result<&'a str, Response> {
    if method != Method::POST {
        return Err(json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed. Use POST."));
    }
    let is_dql = content_type(headers)
        .map(|ct| media_type(ct).eq_ignore_ascii_case(DQL_MEDIA_TYPE))
        .unwrap_or(false);
    if !is_dql {
        return Err(json_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Invalid Content-Type. Use application/dql.",
        ));
    }
    match std::str::from_utf8(body) {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(json_error(StatusCode::BAD_REQUEST, "Request body is empty or unreadable.")),
    }
}

fn valid(kind: &str) -> Response {
    (StatusCode::OK, Json(json!({ "status": "valid", "type": kind }))).into_response()
}
