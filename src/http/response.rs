//! Response construction.
//!
//! # Responsibilities
//! - Render engine replies as `{"data", "extensions"}` bodies
//! - Map proxy errors onto `{"error": "..."}` bodies with the right status
//! - Strip hop-by-hop headers from forwarded responses
//!
//! # Design Decisions
//! - Every error body has the same shape, whatever produced it
//! - Bodies are built with `serde_json`, never by string formatting

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::backend::GraphResponse;
use crate::proxy::ProxyError;

/// Headers that describe a single hop and are never forwarded.
const HOP_BY_HOP: [header::HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

/// `{"error": message}` with `status`.
pub fn json_error(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        json_error(self.status(), &self)
    }
}

/// Body of a successful data operation.
///
/// Mutations additionally carry the UIDs the engine assigned.
pub fn graph_body(response: &GraphResponse, with_uids: bool) -> Value {
    let mut body = json!({
        "data": response.json,
        "extensions": {
            "server_latency": response.latency,
            "txn": { "start_ts": response.txn.start_ts },
            "metrics": response.metrics,
        },
    });
    if with_uids && !response.uids.is_empty() {
        body["uids"] = json!(response.uids);
    }
    body
}

pub fn graph_reply(response: &GraphResponse, with_uids: bool) -> Response {
    (StatusCode::OK, Json(graph_body(response, with_uids))).into_response()
}

/// Remove hop-by-hop headers (plus `Upgrade` and `Keep-Alive`) in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(header::UPGRADE);
    headers.remove("keep-alive");
}
