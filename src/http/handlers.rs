//! Data and pass-through route handlers.
//!
//! # Routes
//! - `POST /query`: native query, or GraphQL forward for non-DQL payloads
//! - `POST /mutate`: single mutation or concurrent upsert blocks
//! - `/graphql`: forwarded to the selected node's GraphQL endpoint
//! - allow-listed admin paths: forwarded to the selected node
//! - anything else: forwarded to the administrative frontend

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::http::forward::path_and_query;
use crate::http::request::{content_kind, request_id};
use crate::http::response::{graph_reply, json_error};
use crate::http::server::AppState;
use crate::load_balancer::purposes;
use crate::observability::metrics;
use crate::proxy::payload::{parse_mutation_body, parse_query_body};
use crate::proxy::ProxyError;

/// Paths `direct` is allowed to forward.
pub const DIRECT_PATHS: &[&str] = &["/alter", "/health", "/ui/keywords", "/admin/schema", "/state"];

pub async fn query(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let text = match content_kind(&headers).and_then(|kind| parse_query_body(kind, &body)) {
        Ok(text) => text,
        Err(e) => return finish("query", started, ProxyError::from(e).into_response()),
    };

    if state.proxy.wants_graphql(&text) {
        tracing::debug!(request_id = %request_id(&headers), "Payload is not DQL, forwarding to GraphQL");
        let target = graphql_target(&uri);
        let response = forward_to_node(&state, &target, &method, &headers, body).await;
        return finish("query", started, response);
    }

    let response = match state.proxy.run_query(purposes::QUERY, &text).await {
        Ok(reply) => graph_reply(&reply, false),
        Err(e) => {
            tracing::error!(request_id = %request_id(&headers), error = %e, "Query failed");
            e.into_response()
        }
    };
    finish("query", started, response)
}

pub async fn mutate(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let started = Instant::now();
    let request = match content_kind(&headers).and_then(|kind| parse_mutation_body(kind, &body)) {
        Ok(request) => request,
        Err(e) => return finish("mutate", started, ProxyError::from(e).into_response()),
    };

    let response = match state.proxy.run_mutation_request(&request).await {
        Ok(reply) => graph_reply(&reply, true),
        Err(e) => {
            tracing::error!(request_id = %request_id(&headers), error = %e, "Mutation failed");
            e.into_response()
        }
    };
    finish("mutate", started, response)
}

pub async fn graphql(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let target = graphql_target(&uri);
    let response = forward_to_node(&state, &target, &method, &headers, body).await;
    finish("graphql", started, response)
}

/// Allow-listed administrative pass-through.
pub async fn direct(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    if !DIRECT_PATHS.contains(&uri.path()) {
        tracing::warn!(path = %uri.path(), "Rejected direct request for path outside the allow-list");
        return finish("direct", started, json_error(StatusCode::FORBIDDEN, "Path not allowed"));
    }
    let response = forward_to_node(&state, path_and_query(&uri), &method, &headers, body).await;
    finish("direct", started, response)
}

/// Catch-all: the administrative frontend, when one is configured.
pub async fn frontend(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let Some(host) = state.proxy.frontend() else {
        return finish("frontend", started, json_error(StatusCode::NOT_FOUND, "Not found"));
    };
    let response = match state
        .forwarder
        .forward(host, path_and_query(&uri), &method, &headers, body)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(frontend = %host, error = %e, "Frontend unreachable");
            json_error(StatusCode::BAD_GATEWAY, e)
        }
    };
    finish("frontend", started, response)
}

fn graphql_target(uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("/graphql?{}", query),
        None => "/graphql".to_string(),
    }
}

/// Forward to the HTTP port of the node selected for the query purpose.
async fn forward_to_node(
    state: &AppState,
    target: &str,
    method: &Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let host = match state.proxy.select_http_host(purposes::QUERY) {
        Ok(host) => host,
        Err(e) => return e.into_response(),
    };
    match state.forwarder.forward(&host, target, method, headers, body).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id(headers), upstream = %host, error = %e, "Forwarding failed");
            json_error(StatusCode::BAD_GATEWAY, e)
        }
    }
}

fn finish(route: &'static str, started: Instant, response: Response) -> Response {
    metrics::record_request(route, response.status().as_u16(), started.elapsed());
    response
}
