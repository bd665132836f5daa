//! Shared utilities for integration tests.
//!
//! A mock database node speaks just enough of the node HTTP API for the
//! proxy's client, and the proxy itself runs on a loopback listener.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{any, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use otter_proxy::config::ProxyConfig;
use otter_proxy::lifecycle::{build_proxy, Shutdown};
use otter_proxy::HttpServer;

pub const TOKEN: &str = "integration-token";

/// What the mock node has seen.
#[derive(Default)]
pub struct NodeLog {
    pub queries: AtomicUsize,
    pub mutations: AtomicUsize,
    pub admin_calls: AtomicUsize,
    pub bodies: Mutex<Vec<String>>,
}

impl NodeLog {
    pub fn calls(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
            + self.mutations.load(Ordering::SeqCst)
            + self.admin_calls.load(Ordering::SeqCst)
    }
}

pub struct MockNode {
    /// Wire address handed to the proxy; its HTTP port is 1000 lower.
    pub wire_address: String,
    pub log: Arc<NodeLog>,
}

/// Start a mock node on an ephemeral port.
pub async fn start_mock_node() -> MockNode {
    let log = Arc::new(NodeLog::default());
    let app = Router::new()
        .route("/query", post(mock_query))
        .route("/mutate", post(mock_mutate))
        .route("/health", any(mock_health))
        .route("/state", any(mock_state))
        .route("/graphql", any(mock_graphql))
        .with_state(log.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockNode {
        wire_address: format!("127.0.0.1:{}", http_port + 1000),
        log,
    }
}

async fn mock_query(State(log): State<Arc<NodeLog>>, body: Bytes) -> Json<Value> {
    log.queries.fetch_add(1, Ordering::SeqCst);
    let text = String::from_utf8_lossy(&body).to_string();
    log.bodies.lock().unwrap().push(text.clone());

    if text.contains("schema") {
        return Json(json!({
            "data": {
                "schema": [
                    {"predicate": "dgraph.type", "type": "string"},
                    {"predicate": "name", "type": "string"}
                ],
                "types": [{"name": "dgraph.graphql", "fields": []}]
            }
        }));
    }
    Json(json!({
        "data": {"q": [{"uid": "0x1", "name": "Julian"}]},
        "extensions": {
            "server_latency": {"parsing_ns": 10, "processing_ns": 20, "encoding_ns": 5, "total_ns": 35},
            "txn": {"start_ts": 11},
            "metrics": {"num_uids": {"name": 1}}
        }
    }))
}

async fn mock_mutate(State(log): State<Arc<NodeLog>>, body: Bytes) -> Json<Value> {
    log.mutations.fetch_add(1, Ordering::SeqCst);
    let text = String::from_utf8_lossy(&body).to_string();
    log.bodies.lock().unwrap().push(text.clone());

    if text.contains("reject-me") {
        return Json(json!({"errors": [{"message": "mutation rejected by engine"}]}));
    }
    Json(json!({
        "data": {"code": "Success", "uids": {"a": "0x2a"}},
        "extensions": {"txn": {"start_ts": 12, "commit_ts": 13, "preds": ["1-0-name"]}}
    }))
}

async fn mock_health(State(log): State<Arc<NodeLog>>) -> Json<Value> {
    log.admin_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!([{"instance": "alpha", "status": "healthy"}]))
}

async fn mock_state(State(log): State<Arc<NodeLog>>) -> Json<Value> {
    log.admin_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"counter": "1", "groups": {}}))
}

async fn mock_graphql(State(log): State<Arc<NodeLog>>, body: Bytes) -> Json<Value> {
    log.admin_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"data": {"echo": String::from_utf8_lossy(&body)}}))
}

pub struct TestProxy {
    pub addr: SocketAddr,
    pub node: MockNode,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Mock node plus a proxy in front of it; `configure` may adjust the config.
pub async fn start_proxy<F>(configure: F) -> TestProxy
where
    F: FnOnce(&mut ProxyConfig),
{
    let node = start_mock_node().await;

    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.backend.endpoints = vec![node.wire_address.clone()];
    config.backend.max_attempts = 1;
    config.websocket.auth_token = TOKEN.to_string();
    config.websocket.max_auth_attempts = 3;
    configure(&mut config);

    let proxy = Arc::new(build_proxy(&config).await.unwrap());
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, proxy);
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    TestProxy { addr, node, shutdown }
}

/// Client that never goes through a system proxy.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
