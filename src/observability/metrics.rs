//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route, status
//! - `proxy_request_duration_seconds` (histogram): latency by route
//! - `proxy_backend_calls_total` (counter): engine calls by op, endpoint, outcome
//! - `proxy_backend_call_duration_seconds` (histogram): engine call latency by op
//! - `proxy_routing_errors_total` (counter): failed node selections by purpose
//! - `proxy_ws_sessions_active` (gauge): open channel sessions
//! - `proxy_ws_messages_total` (counter): channel messages by type, outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is only installed when enabled in config

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

pub fn record_request(route: &'static str, status: u16, elapsed: Duration) {
    counter!("proxy_requests_total", "route" => route, "status" => status.to_string()).increment(1);
    histogram!("proxy_request_duration_seconds", "route" => route).record(elapsed.as_secs_f64());
}

pub fn record_backend_call(op: &'static str, endpoint: &str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        "proxy_backend_calls_total",
        "op" => op,
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("proxy_backend_call_duration_seconds", "op" => op).record(elapsed.as_secs_f64());
}

pub fn record_routing_error(purpose: &str) {
    counter!("proxy_routing_errors_total", "purpose" => purpose.to_string()).increment(1);
}

pub fn ws_session_opened() {
    gauge!("proxy_ws_sessions_active").increment(1.0);
}

pub fn ws_session_closed() {
    gauge!("proxy_ws_sessions_active").decrement(1.0);
}

pub fn record_ws_message(kind: &str, outcome: &'static str) {
    counter!("proxy_ws_messages_total", "type" => kind.to_string(), "outcome" => outcome).increment(1);
}
