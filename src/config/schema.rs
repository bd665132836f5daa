//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend cluster and client settings.
    pub backend: BackendConfig,

    /// Optional purpose → endpoints grouping (`query`, `mutation`, `upsert`, ...).
    pub groups: HashMap<String, Vec<String>>,

    /// Feature toggles.
    pub features: FeatureConfig,

    /// Persistent channel settings.
    pub websocket: WebSocketConfig,

    /// Administrative frontend target for the catch-all route.
    pub frontend: FrontendConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Balancing strategy for the flat endpoint list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum BalancerKind {
    #[default]
    #[serde(rename = "round-robin")]
    RoundRobin,
}

impl std::str::FromStr for BalancerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(BalancerKind::RoundRobin),
            other => Err(format!("unknown balancer type: {}", other)),
        }
    }
}

/// Backend cluster configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Wire-protocol addresses of the database nodes (e.g., "alpha1:9080").
    pub endpoints: Vec<String>,

    /// Strategy used when no purpose groups are configured.
    pub balancer: BalancerKind,

    /// ACL user (empty disables login).
    pub user: String,

    /// ACL password.
    #[serde(skip_serializing)]
    pub password: String,

    /// Per-call timeout toward a node in seconds.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Attempts per call on transient failures (1 disables retries).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            balancer: BalancerKind::RoundRobin,
            user: String::new(),
            password: String::new(),
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Feature toggles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Mount the HTTP data and admin routes.
    pub http: bool,

    /// Forward non-DQL `/query` payloads to the node's GraphQL endpoint.
    pub graphql: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            http: true,
            graphql: true,
        }
    }
}

/// Persistent channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Serve `/ws`.
    pub enabled: bool,

    /// Optional dedicated listener for `/ws` (e.g., "0.0.0.0:8089").
    pub bind_address: Option<String>,

    /// Shared secret expected in `auth`/`login` messages.
    #[serde(skip_serializing)]
    pub auth_token: String,

    /// Consecutive failed authentication attempts before the channel is closed.
    pub max_auth_attempts: u32,
}

/// Placeholder token shipped in the defaults.
pub const PLACEHOLDER_TOKEN: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: None,
            // WARNING: This is a placeholder! Change this in production.
            auth_token: PLACEHOLDER_TOKEN.to_string(),
            max_auth_attempts: 8,
        }
    }
}

/// Administrative frontend configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// `host:port` of the admin UI (e.g., "ratel:8000").
    pub address: Option<String>,
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [backend]
            endpoints = ["alpha1:9080"]
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.endpoints, vec!["alpha1:9080"]);
        assert_eq!(config.backend.balancer, BalancerKind::RoundRobin);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.features.http);
        assert!(config.features.graphql);
        assert!(config.websocket.enabled);
        assert_eq!(config.websocket.max_auth_attempts, 8);
        assert!(config.groups.is_empty());
    }

    #[test]
    fn groups_and_balancer_parse() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [backend]
            balancer = "round-robin"

            [groups]
            query = ["alpha1:9080", "alpha2:9081"]
            mutation = ["alpha3:9082"]
            "#,
        )
        .unwrap();

        assert_eq!(config.groups["query"].len(), 2);
        assert_eq!(config.groups["mutation"], vec!["alpha3:9082"]);
    }

    #[test]
    fn unknown_balancer_is_rejected() {
        let result: Result<ProxyConfig, _> = toml::from_str(
            r#"
            [backend]
            balancer = "round-robin-healthy"
            "#,
        );
        assert!(result.is_err());
        assert!("least-conn".parse::<BalancerKind>().is_err());
    }
}
