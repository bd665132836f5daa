//! Request dispatch core.
//!
//! # Data Flow
//! ```text
//! HTTP handler / channel session
//!     → payload.rs (decode body by content kind)
//!     → Proxy::select_client (balancer → address → pooled client)
//!     → dispatch.rs (query / mutate / upsert fan-out)
//!     → schema.rs (strip internal schema entries)
//!     → GraphResponse back to the caller's protocol
//! ```
//!
//! # Design Decisions
//! - `Proxy` is built once and passed to every handler (no globals)
//! - Errors carry enough context to pick the HTTP status in one place

pub mod dispatch;
pub mod payload;
pub mod schema;

use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::{BackendError, ClientPool, GraphClient};
use crate::load_balancer::endpoint::{EndpointError, EndpointInfo};
use crate::load_balancer::{Balancer, RoutingError};
use crate::observability::metrics;
use self::payload::PayloadError;

pub use dispatch::is_dql;

/// Everything that can go wrong while serving one operation.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("backend client not found for endpoint {0}")]
    MissingClient(String),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("error performing {op}: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("some upserts failed: {}", .0.join("; "))]
    Upserts(Vec<String>),

    #[error("invalid backend endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),
}

impl ProxyError {
    pub fn backend(op: &'static str, source: BackendError) -> Self {
        ProxyError::Backend { op, source }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Routing(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Payload(PayloadError::UnsupportedContentType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ProxyError::Payload(_) => StatusCode::BAD_REQUEST,
            ProxyError::InvalidEndpoint(_) => StatusCode::BAD_GATEWAY,
            ProxyError::MissingClient(_)
            | ProxyError::Backend { .. }
            | ProxyError::Upserts(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Shared dispatch state: balancer, client pool and feature switches.
#[derive(Debug)]
pub struct Proxy {
    balancer: Balancer,
    pool: ClientPool,
    graphql: bool,
    frontend: Option<String>,
}

impl Proxy {
    pub fn new(balancer: Balancer, pool: ClientPool, graphql: bool, frontend: Option<String>) -> Self {
        Self {
            balancer,
            pool,
            graphql,
            frontend,
        }
    }

    pub fn balancer(&self) -> &Balancer {
        &self.balancer
    }

    /// Whether non-DQL `/query` payloads go to the GraphQL endpoint.
    pub fn graphql_allowed(&self) -> bool {
        self.graphql
    }

    /// Address of the administrative frontend, if any.
    pub fn frontend(&self) -> Option<&str> {
        self.frontend.as_deref()
    }

    /// Pick a node for `purpose` and return its pooled client.
    pub fn select_client(
        &self,
        purpose: &str,
    ) -> Result<(EndpointInfo, Arc<dyn GraphClient>), ProxyError> {
        let endpoint = self.select_endpoint(purpose)?;
        let client = self
            .pool
            .get(&endpoint.address)
            .ok_or_else(|| ProxyError::MissingClient(endpoint.address.clone()))?;
        tracing::debug!(purpose = %purpose, endpoint = %endpoint, "Selected backend");
        Ok((endpoint, client))
    }

    /// Pick a node for `purpose` and return its HTTP `host:port`.
    pub fn select_http_host(&self, purpose: &str) -> Result<String, ProxyError> {
        let endpoint = self.select_endpoint(purpose)?;
        let host = endpoint.http_authority()?;
        tracing::debug!(purpose = %purpose, endpoint = %endpoint, http = %host, "Selected backend host");
        Ok(host)
    }

    fn select_endpoint(&self, purpose: &str) -> Result<EndpointInfo, ProxyError> {
        self.balancer.next(purpose).map_err(|e| {
            metrics::record_routing_error(purpose);
            tracing::warn!(purpose = %purpose, error = %e, "No backend for purpose");
            ProxyError::Routing(e)
        })
    }
}
