//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Configured addresses
//!     → endpoint.rs (normalize, derive offset)
//!     → round_robin.rs (one cursor per pool)
//!     → purpose.rs (purpose → pool, when groups are configured)
//!     → Balancer (flat or purpose-aware)
//!     → EndpointInfo handed to the client pool
//! ```
//!
//! # Design Decisions
//! - Pools are built once at startup and never mutated
//! - The cursor is the only contended state
//! - A missing purpose is a routing error, never a fallback

pub mod endpoint;
pub mod purpose;
pub mod round_robin;

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::config::{BackendConfig, BalancerKind};
use self::endpoint::{normalize, EndpointInfo};
use self::purpose::PurposeRouter;
use self::round_robin::RoundRobin;

/// Well-known purposes.
pub mod purposes {
    pub const QUERY: &str = "query";
    pub const MUTATION: &str = "mutation";
    pub const UPSERT: &str = "upsert";
}

/// Errors returned when no node can be picked for a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("no endpoints defined for purpose: {0}")]
    UnknownPurpose(String),

    #[error("no valid endpoints for purpose: {0}")]
    EmptyPool(String),

    #[error("no backend endpoints available")]
    NoEndpoints,
}

/// Errors that prevent a balancer from being built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalancerError {
    #[error("no valid endpoint could be processed for the {0} balancer")]
    NoValidEndpoints(&'static str),

    #[error("no valid endpoint could be processed for purpose groups: {}", .0.join(", "))]
    UnusableGroups(Vec<String>),
}

/// The balancing strategy in use.
///
/// Purpose-aware routing is preferred whenever groups are configured;
/// otherwise a single flat selector serves every purpose.
#[derive(Debug)]
pub enum Balancer {
    Flat(RoundRobin),
    Purposeful(PurposeRouter),
}

impl Balancer {
    /// Build the balancer from backend settings and optional purpose groups.
    pub fn from_config(
        backend: &BackendConfig,
        groups: &HashMap<String, Vec<String>>,
    ) -> Result<Self, BalancerError> {
        if !groups.is_empty() {
            tracing::info!(groups = groups.len(), "Running purpose-aware balancer");
            let (router, unusable) = PurposeRouter::new(groups);
            if !unusable.is_empty() {
                return Err(BalancerError::UnusableGroups(unusable));
            }
            return Ok(Balancer::Purposeful(router));
        }

        match backend.balancer {
            BalancerKind::RoundRobin => {
                tracing::info!("Running round-robin balancer");
                let set = normalize(&backend.endpoints);
                if set.all_rejected() {
                    return Err(BalancerError::NoValidEndpoints("round-robin"));
                }
                Ok(Balancer::Flat(RoundRobin::new(set.accepted)))
            }
        }
    }

    /// Pick the next node for a purpose.
    pub fn next(&self, purpose: &str) -> Result<EndpointInfo, RoutingError> {
        match self {
            Balancer::Purposeful(router) => router.next(purpose),
            Balancer::Flat(selector) => selector.next().ok_or(RoutingError::NoEndpoints),
        }
    }

    /// Every distinct address the balancer can hand out.
    pub fn all_endpoints(&self) -> BTreeSet<String> {
        match self {
            Balancer::Purposeful(router) => router.all_endpoints(),
            Balancer::Flat(selector) => selector
                .nodes()
                .iter()
                .map(|node| node.address.clone())
                .collect(),
        }
    }

    pub fn is_purpose_aware(&self) -> bool {
        matches!(self, Balancer::Purposeful(_))
    }
}
