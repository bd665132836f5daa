//! Startup orchestration.
//!
//! # Responsibilities
//! - Normalize endpoints and build the balancer
//! - Open one backend client per distinct address
//! - Assemble the shared `Proxy`
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use thiserror::Error;

use crate::backend::{BackendError, ClientPool};
use crate::config::ProxyConfig;
use crate::load_balancer::{Balancer, BalancerError};
use crate::proxy::Proxy;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build balancer: {0}")]
    Balancer(#[from] BalancerError),

    #[error("failed to connect backend clients: {0}")]
    Backend(#[from] BackendError),

    #[error("no backend endpoints available after normalization")]
    NoEndpoints,
}

/// Wire the balancer, the client pool and the feature switches together.
pub async fn build_proxy(config: &ProxyConfig) -> Result<Proxy, StartupError> {
    let balancer = Balancer::from_config(&config.backend, &config.groups)?;

    let addresses = balancer.all_endpoints();
    if addresses.is_empty() {
        return Err(StartupError::NoEndpoints);
    }
    tracing::info!(
        endpoints = ?addresses,
        purpose_aware = balancer.is_purpose_aware(),
        "Balancer ready"
    );

    let pool = ClientPool::connect(&addresses, &config.backend).await?;

    Ok(Proxy::new(
        balancer,
        pool,
        config.features.graphql,
        config.frontend.address.clone(),
    ))
}
