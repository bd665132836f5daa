//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that some backend is reachable through the configuration
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend endpoints must be set (backend.endpoints or groups)")]
    NoEndpoints,

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("websocket.auth_token must not be empty while the channel is enabled")]
    EmptyToken,

    #[error("nothing to serve: both features.http and websocket.enabled are off")]
    NothingToServe,
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backend.endpoints.is_empty() && config.groups.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if let Some(addr) = &config.websocket.bind_address {
        check_address(&mut errors, "websocket.bind_address", addr);
    }
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    let positive = [
        ("backend.request_timeout_secs", config.backend.request_timeout_secs),
        ("backend.connect_timeout_secs", config.backend.connect_timeout_secs),
        ("backend.max_attempts", u64::from(config.backend.max_attempts)),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("security.max_body_size", config.security.max_body_size as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.websocket.enabled {
        if config.websocket.auth_token.is_empty() {
            errors.push(ValidationError::EmptyToken);
        }
        if config.websocket.max_auth_attempts == 0 {
            errors.push(ValidationError::Zero("websocket.max_auth_attempts"));
        }
    }

    if !config.features.http && !config.websocket.enabled {
        errors.push(ValidationError::NothingToServe);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.backend.endpoints.push("alpha1:9080".to_string());
        config
    }

    #[test]
    fn default_with_endpoint_is_valid() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn groups_alone_are_enough() {
        let mut config = ProxyConfig::default();
        config.groups.insert("query".to_string(), vec!["alpha1:9080".to_string()]);
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.backend.max_attempts = 0;
        config.websocket.auth_token.clear();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoEndpoints));
        assert!(errors.contains(&ValidationError::Zero("backend.max_attempts")));
        assert!(errors.contains(&ValidationError::EmptyToken));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidAddress { field: "listener.bind_address", .. }
        )));
    }

    #[test]
    fn empty_token_is_fine_when_channel_is_off() {
        let mut config = valid();
        config.websocket.enabled = false;
        config.websocket.auth_token.clear();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
