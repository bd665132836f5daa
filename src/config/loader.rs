//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use crate::config::schema::{BalancerKind, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, message } => write!(f, "Invalid {}: {}", var, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a TOML file without validating it.
pub fn read_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load the optional file, overlay the process environment, then validate.
pub fn load(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading config file");
            read_config_file(path)?
        }
        None => {
            tracing::info!("No config file given, starting from defaults");
            ProxyConfig::default()
        }
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment values on top of the file configuration.
///
/// `lookup` abstracts the environment so the overlay can be exercised in tests.
pub fn apply_env<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(val) = get("DGRAPH_ENDPOINTS") {
        let endpoints: Vec<String> = val
            .split(',')
            .map(str::trim)
            .filter(|ep| !ep.is_empty())
            .map(String::from)
            .collect();
        if endpoints.is_empty() {
            tracing::warn!(value = %val, "DGRAPH_ENDPOINTS parsed to an empty list, keeping file value");
        } else {
            tracing::info!(endpoints = ?endpoints, "Backend endpoints set from environment");
            config.backend.endpoints = endpoints;
        }
    }

    if let Some(val) = get("DGRAPH_USER") {
        config.backend.user = val;
    }
    if let Some(val) = get("DGRAPH_PASSWORD") {
        tracing::info!("DGRAPH_PASSWORD set from environment (value not logged)");
        config.backend.password = val;
    }
    if let Some(val) = get("WS_AUTH_TOKEN") {
        config.websocket.auth_token = val;
    }

    if let Some(val) = get("BALANCER_TYPE") {
        config.backend.balancer = val
            .parse::<BalancerKind>()
            .map_err(|message| ConfigError::Env { var: "BALANCER_TYPE", message })?;
    }

    if let Some(port) = parse_port("PROXY_PORT", get("PROXY_PORT"))? {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(port) = parse_port("WEBSOCKET_PORT", get("WEBSOCKET_PORT"))? {
        config.websocket.bind_address = Some(format!("0.0.0.0:{}", port));
    }

    if let Some(val) = get("ENABLE_HTTP") {
        config.features.http = parse_flag("ENABLE_HTTP", &val);
    }
    if let Some(val) = get("GRAPHQL") {
        config.features.graphql = parse_flag("GRAPHQL", &val);
    }
    if let Some(val) = get("ENABLE_WEBSOCKET") {
        config.websocket.enabled = parse_flag("ENABLE_WEBSOCKET", &val);
    }

    if let Some(val) = get("RATEL") {
        config.frontend.address = Some(val);
    }

    Ok(())
}

fn parse_port(var: &'static str, value: Option<String>) -> Result<Option<u16>, ConfigError> {
    match value {
        None => Ok(None),
        Some(v) => match v.trim().parse::<u16>() {
            Ok(0) => Err(ConfigError::Env { var, message: "port must not be 0".to_string() }),
            Ok(port) => Ok(Some(port)),
            Err(e) => Err(ConfigError::Env { var, message: format!("{:?}: {}", v, e) }),
        },
    }
}

fn parse_flag(var: &str, value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        other => {
            tracing::warn!(var = %var, value = %other, "Invalid boolean, treating anything but 'false' as true");
            other != "false"
        }
    }
}
