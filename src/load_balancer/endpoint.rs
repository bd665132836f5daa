//! Backend endpoint registry.
//!
//! # Responsibilities
//! - Normalize configured backend addresses (strip scheme, split host/port)
//! - Derive the per-node offset from the default wire port
//! - Translate a wire-protocol address into its companion HTTP address
//!
//! # Design Decisions
//! - A bad address is skipped with a warning, never fatal on its own
//! - The caller decides whether an empty result is fatal

use thiserror::Error;

/// Default wire (RPC) port of a database node.
pub const DEFAULT_WIRE_PORT: u16 = 9080;

/// Distance between a node's wire port and its HTTP administrative port.
pub const HTTP_PORT_DELTA: u16 = 1000;

/// Errors produced while interpreting a backend address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("port not found in endpoint: {0}")]
    MissingPort(String),

    #[error("empty host in endpoint: {0}")]
    MissingHost(String),

    #[error("invalid port '{port}' in endpoint '{endpoint}'")]
    InvalidPort { endpoint: String, port: String },

    #[error("port {port} of endpoint '{endpoint}' has no HTTP companion port")]
    NoHttpPort { endpoint: String, port: u16 },
}

/// A normalized backend node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointInfo {
    /// `host:port` with any scheme removed.
    pub address: String,
    /// `port - 9080`; only used for grouping and diagnostics.
    pub offset: i32,
}

impl EndpointInfo {
    /// Parse one configured address.
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let address = strip_scheme(raw.trim());
        let (_, port) = split_host_port(address)?;
        Ok(Self {
            address: address.to_string(),
            offset: i32::from(port) - i32::from(DEFAULT_WIRE_PORT),
        })
    }

    /// The companion HTTP `host:port` of this node.
    pub fn http_authority(&self) -> Result<String, EndpointError> {
        http_authority(&self.address)
    }
}

impl std::fmt::Display for EndpointInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Result of normalizing a list of addresses.
#[derive(Debug, Default)]
pub struct EndpointSet {
    pub accepted: Vec<EndpointInfo>,
    pub rejected: Vec<(String, EndpointError)>,
}

impl EndpointSet {
    /// True when the input had entries but none of them survived.
    pub fn all_rejected(&self) -> bool {
        self.accepted.is_empty() && !self.rejected.is_empty()
    }
}

/// Normalize a list of configured addresses, logging each decision.
pub fn normalize<S: AsRef<str>>(addresses: &[S]) -> EndpointSet {
    let mut set = EndpointSet::default();

    for raw in addresses {
        let raw = raw.as_ref();
        match EndpointInfo::parse(raw) {
            Ok(info) => {
                tracing::info!(endpoint = %info.address, offset = info.offset, "Endpoint accepted");
                set.accepted.push(info);
            }
            Err(e) => {
                tracing::warn!(endpoint = %raw, error = %e, "Ignoring endpoint");
                set.rejected.push((raw.to_string(), e));
            }
        }
    }

    set
}

/// Translate a wire-protocol `host:port` into the HTTP `host:(port - 1000)`.
pub fn http_authority(address: &str) -> Result<String, EndpointError> {
    let address = strip_scheme(address);
    let (host, port) = split_host_port(address)?;
    let http_port = port
        .checked_sub(HTTP_PORT_DELTA)
        .filter(|p| *p > 0)
        .ok_or_else(|| EndpointError::NoHttpPort {
            endpoint: address.to_string(),
            port,
        })?;
    Ok(format!("{}:{}", host, http_port))
}

fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .strip_prefix("http://")
        .or_else(|| endpoint.strip_prefix("https://"))
        .unwrap_or(endpoint)
}

fn split_host_port(endpoint: &str) -> Result<(&str, u16), EndpointError> {
    let colon = endpoint
        .rfind(':')
        .ok_or_else(|| EndpointError::MissingPort(endpoint.to_string()))?;

    let (host, port_str) = (&endpoint[..colon], &endpoint[colon + 1..]);
    if host.is_empty() {
        return Err(EndpointError::MissingHost(endpoint.to_string()));
    }

    let port = port_str.parse::<u16>().map_err(|_| EndpointError::InvalidPort {
        endpoint: endpoint.to_string(),
        port: port_str.to_string(),
    })?;

    Ok((host, port))
}
