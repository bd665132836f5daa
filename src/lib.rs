//! Otter proxy library.
//!
//! A reverse proxy in front of a cluster of graph-database nodes: purpose-aware
//! load balancing, an HTTP surface for queries, mutations and admin calls, and
//! a persistent message channel with per-session authentication.

// Core subsystems
pub mod backend;
pub mod config;
pub mod http;
pub mod proxy;
pub mod session;

// Traffic management
pub mod load_balancer;

// Offline tooling
pub mod dql;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::Proxy;
