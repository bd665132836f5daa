//! Backend engine subsystem.
//!
//! # Data Flow
//! ```text
//! Balancer picks an address
//!     → pool.rs (address → shared client)
//!     → client.rs (GraphClient contract: query / mutate / upsert)
//!     → dgraph.rs (HTTP API of the node, retries, login)
//! ```

pub mod client;
pub mod dgraph;
pub mod pool;

pub use client::{BackendError, GraphClient, GraphResponse, Mutation, MutationBody};
pub use pool::ClientPool;
