//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a database node:
//!     → per-call deadline (reqwest client timeout)
//!     → On failure: retries.rs (check if retryable, retry with backoff)
//!     → backoff.rs (exponential delay + jitter)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Writes are repeated only when they never reached the node

pub mod backoff;
pub mod retries;

pub use retries::{FailureKind, RetryPolicy};
