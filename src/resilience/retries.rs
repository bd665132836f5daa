//! Retry policy for calls toward database nodes.
//!
//! # Responsibilities
//! - Decide whether a failed call may be attempted again
//! - Drive attempts with exponential backoff + jitter
//!
//! # Design Decisions
//! - Connect errors retry for every call
//! - Read-only calls also retry on 502, 503 and 504
//! - Timeouts never retry; the call may still be running on the node
//! - Engine-level errors (a well-formed reply with `errors`) never retry

use std::future::Future;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::resilience::backoff::calculate_backoff;

/// How a single attempt failed, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The connection could not be established.
    Connect,
    /// The attempt ran past its deadline.
    Timeout,
    /// The node answered with this HTTP status.
    Status(u16),
    /// Anything else (decode failures, engine errors).
    Fatal,
}

/// Retry settings derived from the backend configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `classify` maps an error to its [`FailureKind`]; `idempotent` says
    /// whether the call is safe to repeat after it reached the node.
    pub async fn run<T, E, F, Fut, C>(&self, idempotent: bool, classify: C, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> FailureKind,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let kind = classify(&err);
                    if attempt >= self.max_attempts || !is_retryable(idempotent, kind) {
                        return Err(err);
                    }
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Backend call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }
}

/// Whether a failure of this kind may be retried.
pub fn is_retryable(idempotent: bool, kind: FailureKind) -> bool {
    match kind {
        FailureKind::Connect => true,
        FailureKind::Status(status) => idempotent && matches!(status, 502..=504),
        FailureKind::Timeout | FailureKind::Fatal => false,
    }
}
