//! Per-connection session state machine.
//!
//! # States
//! - Unauthenticated: only `ping`, `auth`/`login`, `logout`, `state` are served
//! - Authenticated: every message type is served (terminal until close)
//!
//! # State Transitions
//! ```text
//! Unauthenticated → Authenticated: auth with the shared token
//! Unauthenticated → closed: consecutive failed auths reach the cap
//! ```
//!
//! # Design Decisions
//! - Authorization is checked per message inside the loop
//! - Errors in one message never end the session

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::Mutation;
use crate::config::WebSocketConfig;
use crate::observability::metrics;
use crate::proxy::{Proxy, ProxyError};
use crate::session::message::{error_frame, result_frame, status_frame, Command, Envelope};

/// Close code sent when the failed-auth cap is reached.
pub const POLICY_VIOLATION: u16 = 1008;

pub const UNAUTHORIZED: &str = "unauthorized: authenticate first";
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a channel session, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

/// Shared authentication settings for every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub token: Arc<str>,
    pub max_auth_attempts: u32,
}

impl SessionSettings {
    pub fn from_config(config: &WebSocketConfig) -> Self {
        Self {
            token: Arc::from(config.auth_token.as_str()),
            max_auth_attempts: config.max_auth_attempts,
        }
    }
}

/// What the transport should do after a message was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send this text frame.
    Reply(String),
    /// Send this `{"error": ...}` frame; the session stays open.
    Error(String),
    /// Send nothing.
    Silent,
    /// Send `reply`, then close with `code`.
    Close { reply: String, code: u16, reason: String },
}

/// One client's session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    proxy: Arc<Proxy>,
    settings: SessionSettings,
    state: AuthState,
    failed_auths: u32,
}

impl Session {
    pub fn new(proxy: Arc<Proxy>, settings: SessionSettings) -> Self {
        Self {
            id: SessionId::new(),
            proxy,
            settings,
            state: AuthState::Unauthenticated,
            failed_auths: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Handle one text frame.
    pub async fn handle_text(&mut self, text: &str) -> Outcome {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                metrics::record_ws_message("invalid", "rejected");
                return Outcome::Error(error_frame(format!("invalid JSON: {}", e)));
            }
        };

        let kind = envelope.kind.clone();
        let (command, verbose) = match envelope.validate() {
            Ok(parsed) => parsed,
            Err(e) => {
                metrics::record_ws_message("invalid", "rejected");
                return Outcome::Error(error_frame(e));
            }
        };

        if command.needs_backend() && self.state != AuthState::Authenticated {
            tracing::warn!(session = %self.id, kind = %kind, "Rejected message from unauthenticated session");
            metrics::record_ws_message(&kind, "unauthorized");
            return Outcome::Error(error_frame(UNAUTHORIZED));
        }

        let outcome = match command {
            Command::Ping => Outcome::Reply(status_frame("pong")),
            Command::Logout | Command::State => Outcome::Silent,
            Command::Auth { token } => self.authenticate(&token),
            Command::Query { query } => {
                Self::reply(self.proxy.run_query(&kind, &query).await, verbose)
            }
            Command::Mutation { mutation, commit_now } => {
                let mutation = Mutation::nquads(&mutation).with_commit_now(commit_now);
                Self::reply(self.proxy.run_mutation(&kind, &mutation).await, verbose)
            }
            Command::Upsert { query, mutation, cond, commit_now } => {
                let mutation = Mutation::nquads(&mutation).with_cond(cond);
                Self::reply(
                    self.proxy.run_upsert(&kind, &query, &mutation, commit_now).await,
                    verbose,
                )
            }
        };

        let label = match &outcome {
            Outcome::Error(_) => "error",
            Outcome::Close { .. } => "closed",
            Outcome::Reply(_) | Outcome::Silent => "ok",
        };
        metrics::record_ws_message(&kind, label);
        outcome
    }

    /// Binary frames are not part of the protocol.
    pub fn handle_binary(&self) -> Outcome {
        metrics::record_ws_message("binary", "rejected");
        Outcome::Error(error_frame("binary frames are not supported"))
    }

    fn authenticate(&mut self, token: &str) -> Outcome {
        if token == &*self.settings.token {
            self.state = AuthState::Authenticated;
            self.failed_auths = 0;
            tracing::info!(session = %self.id, "Session authenticated");
            return Outcome::Reply(status_frame("authenticated"));
        }

        self.failed_auths += 1;
        tracing::warn!(
            session = %self.id,
            attempts = self.failed_auths,
            max_attempts = self.settings.max_auth_attempts,
            "Authentication failed"
        );

        if self.failed_auths >= self.settings.max_auth_attempts {
            return Outcome::Close {
                reply: error_frame(INVALID_CREDENTIALS),
                code: POLICY_VIOLATION,
                reason: "too many failed authentication attempts".to_string(),
            };
        }
        Outcome::Error(error_frame(INVALID_CREDENTIALS))
    }

    fn reply(result: Result<crate::backend::GraphResponse, ProxyError>, verbose: bool) -> Outcome {
        match result {
            Ok(response) => Outcome::Reply(result_frame(response, verbose)),
            Err(e) => Outcome::Error(error_frame(e)),
        }
    }
}
