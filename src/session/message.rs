//! Channel message envelope.
//!
//! Inbound frames are JSON objects decoded into a loose [`Envelope`] and
//! then checked into a typed [`Command`]. Outbound frames are either the
//! bare result payload, a status object, an error object, or the verbose
//! [`VerboseReply`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::backend::GraphResponse;

pub const TYPE_QUERY: &str = "query";
pub const TYPE_MUTATION: &str = "mutation";
pub const TYPE_UPSERT: &str = "upsert";
pub const TYPE_AUTH: &str = "auth";
pub const TYPE_LOGIN: &str = "login";
pub const TYPE_LOGOUT: &str = "logout";
pub const TYPE_STATE: &str = "state";
pub const TYPE_PING: &str = "ping";

/// Raw inbound message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub query: String,
    pub mutation: String,
    pub cond: Option<String>,
    pub token: String,
    #[serde(rename = "commitNow")]
    pub commit_now: bool,
    pub verbose: bool,
}

/// A validated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Auth { token: String },
    Logout,
    State,
    Query { query: String },
    Mutation { mutation: String, commit_now: bool },
    Upsert { query: String, mutation: String, cond: Option<String>, commit_now: bool },
}

impl Command {
    /// Whether the command reaches a database node.
    pub fn needs_backend(&self) -> bool {
        matches!(self, Command::Query { .. } | Command::Mutation { .. } | Command::Upsert { .. })
    }
}

/// Reasons a well-formed envelope is still unacceptable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("missing type field")]
    MissingType,
    #[error("missing token field")]
    MissingToken,
    #[error("missing query field")]
    MissingQuery,
    #[error("missing mutation field")]
    MissingMutation,
    #[error("missing query or mutation field")]
    MissingQueryOrMutation,
    #[error("unknown type field")]
    UnknownType(String),
}

impl Envelope {
    /// Check the fields required by the declared type.
    pub fn validate(self) -> Result<(Command, bool), EnvelopeError> {
        let verbose = self.verbose;
        let command = match self.kind.as_str() {
            "" => return Err(EnvelopeError::MissingType),
            TYPE_PING => Command::Ping,
            TYPE_LOGOUT => Command::Logout,
            TYPE_STATE => Command::State,
            TYPE_AUTH | TYPE_LOGIN => {
                if self.token.is_empty() {
                    return Err(EnvelopeError::MissingToken);
                }
                Command::Auth { token: self.token }
            }
            TYPE_QUERY => {
                if self.query.trim().is_empty() {
                    return Err(EnvelopeError::MissingQuery);
                }
                Command::Query { query: self.query }
            }
            TYPE_MUTATION => {
                if self.mutation.trim().is_empty() {
                    return Err(EnvelopeError::MissingMutation);
                }
                Command::Mutation { mutation: self.mutation, commit_now: self.commit_now }
            }
            TYPE_UPSERT => {
                if self.query.trim().is_empty() || self.mutation.trim().is_empty() {
                    return Err(EnvelopeError::MissingQueryOrMutation);
                }
                Command::Upsert {
                    query: self.query,
                    mutation: self.mutation,
                    cond: self.cond,
                    commit_now: self.commit_now,
                }
            }
            other => return Err(EnvelopeError::UnknownType(other.to_string())),
        };
        Ok((command, verbose))
    }
}

/// Extended reply sent when `verbose` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerboseReply {
    /// Always present; `{}` when the node returned no payload.
    pub data: Value,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub uids: BTreeMap<String, String>,
    #[serde(rename = "commitTs", skip_serializing_if = "is_zero")]
    pub commit_ts: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<String>,
    #[serde(rename = "latencyNs", skip_serializing_if = "is_zero")]
    pub latency_ns: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl From<GraphResponse> for VerboseReply {
    fn from(response: GraphResponse) -> Self {
        let data = if response.has_payload() { response.json } else { json!({}) };
        Self {
            data,
            uids: response.uids,
            commit_ts: response.txn.commit_ts,
            predicates: response.txn.preds,
            latency_ns: response.latency.total_ns,
            error: None,
        }
    }
}

/// `{"error": "..."}`
pub fn error_frame(message: impl std::fmt::Display) -> String {
    json!({ "error": message.to_string() }).to_string()
}

/// `{"status": "..."}`
pub fn status_frame(status: &str) -> String {
    json!({ "status": status }).to_string()
}

/// Render a result: the verbose envelope, or the bare payload (`{}` when empty).
pub fn result_frame(response: GraphResponse, verbose: bool) -> String {
    if verbose {
        return serde_json::to_string(&VerboseReply::from(response))
            .unwrap_or_else(|e| error_frame(format!("error encoding reply: {}", e)));
    }
    if response.has_payload() {
        response.json.to_string()
    } else {
        "{}".to_string()
    }
}
