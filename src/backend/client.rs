//! Engine client contract.
//!
//! Everything the proxy needs from a database node fits in three calls:
//! `query`, `mutate` and `upsert`. The pool holds trait objects so the
//! dispatch core can run against real nodes or in-process stubs alike.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::load_balancer::endpoint::EndpointError;
use crate::resilience::FailureKind;

/// Mutation payload in one of the formats the engine accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationBody {
    /// JSON fragments; each may be an object or an array of objects.
    Json {
        set: Option<Value>,
        delete: Option<Value>,
    },
    /// N-Quad lines for the `set` and `delete` sections.
    NQuads {
        set: Option<String>,
        delete: Option<String>,
    },
    /// A complete `{ set {…} delete {…} }` block, sent as-is.
    Rdf(String),
}

/// One mutation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub body: MutationBody,
    /// Optional `@if(...)` condition, only meaningful inside an upsert.
    pub cond: Option<String>,
    pub commit_now: bool,
}

impl Mutation {
    pub fn json(set: Option<Value>, delete: Option<Value>) -> Self {
        Self {
            body: MutationBody::Json { set, delete },
            cond: None,
            commit_now: true,
        }
    }

    /// Bare N-Quads for the `set` section.
    pub fn nquads(text: &str) -> Self {
        Self {
            body: MutationBody::NQuads {
                set: Some(text.to_string()),
                delete: None,
            },
            cond: None,
            commit_now: true,
        }
    }

    /// Raw DQL mutation text: a full block when it starts with `{`,
    /// otherwise bare N-Quads for the `set` section.
    pub fn raw(text: &str) -> Self {
        let text = text.trim();
        if text.starts_with('{') {
            Self {
                body: MutationBody::Rdf(text.to_string()),
                cond: None,
                commit_now: true,
            }
        } else {
            Self::nquads(text)
        }
    }

    pub fn with_cond(mut self, cond: Option<String>) -> Self {
        self.cond = cond.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_commit_now(mut self, commit_now: bool) -> Self {
        self.commit_now = commit_now;
        self
    }

    pub fn is_json(&self) -> bool {
        matches!(self.body, MutationBody::Json { .. })
    }
}

/// Transaction details attached to a reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxnInfo {
    pub start_ts: u64,
    pub commit_ts: u64,
    pub preds: Vec<String>,
}

/// Server-side latency breakdown, nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Latency {
    pub parsing_ns: u64,
    pub processing_ns: u64,
    pub encoding_ns: u64,
    pub assign_timestamp_ns: u64,
    pub total_ns: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallMetrics {
    pub num_uids: BTreeMap<String, u64>,
}

/// Decoded engine reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphResponse {
    /// Query results. For mutations, the results of the upsert query (if any).
    pub json: Value,
    /// Blank-node name → assigned UID.
    pub uids: BTreeMap<String, String>,
    pub txn: TxnInfo,
    pub latency: Latency,
    pub metrics: CallMetrics,
}

impl GraphResponse {
    pub fn has_payload(&self) -> bool {
        !self.json.is_null()
    }
}

/// Errors returned by an engine client.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("cannot reach {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("{endpoint} did not answer within {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    #[error("{endpoint} answered HTTP {status}: {body}")]
    Status { endpoint: String, status: u16, body: String },

    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{0}")]
    Engine(String),

    #[error("undecodable reply from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("login to {endpoint} failed: {message}")]
    Login { endpoint: String, message: String },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

impl BackendError {
    /// Retry classification of this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            BackendError::Connect { .. } => FailureKind::Connect,
            BackendError::Timeout { .. } => FailureKind::Timeout,
            BackendError::Status { status, .. } => FailureKind::Status(*status),
            _ => FailureKind::Fatal,
        }
    }
}

/// A connection to one database node.
#[async_trait]
pub trait GraphClient: Send + Sync + std::fmt::Debug {
    /// Address this client talks to.
    fn endpoint(&self) -> &str;

    /// Run a read-only query.
    async fn query(&self, query: &str) -> Result<GraphResponse, BackendError>;

    /// Apply one mutation in a fresh transaction.
    async fn mutate(&self, mutation: &Mutation) -> Result<GraphResponse, BackendError>;

    /// Run `query`, then the (conditional) mutations, in one transaction.
    async fn upsert(
        &self,
        query: &str,
        mutations: &[Mutation],
        commit_now: bool,
    ) -> Result<GraphResponse, BackendError>;
}
