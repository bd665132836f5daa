//! Request body interpretation.
//!
//! # Responsibilities
//! - Map `Content-Type` values onto a closed set of payload kinds
//! - Extract the query text from query bodies
//! - Decode mutation bodies into a single mutation or a list of upsert blocks
//!
//! # Design Decisions
//! - Aliases live in one table; no call site compares content-type strings
//! - Media-type parameters (`; charset=...`) are ignored

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::backend::Mutation;

/// How a request body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// JSON envelope (`{query}`, `{set, delete, mutation}`, `{upsert}`).
    Json,
    /// Raw DQL text.
    Dql,
}

/// Primary DQL media type; the validation routes accept only this one.
pub const DQL_MEDIA_TYPE: &str = "application/dql";

/// Accepted media types and the kind each one maps to.
const CONTENT_KINDS: &[(&str, ContentKind)] = &[
    ("application/json", ContentKind::Json),
    (DQL_MEDIA_TYPE, ContentKind::Dql),
    ("application/graphql+-", ContentKind::Dql),
    ("application/rdf", ContentKind::Dql),
];

impl ContentKind {
    /// Resolve a `Content-Type` header value.
    pub fn from_header(value: Option<&str>) -> Result<Self, PayloadError> {
        let raw = value.unwrap_or_default();
        let wanted = media_type(raw);
        CONTENT_KINDS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| PayloadError::UnsupportedContentType(raw.to_string()))
    }
}

/// The media type of a `Content-Type` value, without parameters.
pub fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}

/// Body problems, reported before any backend is contacted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("unsupported Content-Type: {0:?}")]
    UnsupportedContentType(String),

    #[error("empty request body")]
    EmptyBody,

    #[error("request body is not valid UTF-8")]
    NotUtf8,

    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("missing or empty '{0}' field in JSON payload")]
    MissingField(&'static str),

    #[error("missing mutation content (mutation, set, delete or upsert) in JSON payload")]
    NoMutationContent,

    #[error("upsert block {index} is missing its {field}")]
    IncompleteUpsert { index: usize, field: &'static str },
}

/// One query + conditional mutation unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpsertBlock {
    #[serde(default)]
    pub query: String,
    /// N-Quads applied when the condition holds.
    #[serde(default)]
    pub mutation: String,
    #[serde(default)]
    pub cond: Option<String>,
}

impl UpsertBlock {
    /// The mutation part, ready for the engine.
    pub fn to_mutation(&self) -> Mutation {
        Mutation::nquads(&self.mutation).with_cond(self.cond.clone())
    }
}

/// `upsert` may carry one block or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UpsertPayload {
    Single(UpsertBlock),
    Many(Vec<UpsertBlock>),
}

impl UpsertPayload {
    pub fn into_blocks(self) -> Vec<UpsertBlock> {
        match self {
            UpsertPayload::Single(block) => vec![block],
            UpsertPayload::Many(blocks) => blocks,
        }
    }
}

/// A decoded `/mutate` body.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRequest {
    Single(Mutation),
    Upserts(Vec<UpsertBlock>),
}

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MutationEnvelope {
    #[serde(default)]
    set: Option<Value>,
    #[serde(default)]
    delete: Option<Value>,
    #[serde(default)]
    mutation: Option<String>,
    #[serde(default)]
    upsert: Option<UpsertPayload>,
    #[serde(default, rename = "commitNow")]
    commit_now: Option<bool>,
}

fn body_text(body: &[u8]) -> Result<&str, PayloadError> {
    if body.is_empty() {
        return Err(PayloadError::EmptyBody);
    }
    let text = std::str::from_utf8(body).map_err(|_| PayloadError::NotUtf8)?;
    if text.trim().is_empty() {
        return Err(PayloadError::EmptyBody);
    }
    Ok(text)
}

/// Extract the query text of a `/query` body.
pub fn parse_query_body(kind: ContentKind, body: &[u8]) -> Result<String, PayloadError> {
    match kind {
        ContentKind::Json => {
            let envelope: QueryEnvelope = serde_json::from_slice(body)
                .map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
            envelope
                .query
                .filter(|q| !q.trim().is_empty())
                .ok_or(PayloadError::MissingField("query"))
        }
        ContentKind::Dql => body_text(body).map(str::to_string),
    }
}

/// Decode a `/mutate` body.
pub fn parse_mutation_body(kind: ContentKind, body: &[u8]) -> Result<MutationRequest, PayloadError> {
    match kind {
        ContentKind::Dql => Ok(MutationRequest::Single(Mutation::raw(body_text(body)?))),
        ContentKind::Json => {
            let envelope: MutationEnvelope = serde_json::from_slice(body)
                .map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

            if let Some(upsert) = envelope.upsert {
                let blocks = upsert.into_blocks();
                if blocks.is_empty() {
                    return Err(PayloadError::MissingField("upsert"));
                }
                for (index, block) in blocks.iter().enumerate() {
                    if block.query.trim().is_empty() {
                        return Err(PayloadError::IncompleteUpsert { index, field: "query" });
                    }
                    if block.mutation.trim().is_empty() {
                        return Err(PayloadError::IncompleteUpsert { index, field: "mutation" });
                    }
                }
                return Ok(MutationRequest::Upserts(blocks));
            }

            let commit_now = envelope.commit_now.unwrap_or(true);

            if let Some(text) = envelope.mutation.filter(|m| !m.trim().is_empty()) {
                return Ok(MutationRequest::Single(
                    Mutation::nquads(&text).with_commit_now(commit_now),
                ));
            }

            let set = envelope.set.filter(|v| !v.is_null());
            let delete = envelope.delete.filter(|v| !v.is_null());
            if set.is_none() && delete.is_none() {
                return Err(PayloadError::NoMutationContent);
            }
            Ok(MutationRequest::Single(
                Mutation::json(set, delete).with_commit_now(commit_now),
            ))
        }
    }
}
