//! HTTP client for a single database node.
//!
//! # Responsibilities
//! - Translate the node's wire address to its HTTP port and talk to it
//! - Log in with ACL credentials and keep the access token fresh
//! - Render mutations and upserts into the engine's request formats
//! - Decode replies, treating a non-empty `errors` list as a failure
//!
//! # Design Decisions
//! - Retry policy is fixed at construction, see `resilience::retries`
//! - A reported token expiry triggers exactly one re-login per call

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use url::Url;

use crate::backend::client::{
    BackendError, CallMetrics, GraphClient, GraphResponse, Latency, Mutation, MutationBody, TxnInfo,
};
use crate::config::BackendConfig;
use crate::load_balancer::endpoint::EndpointInfo;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

const ACCESS_TOKEN_HEADER: &str = "X-Dgraph-AccessToken";

const DQL: &str = "application/dql";
const RDF: &str = "application/rdf";
const JSON: &str = "application/json";

/// Client for one node, reached over HTTP on `wire port - 1000`.
#[derive(Debug)]
pub struct DgraphClient {
    endpoint: String,
    base_url: Url,
    http: reqwest::Client,
    credentials: Option<(String, String)>,
    access_token: RwLock<Option<String>>,
    retry: RetryPolicy,
    timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Extensions {
    server_latency: Latency,
    txn: TxnInfo,
    metrics: CallMetrics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EngineMessage {
    message: String,
}

impl DgraphClient {
    /// Build a client without touching the network.
    pub fn new(endpoint: &EndpointInfo, config: &BackendConfig) -> Result<Self, BackendError> {
        let authority = endpoint.http_authority()?;
        let base_url = Url::parse(&format!("http://{}", authority)).map_err(|e| BackendError::Transport {
            endpoint: endpoint.address.clone(),
            message: format!("invalid base URL: {}", e),
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .no_proxy()
            .build()
            .map_err(|e| BackendError::Connect {
                endpoint: endpoint.address.clone(),
                message: e.to_string(),
            })?;

        let credentials = if config.user.is_empty() {
            None
        } else {
            Some((config.user.clone(), config.password.clone()))
        };

        Ok(Self {
            endpoint: endpoint.address.clone(),
            base_url,
            http,
            credentials,
            access_token: RwLock::new(None),
            retry: RetryPolicy::from_config(config),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Build a client and log in when credentials are configured.
    pub async fn connect(endpoint: &EndpointInfo, config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Self::new(endpoint, config)?;
        if client.credentials.is_some() {
            client.login().await?;
        }
        tracing::info!(endpoint = %client.endpoint, url = %client.base_url, "Backend client ready");
        Ok(client)
    }

    /// Base URL of the node's HTTP API.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Obtain a fresh access token.
    pub async fn login(&self) -> Result<(), BackendError> {
        let Some((user, password)) = &self.credentials else {
            return Ok(());
        };

        let body = json!({ "userid": user, "password": password }).to_string();
        let reply = self
            .retry
            .run(true, BackendError::failure_kind, |_| {
                self.send("/login", JSON, body.clone(), None)
            })
            .await
            .map_err(|e| BackendError::Login {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        let token = reply
            .pointer("/data/accessJWT")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BackendError::Login {
                endpoint: self.endpoint.clone(),
                message: "reply carries no access token".to_string(),
            })?;

        *self.access_token.write().await = Some(token.to_string());
        tracing::info!(endpoint = %self.endpoint, user = %user, "Logged in to backend");
        Ok(())
    }

    /// POST with retries and a single re-login on token expiry.
    async fn call(
        &self,
        op: &'static str,
        path: &str,
        content_type: &'static str,
        body: String,
        idempotent: bool,
    ) -> Result<Value, BackendError> {
        let started = Instant::now();
        let mut relogged = false;

        let result = loop {
            let token = self.access_token.read().await.clone();
            let attempt = self
                .retry
                .run(idempotent, BackendError::failure_kind, |_| {
                    self.send(path, content_type, body.clone(), token.clone())
                })
                .await;

            match attempt {
                Err(BackendError::Engine(message))
                    if !relogged && self.credentials.is_some() && is_token_expired(&message) =>
                {
                    tracing::info!(endpoint = %self.endpoint, "Access token expired, logging in again");
                    relogged = true;
                    if let Err(e) = self.login().await {
                        break Err(e);
                    }
                }
                other => break other,
            }
        };

        metrics::record_backend_call(op, &self.endpoint, result.is_ok(), started.elapsed());
        if let Err(e) = &result {
            tracing::error!(op = op, endpoint = %self.endpoint, error = %e, "Backend call failed");
        }
        result
    }

    async fn send(
        &self,
        path: &str,
        content_type: &'static str,
        body: String,
        token: Option<String>,
    ) -> Result<Value, BackendError> {
        let url = self.base_url.join(path).map_err(|e| BackendError::Transport {
            endpoint: self.endpoint.clone(),
            message: format!("invalid path {}: {}", path, e),
        })?;
        let mut request = self.http.post(url).header(CONTENT_TYPE, content_type).body(body);
        if let Some(token) = token {
            request = request.header(ACCESS_TOKEN_HEADER, token);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body: text,
            });
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| BackendError::Decode {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        })?;

        if let Some(message) = engine_errors(&value) {
            return Err(BackendError::Engine(message));
        }
        Ok(value)
    }

    fn transport_error(&self, e: reqwest::Error) -> BackendError {
        let endpoint = self.endpoint.clone();
        if e.is_timeout() {
            BackendError::Timeout { endpoint, secs: self.timeout_secs }
        } else if e.is_connect() {
            BackendError::Connect { endpoint, message: e.to_string() }
        } else {
            BackendError::Transport { endpoint, message: e.to_string() }
        }
    }
}

#[async_trait]
impl GraphClient for DgraphClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query(&self, query: &str) -> Result<GraphResponse, BackendError> {
        let reply = self
            .call("query", "/query?ro=true", DQL, query.to_string(), true)
            .await?;
        Ok(decode_reply(reply, false))
    }

    async fn mutate(&self, mutation: &Mutation) -> Result<GraphResponse, BackendError> {
        let (content_type, body) = render_mutation(mutation);
        let reply = self
            .call("mutate", &mutate_path(mutation.commit_now), content_type, body, false)
            .await?;
        Ok(decode_reply(reply, true))
    }

    async fn upsert(
        &self,
        query: &str,
        mutations: &[Mutation],
        commit_now: bool,
    ) -> Result<GraphResponse, BackendError> {
        let (content_type, body) = render_upsert(query, mutations)?;
        let reply = self
            .call("upsert", &mutate_path(commit_now), content_type, body, false)
            .await?;
        Ok(decode_reply(reply, true))
    }
}

fn mutate_path(commit_now: bool) -> String {
    if commit_now {
        "/mutate?commitNow=true".to_string()
    } else {
        "/mutate".to_string()
    }
}

fn is_token_expired(message: &str) -> bool {
    message.to_ascii_lowercase().contains("token is expired")
}

/// Join the `errors[].message` entries of a reply, if there are any.
fn engine_errors(reply: &Value) -> Option<String> {
    let errors = reply.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    let messages: Vec<String> = errors
        .iter()
        .map(|e| {
            serde_json::from_value::<EngineMessage>(e.clone())
                .map(|m| m.message)
                .unwrap_or_else(|_| e.to_string())
        })
        .collect();
    Some(messages.join("; "))
}

fn decode_reply(mut reply: Value, is_mutation: bool) -> GraphResponse {
    let extensions: Extensions = reply
        .get_mut("extensions")
        .map(Value::take)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let mut data = reply.get_mut("data").map(Value::take).unwrap_or(Value::Null);

    let (json, uids) = if is_mutation {
        let uids: BTreeMap<String, String> = data
            .get_mut("uids")
            .map(Value::take)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let queries = data.get_mut("queries").map(Value::take).unwrap_or(Value::Null);
        (queries, uids)
    } else {
        (data, BTreeMap::new())
    };

    GraphResponse {
        json,
        uids,
        txn: extensions.txn,
        latency: extensions.server_latency,
        metrics: extensions.metrics,
    }
}

/// Normalize a condition to the `@if(...)` form.
fn if_clause(cond: &str) -> String {
    let cond = cond.trim();
    if cond.starts_with("@if") {
        cond.to_string()
    } else {
        format!("@if({})", cond)
    }
}

fn braced(block: &str) -> String {
    let block = block.trim();
    if block.starts_with('{') && block.ends_with('}') {
        block.to_string()
    } else {
        format!("{{ {} }}", block)
    }
}

/// `query { ... }`, keeping a `query` keyword (and its name or variables) the caller wrote.
fn query_block(query: &str) -> String {
    let query = query.trim();
    let keyword = query
        .strip_prefix("query")
        .filter(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'));
    match keyword {
        Some(_) => query.to_string(),
        None => format!("query {}", braced(query)),
    }
}

fn json_mutation_object(mutation: &Mutation) -> Map<String, Value> {
    let mut object = Map::new();
    if let MutationBody::Json { set, delete } = &mutation.body {
        if let Some(set) = set {
            object.insert("set".to_string(), set.clone());
        }
        if let Some(delete) = delete {
            object.insert("delete".to_string(), delete.clone());
        }
    }
    if let Some(cond) = &mutation.cond {
        object.insert("cond".to_string(), Value::String(if_clause(cond)));
    }
    object
}

fn rdf_block(mutation: &Mutation) -> Option<String> {
    match &mutation.body {
        MutationBody::Rdf(block) => Some(braced(block)),
        MutationBody::NQuads { set, delete } => {
            let mut out = String::from("{");
            if let Some(set) = set {
                out.push_str(&format!("\n  set {{\n{}\n  }}", set.trim()));
            }
            if let Some(delete) = delete {
                out.push_str(&format!("\n  delete {{\n{}\n  }}", delete.trim()));
            }
            out.push_str("\n}");
            Some(out)
        }
        MutationBody::Json { .. } => None,
    }
}

fn render_mutation(mutation: &Mutation) -> (&'static str, String) {
    match rdf_block(mutation) {
        Some(block) => (RDF, block),
        None => (JSON, Value::Object(json_mutation_object(mutation)).to_string()),
    }
}

fn render_upsert(query: &str, mutations: &[Mutation]) -> Result<(&'static str, String), BackendError> {
    if mutations.iter().all(Mutation::is_json) {
        let body = json!({
            "query": query,
            "mutations": mutations
                .iter()
                .map(|m| Value::Object(json_mutation_object(m)))
                .collect::<Vec<_>>(),
        });
        return Ok((JSON, body.to_string()));
    }

    let mut out = format!("upsert {{\n  {}\n", query_block(query));
    for mutation in mutations {
        let block = rdf_block(mutation).ok_or_else(|| {
            BackendError::Engine("cannot mix JSON and N-Quad mutations in one upsert".to_string())
        })?;
        match &mutation.cond {
            Some(cond) => out.push_str(&format!("  mutation {} {}\n", if_clause(cond), block)),
            None => out.push_str(&format!("  mutation {}\n", block)),
        }
    }
    out.push('}');
    Ok((RDF, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_targets_http_port() {
        let info = EndpointInfo::parse("alpha2:9081").unwrap();
        let client = DgraphClient::new(&info, &BackendConfig::default()).unwrap();
        assert_eq!(client.base_url().as_str(), "http://alpha2:8081/");
        assert_eq!(client.endpoint(), "alpha2:9081");
    }

    #[test]
    fn engine_errors_are_detected() {
        let reply = json!({"errors": [{"message": "line 1: bad"}, {"message": "second"}]});
        assert_eq!(engine_errors(&reply).as_deref(), Some("line 1: bad; second"));
        assert_eq!(engine_errors(&json!({"errors": []})), None);
        assert_eq!(engine_errors(&json!({"data": {}})), None);
    }

    #[test]
    fn query_reply_is_decoded() {
        let reply = json!({
            "data": {"me": [{"name": "a"}]},
            "extensions": {
                "server_latency": {"parsing_ns": 1, "processing_ns": 2, "encoding_ns": 3, "total_ns": 6},
                "txn": {"start_ts": 42},
                "metrics": {"num_uids": {"name": 1}}
            }
        });
        let decoded = decode_reply(reply, false);
        assert_eq!(decoded.json, json!({"me": [{"name": "a"}]}));
        assert_eq!(decoded.txn.start_ts, 42);
        assert_eq!(decoded.latency.total_ns, 6);
        assert_eq!(decoded.metrics.num_uids["name"], 1);
    }

    #[test]
    fn mutation_reply_splits_uids_from_queries() {
        let reply = json!({
            "data": {"code": "Success", "uids": {"alice": "0x1"}},
            "extensions": {"txn": {"start_ts": 5, "commit_ts": 6, "preds": ["1-name"]}}
        });
        let decoded = decode_reply(reply, true);
        assert!(!decoded.has_payload());
        assert_eq!(decoded.uids["alice"], "0x1");
        assert_eq!(decoded.txn.commit_ts, 6);
        assert_eq!(decoded.txn.preds, vec!["1-name"]);
    }

    #[test]
    fn json_mutation_rendering() {
        let m = Mutation::json(Some(json!({"name": "x"})), Some(json!([{"uid": "0x1"}])));
        let (ct, body) = render_mutation(&m);
        assert_eq!(ct, JSON);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"set": {"name": "x"}, "delete": [{"uid": "0x1"}]}));
    }

    #[test]
    fn nquad_mutation_rendering() {
        let (ct, body) = render_mutation(&Mutation::raw("_:a <name> \"x\" ."));
        assert_eq!(ct, RDF);
        assert!(body.starts_with('{'));
        assert!(body.contains("set {\n_:a <name> \"x\" .\n  }"));
    }

    #[test]
    fn rdf_upsert_rendering() {
        let m = Mutation::raw("uid(v) <name> \"x\" .").with_cond(Some("eq(len(v), 1)".to_string()));
        let (ct, body) = render_upsert("{ q(func: eq(email, \"a\")) { v as uid } }", &[m]).unwrap();
        assert_eq!(ct, RDF);
        assert!(body.starts_with("upsert {\n  query { q(func: eq(email, \"a\")) { v as uid } }"));
        assert!(body.contains("mutation @if(eq(len(v), 1)) {"));
        assert!(body.ends_with('}'));
    }

    #[test]
    fn named_upsert_query_is_not_wrapped_twice() {
        let m = Mutation::nquads("uid(u) <name> \"x\" .");
        let (_, body) = render_upsert("query { u as var(func: eq(email, \"a\")) }", &[m]).unwrap();
        assert!(body.starts_with("upsert {\n  query { u as var(func: eq(email, \"a\")) }\n"));
        assert_eq!(query_block("queryable { x }"), "query { queryable { x } }");
    }

    #[test]
    fn json_upsert_rendering() {
        let m = Mutation::json(Some(json!({"uid": "uid(v)"})), None)
            .with_cond(Some("@if(eq(len(v), 0))".to_string()));
        let (ct, body) = render_upsert("{ q(func: has(x)) { v as uid } }", &[m]).unwrap();
        assert_eq!(ct, JSON);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["mutations"][0]["cond"], "@if(eq(len(v), 0))");
        assert_eq!(body["query"], "{ q(func: has(x)) { v as uid } }");
    }

    #[test]
    fn mixed_upsert_is_rejected() {
        let mixed = [Mutation::json(None, None), Mutation::raw("_:a <b> \"c\" .")];
        assert!(render_upsert("{ q(func: has(x)) { uid } }", &mixed).is_err());
    }

    #[test]
    fn expired_token_detection() {
        assert!(is_token_expired("Token is expired"));
        assert!(!is_token_expired("no such predicate"));
    }
}
