//! Operation dispatch.
//!
//! # Responsibilities
//! - Run queries, mutations and upserts on the node chosen for a purpose
//! - Fan upsert blocks out concurrently and fold their results
//! - Decide whether a `/query` payload is DQL or GraphQL

use futures_util::future::join_all;

use crate::backend::{GraphResponse, Mutation};
use crate::load_balancer::purposes;
use crate::proxy::payload::{MutationRequest, UpsertBlock};
use crate::proxy::schema::{clean_schema, is_schema_query};
use crate::proxy::{Proxy, ProxyError};

/// Heuristic: a payload is DQL when a non-comment line calls a root
/// function (`func:`) or the payload is a schema request.
pub fn is_dql(text: &str) -> bool {
    let calls_func = text
        .lines()
        .map(str::trim)
        .any(|line| !line.starts_with('#') && line.contains("func:"));
    calls_func || is_schema_query(text)
}

impl Proxy {
    /// True when a `/query` payload should go to the GraphQL endpoint.
    pub fn wants_graphql(&self, query: &str) -> bool {
        self.graphql_allowed() && !is_dql(query)
    }

    /// Run a read-only query; schema replies are cleaned.
    pub async fn run_query(&self, purpose: &str, query: &str) -> Result<GraphResponse, ProxyError> {
        let (_, client) = self.select_client(purpose)?;
        let mut response = client
            .query(query)
            .await
            .map_err(|e| ProxyError::backend("query", e))?;

        if is_schema_query(query) {
            response.json = clean_schema(&response.json);
        }
        Ok(response)
    }

    pub async fn run_mutation(&self, purpose: &str, mutation: &Mutation) -> Result<GraphResponse, ProxyError> {
        let (_, client) = self.select_client(purpose)?;
        client
            .mutate(mutation)
            .await
            .map_err(|e| ProxyError::backend("mutation", e))
    }

    pub async fn run_upsert(
        &self,
        purpose: &str,
        query: &str,
        mutation: &Mutation,
        commit_now: bool,
    ) -> Result<GraphResponse, ProxyError> {
        let (_, client) = self.select_client(purpose)?;
        client
            .upsert(query, std::slice::from_ref(mutation), commit_now)
            .await
            .map_err(|e| ProxyError::backend("upsert", e))
    }

    /// Run every block concurrently on one node and wait for all of them.
    ///
    /// Any failure fails the whole request with every failure listed.
    /// On success only the first block's response is returned.
    pub async fn run_upserts(&self, purpose: &str, blocks: &[UpsertBlock]) -> Result<GraphResponse, ProxyError> {
        let (endpoint, client) = self.select_client(purpose)?;
        tracing::debug!(endpoint = %endpoint, blocks = blocks.len(), "Running upsert blocks");

        let calls = blocks.iter().map(|block| {
            let client = client.clone();
            async move {
                let mutation = block.to_mutation();
                client.upsert(&block.query, std::slice::from_ref(&mutation), true).await
            }
        });
        let results = join_all(calls).await;

        let mut first = None;
        let mut failures = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(response) => {
                    if first.is_none() {
                        first = Some(response);
                    }
                }
                Err(e) => failures.push(format!("block {}: {}", index + 1, e)),
            }
        }

        if !failures.is_empty() {
            tracing::error!(failed = failures.len(), total = blocks.len(), "Upsert blocks failed");
            return Err(ProxyError::Upserts(failures));
        }
        first.ok_or(ProxyError::Upserts(vec!["no upsert blocks".to_string()]))
    }

    /// Serve a decoded `/mutate` body.
    pub async fn run_mutation_request(&self, request: &MutationRequest) -> Result<GraphResponse, ProxyError> {
        match request {
            MutationRequest::Single(mutation) => self.run_mutation(purposes::MUTATION, mutation).await,
            MutationRequest::Upserts(blocks) => self.run_upserts(purposes::MUTATION, blocks).await,
        }
    }
}
