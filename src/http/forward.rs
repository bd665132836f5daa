//! Single-host HTTP forwarding.
//!
//! Used for the pass-through routes: GraphQL, the allow-listed admin paths
//! and the frontend catch-all. The caller picks the upstream host and path;
//! this module only rewrites the request and relays the reply verbatim.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, Response, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::http::request::request_id;
use crate::http::response::strip_hop_by_hop;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream URI {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("cannot build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream {host} request failed: {source}")]
    Upstream {
        host: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },
}

/// Pooled HTTP/1.1 client shared by every pass-through route.
#[derive(Clone, Debug)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
}

impl Forwarder {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    /// Send the buffered request to `http://{host}{path_and_query}`.
    ///
    /// Method, headers (minus `Host` and hop-by-hop headers) and body are
    /// kept; the request ID is propagated.
    pub async fn forward(
        &self,
        host: &str,
        path_and_query: &str,
        method: &Method,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response<Body>, ForwardError> {
        let uri_text = format!("http://{}{}", host, path_and_query);
        let uri: Uri = uri_text.parse().map_err(|source| ForwardError::InvalidUri {
            uri: uri_text.clone(),
            source,
        })?;

        let mut outbound = headers.clone();
        strip_hop_by_hop(&mut outbound);
        outbound.remove(header::HOST);
        outbound.remove(header::CONTENT_LENGTH);

        let mut request = Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(Body::from(body))?;
        *request.headers_mut() = outbound;

        tracing::debug!(
            request_id = %request_id(headers),
            method = %method,
            upstream = %uri_text,
            "Forwarding request"
        );

        let response = self
            .client
            .request(request)
            .await
            .map_err(|source| ForwardError::Upstream {
                host: host.to_string(),
                source,
            })?;

        let (mut head, body) = response.into_parts();
        strip_hop_by_hop(&mut head.headers);
        Ok(Response::from_parts(head, Body::new(body)))
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}

/// Path plus query string of the inbound URI (`/` when absent).
pub fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}
