//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the enabled surfaces
//! - Wire up middleware (CORS, body limit, timeout, request ID, tracing)
//! - Serve a listener until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::forward::Forwarder;
use crate::http::{cors, handlers, validate, websocket};
use crate::proxy::Proxy;
use crate::session::SessionSettings;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<Proxy>,
    pub forwarder: Forwarder,
    pub sessions: SessionSettings,
}

impl AppState {
    pub fn new(config: &ProxyConfig, proxy: Arc<Proxy>) -> Self {
        Self {
            proxy,
            forwarder: Forwarder::new(),
            sessions: SessionSettings::from_config(&config.websocket),
        }
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Main listener: data routes, validation, admin pass-through, `/ws`
    /// and the frontend catch-all, as enabled in `config`.
    pub fn new(config: &ProxyConfig, proxy: Arc<Proxy>) -> Self {
        let state = AppState::new(config, proxy);
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Dedicated channel listener: `/ws` only.
    pub fn channel_only(config: &ProxyConfig, proxy: Arc<Proxy>) -> Self {
        let state = AppState::new(config, proxy);
        let router = Router::new()
            .route("/ws", get(websocket::upgrade))
            .with_state(state)
            .layer(TraceLayer::new_for_http());
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/validate/dql", any(validate::validate_dql))
            .route("/validate/schema", any(validate::validate_schema));

        if config.features.http {
            router = router
                .route("/query", post(handlers::query))
                .route("/mutate", post(handlers::mutate))
                .route("/graphql", any(handlers::graphql));
            for path in handlers::DIRECT_PATHS {
                router = router.route(path, any(handlers::direct));
            }
        }

        if config.websocket.enabled {
            router = router.route("/ws", get(websocket::upgrade));
        }

        router
            .fallback(handlers::frontend)
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .layer(middleware::from_fn(cors::cors))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!(address = %addr, "Shutdown signal received, draining");
            })
            .await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::dispatch::testing::{proxy_over, StubClient};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn router(config: &ProxyConfig) -> Router {
        let stub = StubClient::new("alpha1:9080");
        HttpServer::new(config, Arc::new(proxy_over(&[stub]))).into_router()
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let response = router(&ProxyConfig::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header(header::CONTENT_TYPE, "application/dql")
                    .body(Body::from("{ q(func: has(name)) { uid } }"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn data_routes_follow_http_toggle() {
        let mut config = ProxyConfig::default();
        config.features.http = false;
        let response = router(&config)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header(header::CONTENT_TYPE, "application/dql")
                    .body(Body::from("{ q(func: has(name)) { uid } }"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = ProxyConfig::default();
        config.security.max_body_size = 16;
        let response = router(&config)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header(header::CONTENT_TYPE, "application/dql")
                    .body(Body::from("{ q(func: has(name)) { uid name age } }"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
