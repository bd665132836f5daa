//! Otter proxy
//!
//! A reverse proxy for a cluster of graph-database nodes.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────────┐
//!                      │                       OTTER PROXY                         │
//!                      │                                                           │
//!   HTTP request       │  ┌─────────┐   ┌──────────┐   ┌──────────────────┐        │
//!   ───────────────────┼─▶│  http   │──▶│  proxy   │──▶│  load_balancer   │        │
//!                      │  │ server  │   │ dispatch │   │ flat | purposeful│        │
//!                      │  └────┬────┘   └────┬─────┘   └────────┬─────────┘        │
//!                      │       │             │                  │ address          │
//!   channel frames     │  ┌────▼────┐        │                  ▼                  │
//!   ◀─────────────────▶┼─▶│ session │────────┘          ┌──────────────────┐        │
//!                      │  │  state  │                   │  backend pool    │────────┼──▶ database
//!                      │  └─────────┘                   │ one client/node  │        │    nodes
//!                      │                                └──────────────────┘        │
//!                      │  ┌─────────────────────────────────────────────────────┐  │
//!                      │  │ config · observability · resilience · lifecycle      │  │
//!                      │  └─────────────────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use futures_util::future::join_all;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use otter_proxy::config::schema::PLACEHOLDER_TOKEN;
use otter_proxy::config::{loader, ProxyConfig};
use otter_proxy::lifecycle::{build_proxy, signals, Shutdown};
use otter_proxy::observability::{logging, metrics};
use otter_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "otter-proxy", version, about = "Reverse proxy for graph-database clusters")]
struct Args {
    /// TOML configuration file; defaults plus environment when absent.
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match loader::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("otter-proxy: failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "otter-proxy starting");

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        http = config.features.http,
        graphql = config.features.graphql,
        websocket = config.websocket.enabled,
        purpose_groups = config.groups.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );
    if config.websocket.enabled && config.websocket.auth_token == PLACEHOLDER_TOKEN {
        tracing::warn!("Channel auth token is the shipped placeholder; set WS_AUTH_TOKEN");
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let proxy = Arc::new(build_proxy(&config).await?);
    let shutdown = Arc::new(Shutdown::new());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let mut servers = vec![serve(HttpServer::new(&config, proxy.clone()), listener, &shutdown)];

    if config.websocket.enabled {
        if let Some(addr) = &config.websocket.bind_address {
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(address = %addr, "Dedicated channel listener bound");
            servers.push(serve(HttpServer::channel_only(&config, proxy.clone()), listener, &shutdown));
        }
    }

    signals::spawn_signal_listener(shutdown.clone());

    let mut failure = None;
    for result in join_all(servers).await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failure.get_or_insert(e.to_string());
            }
            Err(e) => {
                failure.get_or_insert(format!("listener task panicked: {}", e));
            }
        }
    }

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Run one listener; its failure stops the others.
fn serve(
    server: HttpServer,
    listener: TcpListener,
    shutdown: &Arc<Shutdown>,
) -> JoinHandle<std::io::Result<()>> {
    let signal = shutdown.subscribe();
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        let result = server.run(listener, signal).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Listener stopped with an error");
            shutdown.trigger();
        }
        result
    })
}
