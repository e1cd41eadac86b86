//! kompld: long-running completion daemon mirroring Kubernetes resources
//! into a local store and answering queries over a unix socket.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use kompl_kubehub::ClientCache;
use kompl_server::config::Config;
use kompl_server::Server;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "kompld",
    version,
    about = "Kubernetes completion daemon serving cached resource queries over a unix socket"
)]
struct Cli {
    /// Config file path (default: $XDG_CONFIG_HOME/kompl/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the socket path from the config file
    #[arg(long)]
    socket: Option<PathBuf>,
}

fn init_tracing() {
    let env = std::env::var("KOMPL_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KOMPL_METRICS_ADDR") {
        match addr.parse::<std::net::SocketAddr>() {
            Ok(sock) => {
                let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
                match builder.with_http_listener(sock).install() {
                    Ok(()) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                    Err(err) => warn!(error = %err, "failed to install metrics exporter"),
                }
            }
            Err(_) => warn!(addr = %addr, "invalid KOMPL_METRICS_ADDR; expected host:port"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(socket) = cli.socket {
        config.server.socket_path = socket;
    }

    let clients =
        Arc::new(ClientCache::new().context("failed to load endpoint configuration")?);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            info!("received shutdown signal");
            shutdown.cancel();
        });
    }

    let server = Server::new(config, clients, shutdown);
    server.run().await
}
