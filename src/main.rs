//! Header rewriting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request       ┌──────────────────────────────────────────────┐
//!     ─────────────────────┼─▶ trace ─▶ timeout ─▶ rewrite ─▶ forward ────┼──▶ Upstream
//!                          │                        │                     │
//!     Client Response      │                        ▼                     │
//!     ◀────────────────────┼──────────────── rules applied to headers ◀───┼─── Response
//!                          │                                              │
//!                          │   config (TOML) ─▶ RuleSet ◀─ watcher reload │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use rewrite_response_headers::config::{load_config, watcher::ConfigWatcher, ProxyConfig};
use rewrite_response_headers::lifecycle::{wait_for_signal, Shutdown};
use rewrite_response_headers::observability::init_logging;
use rewrite_response_headers::{HttpServer, RuleSet};

#[derive(Parser)]
#[command(name = "rewrite-proxy", version)]
#[command(about = "Reverse proxy that rewrites upstream response headers", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "REWRITE_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Reload rewrites when the configuration file changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rewrite-proxy starting");
    tracing::info!(
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    // An invalid rewrite must keep the proxy from starting.
    let rules = RuleSet::compile(&config.rewrites)?;
    tracing::info!(rules = rules.len(), "Response header rewrites compiled");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config, rules);
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
