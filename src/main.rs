//! REST relay server.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────────┐
//!                       │                    REST RELAY                     │
//!                       │                                                   │
//!   POST /proxy         │  ┌─────────┐   ┌───────────┐   ┌──────────────┐   │
//!   ────────────────────┼─▶│  http   │──▶│  relay    │──▶│   executor   │───┼──▶ Origin
//!                       │  │ server  │   │ normalize │   │ + classifier │   │
//!   200 + envelope      │  └────┬────┘   └───────────┘   └──────┬───────┘   │
//!   ◀───────────────────┼───────┘                               │           │
//!                       │                                       ▼ (spawn)   │
//!   /collections        │  ┌─────────┐                   ┌──────────────┐   │
//!   /history            │  │   api   │──────────────────▶│   storage    │   │
//!   ────────────────────┼─▶│         │                   │ memory/pgrst │   │
//!                       │  └─────────┘                   └──────────────┘   │
//!                       │                                                   │
//!                       │   config · observability · security · lifecycle   │
//!                       └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use rest_relay::config::loader::{apply_env_overrides, load_config, ConfigError};
use rest_relay::config::validation::validate_config;
use rest_relay::config::watcher::ConfigWatcher;
use rest_relay::config::RelayConfig;
use rest_relay::http::HttpServer;
use rest_relay::lifecycle::{signals, Shutdown};
use rest_relay::observability::{logging, metrics};
use rest_relay::storage::open_store;

#[derive(Parser)]
#[command(name = "rest-relay")]
#[command(about = "HTTP relay backend for a browser REST client", version)]
struct Cli {
    /// TOML configuration file; watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = RelayConfig::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            config
        }
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rest-relay starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        relay_timeout_secs = config.relay.timeout_secs,
        storage = ?config.storage.backend,
        history_enabled = config.history.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = open_store(&config.storage)?;

    // Hot reload. The watcher handle must outlive the server.
    let (config_updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, store)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
