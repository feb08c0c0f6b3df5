//! Status poller daemon (v1)
//!
//! Watches a set of game servers on a management backend and keeps each
//! one's status fresh, backing off together when the backend rate limits.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                STATUS POLLER                  │
//!                    │                                               │
//!                    │  ┌────────────┐   ┌────────────┐              │
//!                    │  │ scheduler  │   │ scheduler  │  ...         │
//!                    │  │ (server 1) │   │ (server 2) │              │
//!                    │  └─────┬──────┘   └─────┬──────┘              │
//!                    │        │ fetch          │ fetch               │
//!                    │        ▼                ▼                     │
//!                    │  ┌──────────────────────────────┐             │
//!     Backend ◀──────┼──│        StatusClient          │             │
//!                    │  └──────────────┬───────────────┘             │
//!                    │                 │ 429 / other                 │
//!                    │                 ▼                             │
//!                    │  ┌──────────────────────────────┐             │
//!                    │  │      BackoffCoordinator      │◀── admin    │
//!                    │  │  (read by every scheduler)   │    API      │
//!                    │  └──────────────────────────────┘             │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use status_poller::admin::{self, AdminState};
use status_poller::config::{load_config, PollerConfig};
use status_poller::lifecycle::signals::shutdown_signal;
use status_poller::lifecycle::startup::build_watches;
use status_poller::lifecycle::Shutdown;
use status_poller::observability::{logging, metrics};
use status_poller::{BackoffCoordinator, StatusClient};

#[derive(Parser)]
#[command(name = "status-poller")]
#[command(about = "Adaptive status poller for managed game servers", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, corrections) = match &args.config {
        Some(path) => load_config(path)?,
        None => (PollerConfig::default(), Vec::new()),
    };

    logging::init(&config.observability.log_level);

    tracing::info!("status-poller v0.1.0 starting");
    for correction in &corrections {
        tracing::warn!(field = correction.field, "Config value replaced: {}", correction.reason);
    }
    tracing::info!(
        base_url = %config.transport.base_url,
        servers = config.servers.len(),
        idle_interval_ms = config.polling.idle_interval_ms,
        active_interval_ms = config.polling.active_interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let coordinator = BackoffCoordinator::with_schedule(config.backoff.schedule());
    let client = StatusClient::new(config.transport.clone(), coordinator.clone())?;
    let watches = build_watches(&config, &client);

    if watches.is_empty() {
        tracing::warn!("No servers configured; nothing to poll");
    }
    for watch in &watches {
        watch.scheduler.start_polling();
    }

    let shutdown = Shutdown::new();

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(coordinator.clone(), &watches, config.admin.api_key.clone());
        let listener_shutdown = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, listener_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    for watch in &watches {
        watch.scheduler.stop_polling();
    }
    shutdown.trigger();

    if let Some(task) = admin_task {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
