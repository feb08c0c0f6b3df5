use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use status_poller::config::TransportConfig;
use status_poller::lifecycle::startup::server_scheduler;
use status_poller::observability::logging;
use status_poller::polling::{PollingConfig, TickEvent};
use status_poller::{BackoffCoordinator, StatusClient};

#[derive(Parser)]
#[command(name = "poller-cli")]
#[command(about = "Check, start and stop managed game servers", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Session cookie sent with every request (e.g. "session=abc").
    #[arg(short, long)]
    cookie: Option<String>,

    /// Poll interval while watching, in milliseconds.
    #[arg(long, default_value_t = 2_000)]
    interval_ms: u64,

    /// How long to watch before giving up, in seconds.
    #[arg(long, default_value_t = 30)]
    watch_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a server's current status
    Status { id: String },
    /// Start a server
    Start {
        id: String,
        /// Follow the status until it changes
        #[arg(short, long)]
        watch: bool,
    },
    /// Stop a server
    Stop {
        id: String,
        /// Follow the status until it changes
        #[arg(short, long)]
        watch: bool,
    },
    /// Follow a server's status until it changes
    Watch { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init("warn");

    let transport = TransportConfig {
        base_url: cli.url.clone(),
        session_cookie: cli.cookie.clone(),
        ..TransportConfig::default()
    };
    let client = StatusClient::new(transport, BackoffCoordinator::new())?;
    let polling = PollingConfig::new(
        Duration::from_millis(cli.interval_ms),
        Duration::from_millis(cli.interval_ms),
        Duration::from_secs(cli.watch_secs),
    );

    match cli.command {
        Commands::Status { id } => {
            let status = client.fetch_status(&id).await?;
            println!("{}: {}", id, status.status);
        }
        Commands::Start { id, watch } => {
            let res = client.start_server(&id).await?;
            println!("{}", res.message);
            if watch {
                watch_server(&client, &id, polling).await;
            }
        }
        Commands::Stop { id, watch } => {
            let res = client.stop_server(&id).await?;
            println!("{}", res.message);
            if watch {
                watch_server(&client, &id, polling).await;
            }
        }
        Commands::Watch { id } => watch_server(&client, &id, polling).await,
    }

    Ok(())
}

/// Poll at the active cadence until the status changes or the window ends.
async fn watch_server(client: &StatusClient, id: &str, polling: PollingConfig) {
    let scheduler = server_scheduler(client, id, id, polling, |current, previous| {
        println!("status changed: {} -> {}", previous, current);
    });
    let mut state = scheduler.subscribe();
    let mut events = scheduler.events();

    let guard = scheduler.scoped();
    guard.enter_active_mode();
    let _ = state.borrow_and_update();

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() || !state.borrow_and_update().is_active() {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(TickEvent::Fetched { status: Some(status) }) => println!("{}: {}", id, status),
                Ok(TickEvent::Skipped) => println!(
                    "rate limited, retrying in {}s",
                    client.coordinator().remaining_seconds()
                ),
                Ok(TickEvent::Failed { error }) => eprintln!("Error: {}", error),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    }

    if let Some(status) = guard.last_status() {
        println!("{}: {} (stopped watching)", id, status);
    }
}
