//! Wiring of schedulers to the backend.
//!
//! One `BackoffCoordinator` is shared by the `StatusClient` (which writes it)
//! and every server scheduler (which read it).

use crate::config::PollerConfig;
use crate::polling::{AdaptiveScheduler, PollingConfig};
use crate::transport::{ServerStatus, StatusClient, TransportError};

pub type ServerScheduler = AdaptiveScheduler<ServerStatus, TransportError>;

/// A scheduler bound to one backend server.
#[derive(Debug, Clone)]
pub struct ServerWatch {
    pub name: String,
    pub server_id: String,
    pub scheduler: ServerScheduler,
}

/// Build a scheduler polling `server_id` through `client`.
///
/// `on_status_change` receives `(current, previous)`.
pub fn server_scheduler<F>(
    client: &StatusClient,
    name: &str,
    server_id: &str,
    polling: PollingConfig,
    on_status_change: F,
) -> ServerScheduler
where
    F: Fn(&str, &str) + Send + Sync + 'static,
{
    let fetch_client = client.clone();
    let id = server_id.to_string();

    AdaptiveScheduler::builder(client.coordinator().clone(), move || {
        let client = fetch_client.clone();
        let id = id.clone();
        async move { client.fetch_status(&id).await }
    })
    .name(name)
    .config(polling)
    .on_status_change(on_status_change)
    .build()
}

/// One watch per configured server, all sharing the client's coordinator.
pub fn build_watches(config: &PollerConfig, client: &StatusClient) -> Vec<ServerWatch> {
    let polling = config.polling.to_polling_config();

    config
        .servers
        .iter()
        .map(|server| {
            let label = server.name.clone();
            let on_change = move |current: &str, previous: &str| {
                tracing::info!(server = %label, %previous, %current, "Server status changed");
            };
            let scheduler =
                server_scheduler(client, &server.name, &server.id, polling, on_change);
            ServerWatch {
                name: server.name.clone(),
                server_id: server.id.clone(),
                scheduler,
            }
        })
        .collect()
}
