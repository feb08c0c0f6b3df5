//! Admin API: read-only pause/poller state plus manual overrides.
//!
//! # Routes
//! - `GET  /admin/backoff`                 pause flag, level, seconds left
//! - `POST /admin/backoff/resume`          force resume
//! - `GET  /admin/pollers`                 every scheduler's state
//! - `POST /admin/pollers/{name}/active`   enter active mode
//! - `POST /admin/pollers/{name}/poll`     fetch now, ignoring backoff

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::lifecycle::startup::ServerWatch;
use crate::lifecycle::ShutdownListener;
use crate::resilience::BackoffCoordinator;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub coordinator: BackoffCoordinator,
    pub pollers: Arc<DashMap<String, ServerWatch>>,
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(
        coordinator: BackoffCoordinator,
        watches: &[ServerWatch],
        api_key: Option<String>,
    ) -> Self {
        let pollers = DashMap::new();
        for watch in watches {
            pollers.insert(watch.name.clone(), watch.clone());
        }
        Self {
            coordinator,
            pollers: Arc::new(pollers),
            api_key: api_key.map(Arc::from),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/backoff", get(get_backoff))
        .route("/admin/backoff/resume", post(force_resume))
        .route("/admin/pollers", get(list_pollers))
        .route("/admin/pollers/{name}/active", post(enter_active))
        .route("/admin/pollers/{name}/poll", post(poll_now))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: ShutdownListener,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
