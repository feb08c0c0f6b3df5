use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::admin::AdminState;
use crate::lifecycle::startup::ServerWatch;
use crate::polling::SchedulerState;
use crate::resilience::BackoffCoordinator;
use crate::transport::{ServerStatus, TransportError};

#[derive(Debug, Serialize)]
pub struct BackoffStatus {
    pub paused: bool,
    pub level: u32,
    pub remaining_seconds: u64,
    pub schedule_ms: Vec<u64>,
}

impl BackoffStatus {
    fn from_coordinator(coordinator: &BackoffCoordinator) -> Self {
        let snapshot = coordinator.snapshot();
        Self {
            paused: snapshot.paused,
            level: snapshot.level,
            remaining_seconds: coordinator.remaining_seconds(),
            schedule_ms: coordinator
                .schedule()
                .iter()
                .map(|d| d.as_millis() as u64)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PollerStatus {
    pub name: String,
    pub server_id: String,
    pub state: SchedulerState,
    pub polling: bool,
    pub active: bool,
    pub last_status: Option<String>,
}

impl From<&ServerWatch> for PollerStatus {
    fn from(watch: &ServerWatch) -> Self {
        let state = watch.scheduler.state();
        Self {
            name: watch.name.clone(),
            server_id: watch.server_id.clone(),
            state,
            polling: state.is_polling(),
            active: state.is_active(),
            last_status: watch.scheduler.last_status(),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn not_found(name: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("unknown poller {name}") })),
    )
}

fn lookup(state: &AdminState, name: &str) -> Result<ServerWatch, ApiError> {
    state
        .pollers
        .get(name)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| not_found(name))
}

pub async fn get_backoff(State(state): State<AdminState>) -> Json<BackoffStatus> {
    Json(BackoffStatus::from_coordinator(&state.coordinator))
}

pub async fn force_resume(State(state): State<AdminState>) -> Json<BackoffStatus> {
    state.coordinator.force_resume();
    Json(BackoffStatus::from_coordinator(&state.coordinator))
}

pub async fn list_pollers(State(state): State<AdminState>) -> Json<Vec<PollerStatus>> {
    let mut pollers: Vec<PollerStatus> = state
        .pollers
        .iter()
        .map(|entry| PollerStatus::from(entry.value()))
        .collect();
    pollers.sort_by(|a, b| a.name.cmp(&b.name));
    Json(pollers)
}

pub async fn enter_active(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<PollerStatus>, ApiError> {
    let watch = lookup(&state, &name)?;
    watch.scheduler.enter_active_mode();
    Ok(Json(PollerStatus::from(&watch)))
}

pub async fn poll_now(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<ServerStatus>, ApiError> {
    let watch = lookup(&state, &name)?;
    match watch.scheduler.poll_now().await {
        Ok(status) => Ok(Json(status)),
        Err(err) => {
            let code = match err {
                TransportError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            };
            Err((code, Json(json!({ "error": err.to_string() }))))
        }
    }
}
