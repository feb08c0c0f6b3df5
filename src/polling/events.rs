//! Observable scheduler state and tick outcomes.

use serde::Serialize;

/// Per-scheduler state machine.
///
/// ```text
/// Stopped --start--> Idle --enter_active--> Active
/// Active --exit | expiry | status change--> Idle
/// Idle | Active --stop--> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Idle,
    Active,
}

impl SchedulerState {
    pub fn is_polling(self) -> bool {
        self != SchedulerState::Stopped
    }

    pub fn is_active(self) -> bool {
        self == SchedulerState::Active
    }
}

/// Outcome of one recurring tick, broadcast to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickEvent {
    /// Coordinator was paused; nothing was fetched.
    Skipped,
    /// Fetch succeeded.
    Fetched { status: Option<String> },
    /// Status differs from the previously observed one.
    StatusChanged { current: String, previous: String },
    /// Fetch failed. The next scheduled tick still runs.
    Failed { error: String },
}

impl TickEvent {
    pub fn outcome(&self) -> &'static str {
        match self {
            TickEvent::Skipped => "skipped",
            TickEvent::Fetched { .. } => "fetched",
            TickEvent::StatusChanged { .. } => "status_changed",
            TickEvent::Failed { .. } => "failed",
        }
    }
}
