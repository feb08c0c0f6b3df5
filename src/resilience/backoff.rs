//! Coordinated rate-limit backoff.
//!
//! When the backend answers 429, every poller in the process must hold off
//! together. `BackoffCoordinator` is the shared flag they all read before a
//! tick, plus the escalating delay schedule that decides how long the pause
//! lasts.
//!
//! # State Transitions
//! ```text
//! Running → Paused:  trigger_backoff() (delay = schedule[min(level, last)], level += 1)
//! Paused  → Paused:  trigger_backoff() (pending resume replaced, next delay)
//! Paused  → Running: resume timer fires, or force_resume() (level = 0)
//! any:               reset_backoff() sets level = 0, never ends a pause early
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::polling::timer::{self, TimerHandle};

/// Default delay schedule in milliseconds.
pub const DEFAULT_DELAYS_MS: [u64; 5] = [2_000, 4_000, 8_000, 16_000, 30_000];

/// Point-in-time view of the coordinator, published on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackoffSnapshot {
    pub paused: bool,
    pub level: u32,
    pub resume_at: Option<Instant>,
}

/// The default delay schedule as durations.
pub fn default_schedule() -> Vec<Duration> {
    DEFAULT_DELAYS_MS
        .iter()
        .map(|ms| Duration::from_millis(*ms))
        .collect()
}

/// Whether `schedule` can drive the coordinator: non-empty, no zero entry,
/// monotonically non-decreasing.
pub fn is_valid_schedule(schedule: &[Duration]) -> bool {
    !schedule.is_empty()
        && schedule.iter().all(|d| !d.is_zero())
        && schedule.windows(2).all(|w| w[0] <= w[1])
}

struct BackoffState {
    level: u32,
    resume_at: Option<Instant>,
    resume_timer: Option<TimerHandle>,
    /// Bumped whenever the pending resume is replaced or cancelled.
    generation: u64,
}

impl BackoffState {
    fn snapshot(&self) -> BackoffSnapshot {
        BackoffSnapshot {
            paused: self.resume_at.is_some(),
            level: self.level,
            resume_at: self.resume_at,
        }
    }
}

struct CoordinatorInner {
    schedule: Vec<Duration>,
    state: Mutex<BackoffState>,
    snapshot_tx: watch::Sender<BackoffSnapshot>,
}

impl CoordinatorInner {
    fn lock(&self) -> MutexGuard<'_, BackoffState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &BackoffState) {
        let snapshot = state.snapshot();
        metrics::record_backoff_state(snapshot.level, snapshot.paused);
        self.snapshot_tx.send_replace(snapshot);
    }

    fn auto_resume(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || state.resume_at.is_none() {
            return;
        }
        state.resume_at = None;
        state.resume_timer = None;
        self.publish(&state);
        tracing::info!(level = state.level, "Backoff ended, resuming requests");
    }
}

/// Process-wide pause flag shared by every poller and the transport.
///
/// Cloning is cheap and every clone refers to the same state.
#[derive(Clone)]
pub struct BackoffCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl BackoffCoordinator {
    /// Create a coordinator with the default schedule (2s, 4s, 8s, 16s, 30s).
    pub fn new() -> Self {
        Self::with_schedule(default_schedule())
    }

    /// Create a coordinator with a custom delay schedule.
    ///
    /// An empty, zero-containing or decreasing schedule falls back to the
    /// default.
    pub fn with_schedule(schedule: Vec<Duration>) -> Self {
        let schedule = if is_valid_schedule(&schedule) {
            schedule
        } else {
            tracing::warn!(?schedule, "Invalid backoff schedule, using default");
            default_schedule()
        };

        let (snapshot_tx, _) = watch::channel(BackoffSnapshot::default());
        Self {
            inner: Arc::new(CoordinatorInner {
                schedule,
                state: Mutex::new(BackoffState {
                    level: 0,
                    resume_at: None,
                    resume_timer: None,
                    generation: 0,
                }),
                snapshot_tx,
            }),
        }
    }

    /// Record an overload signal and pause all polling.
    ///
    /// Replaces any pending resume, so sustained overload escalates through
    /// the schedule instead of stacking timers.
    pub fn trigger_backoff(&self) {
        let mut state = self.inner.lock();

        state.resume_timer = None;
        state.generation += 1;

        let index = (state.level as usize).min(self.inner.schedule.len() - 1);
        let delay = self.inner.schedule[index];
        state.resume_at = Some(Instant::now() + delay);

        let generation = state.generation;
        let weak: Weak<CoordinatorInner> = Arc::downgrade(&self.inner);
        state.resume_timer = Some(timer::schedule_after(delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.auto_resume(generation);
            }
        }));

        tracing::warn!(
            delay_ms = delay.as_millis() as u64,
            level = state.level,
            "Rate limited, backing off globally"
        );
        metrics::record_backoff_trigger();

        state.level = state.level.saturating_add(1);
        self.inner.publish(&state);
    }

    /// Record a non-overload response. Resets the level only; a pause in
    /// progress runs to completion.
    pub fn reset_backoff(&self) {
        let mut state = self.inner.lock();
        if state.level > 0 {
            tracing::debug!(
                previous_level = state.level,
                "Request succeeded, resetting backoff level"
            );
            state.level = 0;
            self.inner.publish(&state);
        }
    }

    /// Lift the pause immediately and reset the level (manual override).
    pub fn force_resume(&self) {
        let mut state = self.inner.lock();
        state.resume_timer = None;
        state.generation += 1;
        state.resume_at = None;
        state.level = 0;
        self.inner.publish(&state);
        tracing::info!("Backoff force resumed");
    }

    /// Whether requests should currently be withheld.
    pub fn is_paused(&self) -> bool {
        self.inner.lock().resume_at.is_some()
    }

    /// Consecutive overload signals since the last success.
    pub fn level(&self) -> u32 {
        self.inner.lock().level
    }

    /// Whole seconds until the pause ends, rounded up. Zero when not paused.
    pub fn remaining_seconds(&self) -> u64 {
        let state = self.inner.lock();
        match state.resume_at {
            Some(at) => {
                let remaining = at.saturating_duration_since(Instant::now());
                remaining.as_nanos().div_ceil(1_000_000_000) as u64
            }
            None => 0,
        }
    }

    /// The delay schedule in effect.
    pub fn schedule(&self) -> &[Duration] {
        &self.inner.schedule
    }

    pub fn snapshot(&self) -> BackoffSnapshot {
        self.inner.lock().snapshot()
    }

    /// Watch pause state changes.
    pub fn subscribe(&self) -> watch::Receiver<BackoffSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }
}

impl Default for BackoffCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BackoffCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffCoordinator")
            .field("schedule", &self.inner.schedule)
            .field("state", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_unpaused() {
        let coordinator = BackoffCoordinator::new();
        assert!(!coordinator.is_paused());
        assert_eq!(coordinator.level(), 0);
        assert_eq!(coordinator.remaining_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_pauses_and_auto_resumes_after_first_delay() {
        let coordinator = BackoffCoordinator::new();
        coordinator.trigger_backoff();
        assert!(coordinator.is_paused());
        assert_eq!(coordinator.level(), 1);

        time::advance(Duration::from_millis(1_999)).await;
        settle().await;
        assert!(coordinator.is_paused());

        time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(!coordinator.is_paused());
        assert_eq!(coordinator.remaining_seconds(), 0);
        // Level survives the resume until a success is observed.
        assert_eq!(coordinator.level(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_triggers_escalate() {
        let coordinator = BackoffCoordinator::new();

        coordinator.trigger_backoff();
        assert_eq!(coordinator.remaining_seconds(), 2);

        coordinator.trigger_backoff();
        assert_eq!(coordinator.level(), 2);
        assert_eq!(coordinator.remaining_seconds(), 4);

        coordinator.trigger_backoff();
        assert_eq!(coordinator.level(), 3);
        let remaining = coordinator.remaining_seconds();
        assert!(remaining > 0 && remaining <= 8);

        // The replaced 2s and 4s timers must not end the 8s pause.
        time::advance(Duration::from_millis(4_000)).await;
        settle().await;
        assert!(coordinator.is_paused());

        time::advance(Duration::from_millis(4_000)).await;
        settle().await;
        assert!(!coordinator.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_clamps_to_last_entry() {
        let coordinator = BackoffCoordinator::new();
        for _ in 0..10 {
            coordinator.trigger_backoff();
        }
        assert_eq!(coordinator.level(), 10);
        assert_eq!(coordinator.remaining_seconds(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_seconds_rounds_up() {
        let coordinator = BackoffCoordinator::new();
        coordinator.trigger_backoff();

        time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(coordinator.remaining_seconds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_keeps_pause_in_progress() {
        let coordinator = BackoffCoordinator::new();
        coordinator.trigger_backoff();
        coordinator.trigger_backoff();

        coordinator.reset_backoff();
        assert_eq!(coordinator.level(), 0);
        assert!(coordinator.is_paused());

        time::advance(Duration::from_millis(4_000)).await;
        settle().await;
        assert!(!coordinator.is_paused());

        // Next overload starts from the bottom of the schedule again.
        coordinator.trigger_backoff();
        assert_eq!(coordinator.remaining_seconds(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_resume_cancels_pending_timer() {
        let coordinator = BackoffCoordinator::new();
        coordinator.trigger_backoff();
        coordinator.trigger_backoff();

        coordinator.force_resume();
        assert!(!coordinator.is_paused());
        assert_eq!(coordinator.level(), 0);
        assert_eq!(coordinator.remaining_seconds(), 0);

        // A new pause must not be cut short by the cancelled timer.
        time::advance(Duration::from_millis(1_000)).await;
        coordinator.trigger_backoff();
        time::advance(Duration::from_millis(1_500)).await;
        settle().await;
        assert!(coordinator.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_observes_changes() {
        let coordinator = BackoffCoordinator::new();
        let mut rx = coordinator.subscribe();

        coordinator.trigger_backoff();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().paused);

        time::advance(Duration::from_millis(2_000)).await;
        rx.changed().await.unwrap();
        let snapshot = *rx.borrow_and_update();
        assert!(!snapshot.paused);
        assert_eq!(snapshot.level, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_schedule() {
        let coordinator = BackoffCoordinator::with_schedule(vec![
            Duration::from_millis(500),
            Duration::from_secs(1),
        ]);
        coordinator.trigger_backoff();
        time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert!(!coordinator.is_paused());
    }

    #[test]
    fn test_invalid_schedule_falls_back() {
        assert!(!is_valid_schedule(&[]));
        assert!(!is_valid_schedule(&[Duration::from_secs(4), Duration::from_secs(2)]));
        assert!(!is_valid_schedule(&[Duration::ZERO]));

        let coordinator = BackoffCoordinator::with_schedule(Vec::new());
        assert_eq!(coordinator.schedule(), default_schedule().as_slice());
    }
}
