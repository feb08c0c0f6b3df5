//! Adaptive polling scheduler.
//!
//! # Responsibilities
//! - Run a consumer's fetch operation on an idle or active cadence
//! - Skip ticks while the shared `BackoffCoordinator` is paused
//! - Drop back to idle when the active window expires or the observed
//!   status changes
//!
//! # Design Decisions
//! - At most one recurring timer and one expiry timer per scheduler; every
//!   replacement drops (aborts) the previous handle and bumps a generation
//!   so a timer that already fired cannot act on replaced state
//! - The fetch operation is invoked under the state lock, so once
//!   `stop_polling` returns no further fetch is started
//! - Timer tasks hold `Weak` references: dropping the last handle stops
//!   polling
//! - `poll_now` bypasses both the schedule and the pause flag

use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{broadcast, watch};

use crate::observability::metrics;
use crate::polling::events::{SchedulerState, TickEvent};
use crate::polling::status::StatusField;
use crate::polling::timer::{self, TimerHandle};
use crate::resilience::backoff::BackoffCoordinator;

pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(12_000);
pub const DEFAULT_ACTIVE_INTERVAL: Duration = Duration::from_millis(2_000);
pub const DEFAULT_ACTIVE_DURATION: Duration = Duration::from_millis(30_000);

const EVENT_CAPACITY: usize = 64;

/// Cadence configuration, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Tick period while idle.
    pub idle_interval: Duration,
    /// Tick period while active.
    pub active_interval: Duration,
    /// How long active mode lasts without a fresh `enter_active_mode`.
    pub active_duration: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            idle_interval: DEFAULT_IDLE_INTERVAL,
            active_interval: DEFAULT_ACTIVE_INTERVAL,
            active_duration: DEFAULT_ACTIVE_DURATION,
        }
    }
}

impl PollingConfig {
    pub fn new(
        idle_interval: Duration,
        active_interval: Duration,
        active_duration: Duration,
    ) -> Self {
        Self {
            idle_interval,
            active_interval,
            active_duration,
        }
        .sanitized()
    }

    /// Replace zero durations with their defaults.
    pub fn sanitized(self) -> Self {
        fn or_default(value: Duration, default: Duration) -> Duration {
            if value.is_zero() { default } else { value }
        }

        Self {
            idle_interval: or_default(self.idle_interval, DEFAULT_IDLE_INTERVAL),
            active_interval: or_default(self.active_interval, DEFAULT_ACTIVE_INTERVAL),
            active_duration: or_default(self.active_duration, DEFAULT_ACTIVE_DURATION),
        }
    }
}

type FetchFn<T, E> = Box<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type StatusCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

struct Core {
    state: SchedulerState,
    last_status: Option<String>,
    tick_timer: Option<TimerHandle>,
    expiry_timer: Option<TimerHandle>,
    /// Bumped on start and stop; fetch completions from an older run are dropped.
    run_epoch: u64,
    /// Sequence of the last issued fetch.
    issued_seq: u64,
    /// Sequence of the newest result applied to `last_status`.
    applied_seq: u64,
    tick_gen: u64,
    expiry_gen: u64,
}

struct Inner<T, E> {
    name: String,
    fetch: FetchFn<T, E>,
    config: PollingConfig,
    on_status_change: Option<StatusCallback>,
    coordinator: BackoffCoordinator,
    core: Mutex<Core>,
    state_tx: watch::Sender<SchedulerState>,
    events: broadcast::Sender<TickEvent>,
}

impl<T, E> Inner<T, E>
where
    T: StatusField + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, core: &mut Core, state: SchedulerState) {
        core.state = state;
        self.state_tx.send_if_modified(|current| {
            let modified = *current != state;
            *current = state;
            modified
        });
    }

    fn emit(&self, event: TickEvent) {
        metrics::record_tick(&self.name, event.outcome());
        let _ = self.events.send(event);
    }

    fn start_locked(self: &Arc<Self>, core: &mut Core) {
        core.run_epoch += 1;
        self.set_state(core, SchedulerState::Idle);
        tracing::info!(
            poller = %self.name,
            idle_interval_ms = self.config.idle_interval.as_millis() as u64,
            "Polling started"
        );
        self.tick_locked(core);
        self.arm_ticks(core, self.config.idle_interval);
    }

    fn arm_ticks(self: &Arc<Self>, core: &mut Core, period: Duration) {
        core.tick_timer = None;
        core.tick_gen += 1;

        let generation = core.tick_gen;
        let weak = Arc::downgrade(self);
        core.tick_timer = Some(timer::schedule_every(period, move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_tick_timer(generation);
            }
        }));
    }

    fn arm_expiry(self: &Arc<Self>, core: &mut Core) {
        core.expiry_timer = None;
        core.expiry_gen += 1;

        let generation = core.expiry_gen;
        let weak = Arc::downgrade(self);
        core.expiry_timer = Some(timer::schedule_after(self.config.active_duration, move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_expiry_timer(generation);
            }
        }));
    }

    fn on_tick_timer(self: &Arc<Self>, generation: u64) {
        let mut core = self.lock();
        if core.tick_gen != generation || !core.state.is_polling() {
            return;
        }
        self.tick_locked(&mut core);
    }

    fn on_expiry_timer(self: &Arc<Self>, generation: u64) {
        let mut core = self.lock();
        if core.expiry_gen != generation || core.state != SchedulerState::Active {
            return;
        }
        tracing::debug!(poller = %self.name, "Active window elapsed");
        self.exit_active_locked(&mut core);
    }

    fn exit_active_locked(self: &Arc<Self>, core: &mut Core) {
        core.expiry_timer = None;
        core.expiry_gen += 1;
        self.set_state(core, SchedulerState::Idle);
        self.arm_ticks(core, self.config.idle_interval);
        tracing::info!(poller = %self.name, "Returned to idle polling");
    }

    fn tick_locked(self: &Arc<Self>, core: &mut Core) {
        if self.coordinator.is_paused() {
            tracing::debug!(poller = %self.name, "Skipping poll, rate limit backoff in progress");
            self.emit(TickEvent::Skipped);
            return;
        }

        core.issued_seq += 1;
        let seq = core.issued_seq;
        let epoch = core.run_epoch;
        let fetch = (self.fetch)();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let result = fetch.await;
            if let Some(inner) = weak.upgrade() {
                inner.complete_tick(epoch, seq, result);
            }
        });
    }

    fn complete_tick(self: &Arc<Self>, epoch: u64, seq: u64, result: Result<T, E>) {
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                if self.lock().run_epoch != epoch {
                    return;
                }
                tracing::warn!(poller = %self.name, error = %err, "Poll failed");
                self.emit(TickEvent::Failed {
                    error: err.to_string(),
                });
                return;
            }
        };

        let current = value.status_field();
        let change = {
            let mut core = self.lock();
            if core.run_epoch != epoch || !core.state.is_polling() {
                return;
            }
            // A newer tick already landed; this result is out of date.
            if seq <= core.applied_seq {
                tracing::debug!(poller = %self.name, seq, "Dropping stale poll result");
                return;
            }
            core.applied_seq = seq;
            let previous = std::mem::replace(&mut core.last_status, current.clone());
            match (&self.on_status_change, previous, &current) {
                (Some(_), Some(previous), Some(current)) if previous != *current => {
                    Some((current.clone(), previous))
                }
                _ => None,
            }
        };

        self.emit(TickEvent::Fetched {
            status: current,
        });

        let Some((current, previous)) = change else {
            return;
        };

        tracing::debug!(
            poller = %self.name,
            previous = %previous,
            current = %current,
            "Status changed"
        );
        if let Some(callback) = &self.on_status_change {
            callback(&current, &previous);
        }
        metrics::record_status_change(&self.name);
        self.emit(TickEvent::StatusChanged { current, previous });

        // A status change ends the active window early.
        let mut core = self.lock();
        if core.run_epoch == epoch && core.state == SchedulerState::Active {
            self.exit_active_locked(&mut core);
        }
    }
}

/// Recurring status poller with idle and active cadences.
///
/// Cloning yields another handle to the same scheduler. Polling stops when
/// the last handle is dropped.
pub struct AdaptiveScheduler<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for AdaptiveScheduler<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> AdaptiveScheduler<T, E>
where
    T: StatusField + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Create a scheduler with no status-change callback.
    pub fn new<F, Fut>(coordinator: BackoffCoordinator, config: PollingConfig, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::builder(coordinator, fetch).config(config).build()
    }

    pub fn builder<F, Fut>(coordinator: BackoffCoordinator, fetch: F) -> SchedulerBuilder<T, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        SchedulerBuilder {
            name: String::from("poller"),
            coordinator,
            config: PollingConfig::default(),
            fetch: Box::new(move || fetch().boxed()),
            on_status_change: None,
        }
    }

    /// Begin idle polling: one tick now, then one every `idle_interval`.
    ///
    /// No-op when already polling. Must be called within a Tokio runtime.
    pub fn start_polling(&self) {
        let mut core = self.inner.lock();
        if core.state.is_polling() {
            return;
        }
        self.inner.start_locked(&mut core);
    }

    /// Switch to the fast cadence for `active_duration`, starting polling
    /// first if needed. Calling again while active restarts the window.
    pub fn enter_active_mode(&self) {
        let mut core = self.inner.lock();
        if !core.state.is_polling() {
            self.inner.start_locked(&mut core);
        }

        self.inner.set_state(&mut core, SchedulerState::Active);
        self.inner.arm_ticks(&mut core, self.inner.config.active_interval);
        self.inner.arm_expiry(&mut core);

        tracing::info!(
            poller = %self.inner.name,
            active_interval_ms = self.inner.config.active_interval.as_millis() as u64,
            active_duration_ms = self.inner.config.active_duration.as_millis() as u64,
            "Entered active polling"
        );
    }

    /// Return to the idle cadence. No-op unless active.
    pub fn exit_active_mode(&self) {
        let mut core = self.inner.lock();
        if core.state != SchedulerState::Active {
            return;
        }
        self.inner.exit_active_locked(&mut core);
    }

    /// Cancel every timer and forget the observed status. Idempotent.
    pub fn stop_polling(&self) {
        let mut core = self.inner.lock();
        if !core.state.is_polling() {
            return;
        }

        core.tick_timer = None;
        core.expiry_timer = None;
        core.tick_gen += 1;
        core.expiry_gen += 1;
        core.run_epoch += 1;
        core.last_status = None;
        self.inner.set_state(&mut core, SchedulerState::Stopped);

        tracing::info!(poller = %self.inner.name, "Polling stopped");
    }

    /// Fetch once right now, regardless of schedule or backoff.
    pub async fn poll_now(&self) -> Result<T, E> {
        let fetch = (self.inner.fetch)();
        fetch.await
    }

    /// Start polling and stop again when the returned guard is dropped.
    pub fn scoped(&self) -> PollingGuard<T, E> {
        self.start_polling();
        PollingGuard {
            scheduler: self.clone(),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.inner.lock().state.is_polling()
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().state.is_active()
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.lock().state
    }

    /// Status seen on the most recent successful tick.
    pub fn last_status(&self) -> Option<String> {
        self.inner.lock().last_status.clone()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> PollingConfig {
        self.inner.config
    }

    pub fn coordinator(&self) -> &BackoffCoordinator {
        &self.inner.coordinator
    }

    /// Watch state machine transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.inner.state_tx.subscribe()
    }

    /// Receive tick outcomes, including fetch failures.
    pub fn events(&self) -> broadcast::Receiver<TickEvent> {
        self.inner.events.subscribe()
    }
}

impl<T, E> fmt::Debug for AdaptiveScheduler<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("AdaptiveScheduler")
            .field("name", &self.inner.name)
            .field("state", &core.state)
            .field("last_status", &core.last_status)
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Builder for [`AdaptiveScheduler`].
pub struct SchedulerBuilder<T, E> {
    name: String,
    coordinator: BackoffCoordinator,
    config: PollingConfig,
    fetch: FetchFn<T, E>,
    on_status_change: Option<StatusCallback>,
}

impl<T, E> SchedulerBuilder<T, E>
where
    T: StatusField + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Label used in logs and metrics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(mut self, config: PollingConfig) -> Self {
        self.config = config;
        self
    }

    /// Called as `(current, previous)` when a tick observes a new status.
    pub fn on_status_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.on_status_change = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> AdaptiveScheduler<T, E> {
        let (state_tx, _) = watch::channel(SchedulerState::Stopped);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        AdaptiveScheduler {
            inner: Arc::new(Inner {
                name: self.name,
                fetch: self.fetch,
                config: self.config.sanitized(),
                on_status_change: self.on_status_change,
                coordinator: self.coordinator,
                core: Mutex::new(Core {
                    state: SchedulerState::Stopped,
                    last_status: None,
                    tick_timer: None,
                    expiry_timer: None,
                    run_epoch: 0,
                    issued_seq: 0,
                    applied_seq: 0,
                    tick_gen: 0,
                    expiry_gen: 0,
                }),
                state_tx,
                events,
            }),
        }
    }
}

/// Keeps a scheduler polling for as long as it lives.
pub struct PollingGuard<T, E>
where
    T: StatusField + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    scheduler: AdaptiveScheduler<T, E>,
}

impl<T, E> Deref for PollingGuard<T, E>
where
    T: StatusField + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    type Target = AdaptiveScheduler<T, E>;

    fn deref(&self) -> &Self::Target {
        &self.scheduler
    }
}

impl<T, E> Drop for PollingGuard<T, E>
where
    T: StatusField + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    fn drop(&mut self) {
        self.scheduler.stop_polling();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::{self, Ready};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time;

    type TestScheduler = AdaptiveScheduler<Value, String>;

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    async fn elapse(ms: u64) {
        time::advance(Duration::from_millis(ms)).await;
        settle().await;
    }

    /// Fetch returning `statuses` in order, repeating the last one.
    fn scripted(
        statuses: &'static [&'static str],
    ) -> (Arc<AtomicU32>, impl Fn() -> Ready<Result<Value, String>> + Send + Sync + 'static) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let fetch = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            let status = statuses[n.min(statuses.len() - 1)];
            future::ready(Ok(json!({ "status": status })))
        };
        (calls, fetch)
    }

    fn build<F>(config: PollingConfig, fetch: F) -> TestScheduler
    where
        F: Fn() -> Ready<Result<Value, String>> + Send + Sync + 'static,
    {
        AdaptiveScheduler::new(BackoffCoordinator::new(), config, fetch)
    }

    fn ms(idle: u64, active: u64, duration: u64) -> PollingConfig {
        PollingConfig::new(
            Duration::from_millis(idle),
            Duration::from_millis(active),
            Duration::from_millis(duration),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_stopped() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(PollingConfig::default(), fetch);

        assert!(!scheduler.is_polling());
        assert!(!scheduler.is_active());
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fetches_immediately() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(PollingConfig::default(), fetch);

        scheduler.start_polling();
        assert!(scheduler.is_polling());
        assert!(!scheduler.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        scheduler.start_polling();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_interval_cadence() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(1_000, 500, 5_000), fetch);

        scheduler.start_polling();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        elapse(999).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        elapse(1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        elapse(1_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_mode_uses_fast_cadence() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(10_000, 1_000, 30_000), fetch);

        scheduler.start_polling();
        scheduler.enter_active_mode();
        assert!(scheduler.is_active());

        elapse(1_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        elapse(1_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_mode_expires_back_to_idle() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(10_000, 1_000, 5_000), fetch);

        scheduler.start_polling();
        scheduler.enter_active_mode();

        elapse(4_999).await;
        assert!(scheduler.is_active());

        elapse(1).await;
        assert!(!scheduler.is_active());
        assert!(scheduler.is_polling());

        // Ticks at 1s..=4s, plus the one at 5s which may land either side of
        // the expiry; after that only the idle cadence applies.
        let after_expiry = calls.load(Ordering::SeqCst);
        elapse(9_999).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_expiry);
        elapse(1).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_expiry + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentering_active_restarts_window() {
        let (_calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(10_000, 1_000, 5_000), fetch);

        scheduler.enter_active_mode();
        elapse(3_000).await;
        scheduler.enter_active_mode();

        elapse(3_000).await;
        assert!(scheduler.is_active());

        elapse(2_000).await;
        assert!(!scheduler.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_active_before_start_starts_polling() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(10_000, 1_000, 5_000), fetch);

        scheduler.enter_active_mode();
        assert!(scheduler.is_polling());
        assert!(scheduler.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_active_when_idle_is_noop() {
        let (_calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(1_000, 500, 5_000), fetch);

        scheduler.start_polling();
        let mut rx = scheduler.subscribe();
        rx.borrow_and_update();

        scheduler.exit_active_mode();
        assert!(!rx.has_changed().unwrap());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_exit_restores_idle_cadence() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(3_000, 1_000, 30_000), fetch);

        scheduler.enter_active_mode();
        scheduler.exit_active_mode();
        assert!(!scheduler.is_active());

        elapse(2_999).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        elapse(1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_everything() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(1_000, 500, 5_000), fetch);

        scheduler.enter_active_mode();
        elapse(500).await;
        settle().await;
        assert_eq!(scheduler.last_status().as_deref(), Some("Running"));

        scheduler.stop_polling();
        assert!(!scheduler.is_polling());
        assert!(!scheduler.is_active());
        assert!(scheduler.last_status().is_none());

        let calls_at_stop = calls.load(Ordering::SeqCst);
        elapse(60_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), calls_at_stop);

        scheduler.stop_polling();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_now_ignores_state_and_pause() {
        let (calls, fetch) = scripted(&["Running"]);
        let coordinator = BackoffCoordinator::new();
        let scheduler: TestScheduler =
            AdaptiveScheduler::new(coordinator.clone(), PollingConfig::default(), fetch);

        let result = scheduler.poll_now().await.unwrap();
        assert_eq!(result, json!({"status": "Running"}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        coordinator.trigger_backoff();
        let result = scheduler.poll_now().await.unwrap();
        assert_eq!(result["status"], "Running");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_now_propagates_failure() {
        let scheduler: TestScheduler = AdaptiveScheduler::new(
            BackoffCoordinator::new(),
            PollingConfig::default(),
            || future::ready(Err::<Value, String>("connection refused".to_string())),
        );

        let err = scheduler.poll_now().await.unwrap_err();
        assert_eq!(err, "connection refused");
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_coordinator_skips_ticks() {
        let (calls, fetch) = scripted(&["Running"]);
        let coordinator = BackoffCoordinator::with_schedule(vec![Duration::from_millis(1_500)]);
        let scheduler: TestScheduler =
            AdaptiveScheduler::new(coordinator.clone(), ms(1_000, 500, 5_000), fetch);
        let mut events = scheduler.events();

        scheduler.start_polling();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(events.recv().await.unwrap(), TickEvent::Fetched { .. }));

        coordinator.trigger_backoff();

        elapse(1_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(events.recv().await.unwrap(), TickEvent::Skipped);

        elapse(500).await;
        assert!(!coordinator.is_paused());

        elapse(500).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_change_ends_active_mode_early() {
        let (_calls, fetch) = scripted(&["Running", "Stopped"]);
        let seen = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
        let sink = seen.clone();

        let scheduler: TestScheduler = AdaptiveScheduler::builder(BackoffCoordinator::new(), fetch)
            .name("srv-1")
            .config(ms(10_000, 1_000, 30_000))
            .on_status_change(move |current, previous| {
                sink.lock().unwrap().push((current.to_string(), previous.to_string()));
            })
            .build();

        scheduler.start_polling();
        settle().await;
        assert_eq!(scheduler.last_status().as_deref(), Some("Running"));

        scheduler.enter_active_mode();
        elapse(1_000).await;

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[("Stopped".to_string(), "Running".to_string())]
        );
        assert!(!scheduler.is_active());
        assert!(scheduler.is_polling());
        assert_eq!(scheduler.last_status().as_deref(), Some("Stopped"));

        // Unchanged status does not fire again.
        elapse(10_000).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_does_not_overwrite_newer_status() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let fetch = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Ok(json!({"status": "Stopped"})),
                    1 => {
                        time::sleep(Duration::from_millis(1_500)).await;
                        Ok(json!({"status": "Starting"}))
                    }
                    _ => Ok(json!({"status": "Running"})),
                }
            }
            .boxed()
        };
        let seen = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
        let sink = seen.clone();

        let scheduler: TestScheduler = AdaptiveScheduler::builder(BackoffCoordinator::new(), fetch)
            .config(ms(10_000, 1_000, 30_000))
            .on_status_change(move |current, previous| {
                sink.lock().unwrap().push((current.to_string(), previous.to_string()));
            })
            .build();

        scheduler.enter_active_mode();
        settle().await;
        assert_eq!(scheduler.last_status().as_deref(), Some("Stopped"));

        // Second fetch is still in flight when the third one lands.
        elapse(1_000).await;
        elapse(1_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.last_status().as_deref(), Some("Running"));

        elapse(500).await;
        elapse(1_000).await;
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[("Running".to_string(), "Stopped".to_string())]
        );
        assert_eq!(scheduler.last_status().as_deref(), Some("Running"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_status_does_not_fire_callback() {
        let (_calls, fetch) = scripted(&["", "Running"]);
        let fired = Arc::new(AtomicU32::new(0));
        let f = fired.clone();

        let scheduler: TestScheduler = AdaptiveScheduler::builder(BackoffCoordinator::new(), fetch)
            .config(ms(1_000, 500, 5_000))
            .on_status_change(move |_, _| {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        scheduler.start_polling();
        settle().await;
        assert!(scheduler.last_status().is_none());

        elapse(1_000).await;
        assert_eq!(scheduler.last_status().as_deref(), Some("Running"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_status_does_not_fire_callback() {
        let (_calls, fetch) = scripted(&["Running"]);
        let fired = Arc::new(AtomicU32::new(0));
        let f = fired.clone();

        let scheduler: TestScheduler = AdaptiveScheduler::builder(BackoffCoordinator::new(), fetch)
            .config(ms(1_000, 500, 5_000))
            .on_status_change(move |_, _| {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        scheduler.start_polling();
        elapse(3_000).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_keeps_schedule() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let scheduler: TestScheduler = AdaptiveScheduler::new(
            BackoffCoordinator::new(),
            ms(1_000, 500, 5_000),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                future::ready(if n == 0 {
                    Err("boom".to_string())
                } else {
                    Ok(json!({"status": "Running"}))
                })
            },
        );
        let mut events = scheduler.events();

        scheduler.start_polling();
        settle().await;
        assert_eq!(
            events.recv().await.unwrap(),
            TickEvent::Failed { error: "boom".to_string() }
        );
        assert!(scheduler.is_polling());

        elapse(1_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.last_status().as_deref(), Some("Running"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_handle_stops_polling() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(1_000, 500, 5_000), fetch);

        scheduler.start_polling();
        settle().await;
        drop(scheduler);

        elapse(10_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_stops_on_drop() {
        let (calls, fetch) = scripted(&["Running"]);
        let scheduler = build(ms(1_000, 500, 5_000), fetch);

        {
            let guard = scheduler.scoped();
            assert!(guard.is_polling());
            elapse(1_000).await;
        }

        assert!(!scheduler.is_polling());
        let calls_at_drop = calls.load(Ordering::SeqCst);
        elapse(5_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), calls_at_drop);
    }

    #[test]
    fn test_zero_durations_fall_back_to_defaults() {
        let config = ms(0, 0, 0);
        assert_eq!(config, PollingConfig::default());

        let config = ms(1_000, 0, 5_000);
        assert_eq!(config.idle_interval, Duration::from_millis(1_000));
        assert_eq!(config.active_interval, DEFAULT_ACTIVE_INTERVAL);
    }
}
