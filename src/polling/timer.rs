//! Cancellable timers on top of the Tokio runtime.
//!
//! # Responsibilities
//! - Run a one-shot action after a delay (`schedule_after`)
//! - Run a recurring action at a fixed period (`schedule_every`)
//! - Hand back a single-owner handle that cancels the timer
//!
//! # Design Decisions
//! - Dropping a `TimerHandle` cancels the timer; owners replace a handle by
//!   assignment and the previous one is aborted on the spot
//! - Actions are synchronous closures; anything async they start is spawned
//!   by the action itself, so a slow fetch never delays the next tick
//! - Deadlines are taken when the timer is scheduled, not when the spawned
//!   task first runs
//! - Abort alone cannot stop an action already running on another worker,
//!   so owners pair every handle with a generation number (see scheduler)

use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Owner of a scheduled timer. Cancels the timer when dropped.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    /// Cancel the timer. Equivalent to dropping the handle.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Run `action` once after `delay`.
///
/// Must be called from within a Tokio runtime.
pub fn schedule_after<F>(delay: Duration, action: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let deadline = Instant::now() + delay;
    let task = tokio::spawn(async move {
        time::sleep_until(deadline).await;
        action();
    });

    TimerHandle {
        abort: task.abort_handle(),
    }
}

/// Run `action` every `period`, first firing one full period from now.
///
/// Must be called from within a Tokio runtime.
pub fn schedule_every<F>(period: Duration, mut action: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let start = Instant::now() + period;
    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            action();
        }
    });

    TimerHandle {
        abort: task.abort_handle(),
    }
}
