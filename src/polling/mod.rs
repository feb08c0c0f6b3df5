//! Adaptive polling subsystem.
//!
//! # Data Flow
//! ```text
//! Consumer:
//!     AdaptiveScheduler::builder(coordinator, fetch)
//!     → start_polling()          (immediate tick, then idle cadence)
//!     → enter_active_mode()      (fast cadence for active_duration)
//!
//! Each tick (timer.rs):
//!     → BackoffCoordinator::is_paused()? skip
//!     → fetch() → status.rs extracts status
//!     → status changed? on_status_change + back to idle
//!     → events.rs TickEvent to listeners
//! ```
//!
//! # Design Decisions
//! - One scheduler per consumer; schedulers never talk to each other
//! - The coordinator is the only shared state, and schedulers only read it
//! - Explicit state machine (Stopped / Idle / Active) observable via watch

pub mod events;
pub mod scheduler;
pub mod status;
pub mod timer;

pub use events::{SchedulerState, TickEvent};
pub use scheduler::{AdaptiveScheduler, PollingConfig, PollingGuard, SchedulerBuilder};
pub use status::StatusField;
