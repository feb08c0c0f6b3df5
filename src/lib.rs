//! Adaptive status polling with process-wide rate-limit backoff.

pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod polling;
pub mod resilience;
pub mod transport;

pub use config::PollerConfig;
pub use lifecycle::Shutdown;
pub use polling::{AdaptiveScheduler, PollingConfig, SchedulerState, StatusField};
pub use resilience::BackoffCoordinator;
pub use transport::{StatusClient, TransportError};
