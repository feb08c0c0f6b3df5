//! Backend transport.
//!
//! # Data Flow
//! ```text
//! Scheduler fetch / CLI action
//!     → client.rs (reqwest request with session cookie + timeout)
//!     → response status:
//!         429   → BackoffCoordinator::trigger_backoff(), RateLimited
//!         other → BackoffCoordinator::reset_backoff()
//!         401   → Unauthorized
//!         !2xx  → Status { code, message }
//!     → types.rs payloads
//! ```
//!
//! # Design Decisions
//! - Timeouts live here, not in the scheduler
//! - Network errors send no signal to the coordinator; only a real
//!   response does

pub mod client;
pub mod types;

pub use client::StatusClient;
pub use types::{ActionResponse, ServerStatus, TransportError};
