//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend response observed by the transport:
//!     → 429: backoff.rs trigger_backoff() → every scheduler skips ticks
//!     → anything else: backoff.rs reset_backoff()
//!     → user override: force_resume()
//! ```
//!
//! # Design Decisions
//! - One coordinator per process, passed explicitly to every consumer
//! - Fixed escalating schedule rather than jittered exponential delays;
//!   all pollers pause and resume together
//! - No retries here: the next scheduled tick is the retry

pub mod backoff;

pub use backoff::{BackoffCoordinator, BackoffSnapshot};
