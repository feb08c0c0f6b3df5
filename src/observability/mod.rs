//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Schedulers, coordinator, transport:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (tick outcomes, backoff level, pause flag)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint (daemon only)
//! ```
//!
//! # Design Decisions
//! - Metric calls are no-ops until a recorder is installed, so the library
//!   never requires an exporter
//! - Log level comes from `RUST_LOG` first, then configuration

pub mod logging;
pub mod metrics;
