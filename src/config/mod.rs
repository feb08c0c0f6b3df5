//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (repair ranges, reject bad addresses)
//!     → PollerConfig (immutable)
//!     → polling cadences, backoff schedule, transport, admin
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; schedulers fix their cadence at
//!   construction
//! - All fields have defaults to allow minimal configs
//! - Out-of-range polling values fall back to defaults instead of failing

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use validation::Correction;
pub use schema::{
    AdminConfig, BackoffSettings, ObservabilityConfig, PollerConfig, PollingSettings,
    ServerConfig, TransportConfig,
};
