//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML and every
//! field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::polling::PollingConfig;
use crate::resilience::backoff::DEFAULT_DELAYS_MS;

/// Root configuration for the poller.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct PollerConfig {
    /// Idle/active cadences shared by every poller.
    pub polling: PollingSettings,

    /// Rate-limit backoff schedule.
    pub backoff: BackoffSettings,

    /// Backend connection settings.
    pub transport: TransportConfig,

    /// Servers to watch, one scheduler each.
    pub servers: Vec<ServerConfig>,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Admin API.
    pub admin: AdminConfig,
}

/// Polling cadence configuration, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PollingSettings {
    pub idle_interval_ms: u64,
    pub active_interval_ms: u64,
    pub active_duration_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            idle_interval_ms: 12_000,
            active_interval_ms: 2_000,
            active_duration_ms: 30_000,
        }
    }
}

impl PollingSettings {
    pub fn to_polling_config(&self) -> PollingConfig {
        PollingConfig::new(
            Duration::from_millis(self.idle_interval_ms),
            Duration::from_millis(self.active_interval_ms),
            Duration::from_millis(self.active_duration_ms),
        )
    }
}

/// Backoff schedule configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BackoffSettings {
    /// Delay per consecutive 429, in milliseconds. The last entry repeats.
    pub delays_ms: Vec<u64>,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            delays_ms: DEFAULT_DELAYS_MS.to_vec(),
        }
    }
}

impl BackoffSettings {
    pub fn schedule(&self) -> Vec<Duration> {
        self.delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect()
    }
}

/// Backend transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Backend base URL (e.g., "http://localhost:8080").
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Status endpoint; `{id}` is replaced by the server id.
    pub status_path: String,

    /// Start action endpoint.
    pub start_path: String,

    /// Stop action endpoint.
    pub stop_path: String,

    /// Raw `Cookie` header value carrying the session, if any.
    pub session_cookie: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 10,
            status_path: "/api/servers/{id}/status".to_string(),
            start_path: "/api/servers/{id}/start".to_string(),
            stop_path: "/api/servers/{id}/stop".to_string(),
            session_cookie: None,
        }
    }
}

/// A watched server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Poller label for logs, metrics and the admin API.
    pub name: String,

    /// Backend server id substituted into endpoint paths.
    pub id: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,

    /// Bearer key required on every admin request, if set.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: None,
        }
    }
}
