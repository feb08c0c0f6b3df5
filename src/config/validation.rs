//! Configuration validation.
//!
//! # Responsibilities
//! - Repair out-of-range values by falling back to defaults (`sanitize`)
//! - Reject values that cannot be repaired (`validate_config`)
//!
//! # Design Decisions
//! - Polling and backoff values never fail a load; they are reset and the
//!   correction is reported
//! - Addresses and URLs have no sensible fallback, so they are errors
//! - Returns all validation errors, not just the first

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{
    BackoffSettings, ObservabilityConfig, PollerConfig, PollingSettings, TransportConfig,
};
use crate::resilience::backoff::is_valid_schedule;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A value that was replaced during sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// A configuration value that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Replace out-of-range values with defaults, returning what changed.
pub fn sanitize(config: &mut PollerConfig) -> Vec<Correction> {
    let mut corrections = Vec::new();
    let polling_defaults = PollingSettings::default();

    let polling = &mut config.polling;
    for (field, value, default) in [
        (
            "polling.idle_interval_ms",
            &mut polling.idle_interval_ms,
            polling_defaults.idle_interval_ms,
        ),
        (
            "polling.active_interval_ms",
            &mut polling.active_interval_ms,
            polling_defaults.active_interval_ms,
        ),
        (
            "polling.active_duration_ms",
            &mut polling.active_duration_ms,
            polling_defaults.active_duration_ms,
        ),
    ] {
        if *value == 0 {
            *value = default;
            corrections.push(Correction {
                field,
                reason: format!("must be positive, using {default}"),
            });
        }
    }

    if !is_valid_schedule(&config.backoff.schedule()) {
        corrections.push(Correction {
            field: "backoff.delays_ms",
            reason: format!(
                "{:?} is not a non-empty, positive, non-decreasing schedule, using default",
                config.backoff.delays_ms
            ),
        });
        config.backoff = BackoffSettings::default();
    }

    if config.transport.timeout_secs == 0 {
        let default = TransportConfig::default().timeout_secs;
        config.transport.timeout_secs = default;
        corrections.push(Correction {
            field: "transport.timeout_secs",
            reason: format!("must be positive, using {default}"),
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        config.observability.log_level = level;
    } else {
        corrections.push(Correction {
            field: "observability.log_level",
            reason: format!("unknown level {:?}, using info", config.observability.log_level),
        });
        config.observability.log_level = ObservabilityConfig::default().log_level;
    }

    let mut seen = HashSet::new();
    config.servers.retain(|server| {
        if server.id.trim().is_empty() {
            corrections.push(Correction {
                field: "servers.id",
                reason: format!("server {:?} has no id, ignoring", server.name),
            });
            return false;
        }
        if !seen.insert(server.name.clone()) {
            corrections.push(Correction {
                field: "servers.name",
                reason: format!("duplicate server name {:?}, ignoring", server.name),
            });
            return false;
        }
        true
    });

    corrections
}

/// Check values that have no fallback.
pub fn validate_config(config: &PollerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.transport.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError {
            field: "transport.base_url",
            message: format!("unsupported scheme {:?}", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError {
            field: "transport.base_url",
            message: e.to_string(),
        }),
    }

    for (field, path) in [
        ("transport.status_path", &config.transport.status_path),
        ("transport.start_path", &config.transport.start_path),
        ("transport.stop_path", &config.transport.stop_path),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError {
                field,
                message: format!("{path:?} must start with '/'"),
            });
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            message: format!("{:?} is not a socket address", config.observability.metrics_address),
        });
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "admin.bind_address",
            message: format!("{:?} is not a socket address", config.admin.bind_address),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
