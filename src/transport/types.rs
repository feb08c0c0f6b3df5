//! Backend payloads and transport errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::polling::StatusField;

/// Body of the status endpoint: `{"status": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: String,
}

impl StatusField for ServerStatus {
    fn status_field(&self) -> Option<String> {
        self.status.status_field()
    }
}

/// Body of a successful start/stop action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub message: String,
    #[serde(default)]
    pub server_id: Option<String>,
}

/// Error body returned by the backend on failure.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// Errors that can occur talking to the backend.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Backend answered 429; the shared coordinator has been told.
    #[error("rate limited by backend")]
    RateLimited,

    /// Session missing or expired.
    #[error("unauthorized")]
    Unauthorized,

    /// Any other non-success response.
    #[error("backend returned {code}: {message}")]
    Status { code: u16, message: String },

    /// Connection, timeout or decoding failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Configured base URL and path do not form a URL.
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),
}

impl TransportError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::RateLimited)
    }
}
