//! HTTP client for the server administration backend.
//!
//! # Responsibilities
//! - Fetch server status and issue start/stop actions
//! - Report every response to the shared `BackoffCoordinator`: 429 pauses
//!   all polling, anything else resets the backoff level
//! - Map non-success responses to `TransportError`

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use url::Url;

use crate::config::TransportConfig;
use crate::observability::metrics;
use crate::resilience::backoff::BackoffCoordinator;
use crate::transport::types::{ActionResponse, ErrorBody, ServerStatus, TransportError};

/// Client for the backend's server endpoints.
#[derive(Clone)]
pub struct StatusClient {
    client: Client,
    base_url: Url,
    config: TransportConfig,
    coordinator: BackoffCoordinator,
}

impl StatusClient {
    /// Build a client. Fails only if the base URL or cookie is malformed.
    pub fn new(
        config: TransportConfig,
        coordinator: BackoffCoordinator,
    ) -> Result<Self, TransportError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", config.base_url, e)))?;

        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie).map_err(|_| {
                TransportError::InvalidEndpoint("session cookie is not a valid header".into())
            })?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            config,
            coordinator,
        })
    }

    pub fn coordinator(&self) -> &BackoffCoordinator {
        &self.coordinator
    }

    /// `GET` the status endpoint for `server_id`.
    pub async fn fetch_status(&self, server_id: &str) -> Result<ServerStatus, TransportError> {
        let url = self.endpoint(&self.config.status_path, server_id)?;
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json().await?)
    }

    /// `POST` the start action for `server_id`.
    pub async fn start_server(&self, server_id: &str) -> Result<ActionResponse, TransportError> {
        let url = self.endpoint(&self.config.start_path, server_id)?;
        let response = self.send(self.client.post(url)).await?;
        Ok(response.json().await?)
    }

    /// `POST` the stop action for `server_id`.
    pub async fn stop_server(&self, server_id: &str) -> Result<ActionResponse, TransportError> {
        let url = self.endpoint(&self.config.stop_path, server_id)?;
        let response = self.send(self.client.post(url)).await?;
        Ok(response.json().await?)
    }

    fn endpoint(&self, template: &str, server_id: &str) -> Result<Url, TransportError> {
        let path = template.replace("{id}", server_id);
        self.base_url
            .join(&path)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{path}: {e}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().await?;
        let status = response.status();
        metrics::record_transport_response(status.as_u16());

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.coordinator.trigger_backoff();
            return Err(TransportError::RateLimited);
        }
        self.coordinator.reset_backoff();

        if status == StatusCode::UNAUTHORIZED {
            return Err(TransportError::Unauthorized);
        }

        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("unknown error").to_string();
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => fallback,
            };
            tracing::debug!(status = status.as_u16(), %message, "Backend request failed");
            return Err(TransportError::Status {
                code: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

impl std::fmt::Debug for StatusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}
