//! HTTP transport seam shared by the model catalog and the request dispatcher.
//!
//! DESIGN
//! ======
//! The core never talks to `reqwest` directly. Catalog listing and dispatch
//! go through [`HttpTransport`], which returns the raw status and body so
//! each caller can apply its own response mapping. Tests swap in
//! `test_helpers::MockTransport` to record outgoing requests.
//!
//! Timeouts live here, on the client builder; nothing above this layer
//! enforces deadlines.

use std::time::Duration;

use serde_json::Value;

use crate::config::Timeouts;
use crate::error::ErrorCode;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be read.
    #[error("response body read failed: {0}")]
    Body(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_TRANSPORT_REQUEST",
            Self::Body(_) => "E_TRANSPORT_BODY",
            Self::ClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Body(_))
    }
}

/// Status code and body text of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// `GET url` with an optional bearer token.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] only when no HTTP response was obtained;
    /// non-success statuses come back as an [`HttpReply`].
    async fn get(&self, url: &str, bearer: &str) -> Result<HttpReply, TransportError>;

    /// `POST url` with a JSON body and an optional bearer token.
    ///
    /// # Errors
    ///
    /// Same contract as [`HttpTransport::get`].
    async fn post_json(&self, url: &str, bearer: &str, body: &Value) -> Result<HttpReply, TransportError>;
}

// =============================================================================
// REQWEST TRANSPORT
// =============================================================================

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with request and connect timeouts applied.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the TLS backend fails to initialise.
    pub fn new(timeouts: Timeouts) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self { http })
    }

    async fn finish(request: reqwest::RequestBuilder, bearer: &str) -> Result<HttpReply, TransportError> {
        let request = if bearer.is_empty() { request } else { request.bearer_auth(bearer) };
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, bearer: &str) -> Result<HttpReply, TransportError> {
        Self::finish(self.http.get(url), bearer).await
    }

    async fn post_json(&self, url: &str, bearer: &str, body: &Value) -> Result<HttpReply, TransportError> {
        Self::finish(self.http.post(url).json(body), bearer).await
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
