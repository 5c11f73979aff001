//! Request dispatch — endpoint resolution, payload construction, reply mapping.
//!
//! DESIGN
//! ======
//! A dispatch is: resolve `base_url + model.endpoint_path` against the
//! allow-list, build the mode-specific body, POST it, and map the reply to
//! an assistant [`Message`](crate::conversation::message::Message). Endpoint
//! rejection happens before any network call.
//!
//! The dispatcher is stateless apart from the shared transport; the API key
//! and base URL are passed in on every call.

pub mod endpoint;
pub mod payload;
pub mod response;
pub mod types;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Mode;
use crate::error::ErrorCode;
use crate::transport::HttpTransport;
pub use types::{DispatchError, DispatchOutcome, DispatchRequest};

pub struct RequestDispatcher {
    transport: Arc<dyn HttpTransport>,
}

impl RequestDispatcher {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Send one exchange and map the reply.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] for a rejected endpoint, a transport
    /// failure, a provider error, or a malformed reply.
    pub async fn send(&self, request: &DispatchRequest<'_>) -> Result<DispatchOutcome, DispatchError> {
        let url = endpoint::resolve_endpoint(request.base_url, &request.model.endpoint_path).inspect_err(|e| {
            warn!(model = %request.model.id, error = %e, "dispatch: endpoint rejected");
        })?;
        let body = payload::build_body(request)?;

        info!(
            model = %request.model.id,
            mode = %request.mode,
            %url,
            history = request.history.len(),
            attachments = request.attachments.len(),
            "dispatch: sending"
        );
        let reply = self
            .transport
            .post_json(&url, request.api_key, &body)
            .await?;

        match response::parse_reply(request.mode, &reply) {
            Ok(message) => {
                info!(model = %request.model.id, status = reply.status, "dispatch: ok");
                Ok(DispatchOutcome { message, clear_attachments: request.mode == Mode::Chat })
            }
            Err(e) => {
                warn!(model = %request.model.id, status = reply.status, code = e.error_code(), error = %e, "dispatch: failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
