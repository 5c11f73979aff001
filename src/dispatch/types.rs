//! Dispatch request/outcome types and errors.

use crate::catalog::Model;
use crate::config::Mode;
use crate::conversation::message::Message;
use crate::error::ErrorCode;
use crate::transport::TransportError;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The resolved URL is not one of the allowed provider endpoints.
    #[error("invalid endpoint: {url}")]
    InvalidEndpoint { url: String },

    /// The provider reported an error, either via status or an `error` body.
    #[error("{message}")]
    Provider { status: u16, message: String },

    /// Success status, but the body lacks the expected fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request body could not be encoded.
    #[error("request encoding failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ErrorCode for DispatchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEndpoint { .. } => "E_INVALID_ENDPOINT",
            Self::Provider { .. } => "E_PROVIDER",
            Self::MalformedResponse(_) => "E_MALFORMED_RESPONSE",
            Self::Encode(_) => "E_ENCODE",
            Self::Transport(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Provider { status, .. } => matches!(status, 429 | 500..=599),
            Self::Transport(e) => e.retryable(),
            Self::InvalidEndpoint { .. } | Self::MalformedResponse(_) | Self::Encode(_) => false,
        }
    }
}

// =============================================================================
// REQUEST / OUTCOME
// =============================================================================

/// Everything one dispatch needs. `history` excludes the outgoing prompt.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub mode: Mode,
    pub model: &'a Model,
    pub api_key: &'a str,
    pub base_url: &'a str,
    pub history: &'a [Message],
    pub prompt: &'a str,
    pub attachments: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// The assistant reply to append.
    pub message: Message,
    /// `true` when the caller should clear its pending attachments.
    pub clear_attachments: bool,
}
