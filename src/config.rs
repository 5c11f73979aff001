//! Client configuration parsed from environment variables.
//!
//! The binary layers command-line flags on top of these values; the library
//! only ever sees the resolved [`ClientConfig`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REFRESH_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(String),
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "E_CONFIG_PARSE",
        }
    }
}

// =============================================================================
// MODE
// =============================================================================

/// Whether an exchange is conversational or a single-turn image generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Chat,
    Image,
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "image" => Ok(Self::Image),
            other => Err(ConfigError::Parse(format!("unknown mode '{other}' (expected 'chat' or 'image')"))),
        }
    }
}

// =============================================================================
// CLIENT CONFIG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub mode: Mode,
    pub refresh_debounce_ms: u64,
    pub timeouts: Timeouts,
    /// `None` when no platform config directory exists and no override is set.
    pub credentials_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `GENCLIENT_BASE_URL`: default `https://api.openai.com/v1`
    /// - `GENCLIENT_MODE`: `chat` (default) or `image`
    /// - `GENCLIENT_REFRESH_DEBOUNCE_MS`: default 1000
    /// - `GENCLIENT_REQUEST_TIMEOUT_SECS`: default 120
    /// - `GENCLIENT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `GENCLIENT_CREDENTIALS_PATH`: default `<config dir>/genclient/credentials.json`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if `GENCLIENT_MODE` is not a known mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(
            &std::env::var("GENCLIENT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        );
        let mode = match std::env::var("GENCLIENT_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => Mode::default(),
        };
        let timeouts = Timeouts {
            request_secs: env_parse("GENCLIENT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("GENCLIENT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let credentials_path = std::env::var("GENCLIENT_CREDENTIALS_PATH")
            .ok()
            .map(PathBuf::from)
            .or_else(default_credentials_path);

        Ok(Self {
            base_url,
            mode,
            refresh_debounce_ms: env_parse("GENCLIENT_REFRESH_DEBOUNCE_MS", DEFAULT_REFRESH_DEBOUNCE_MS),
            timeouts,
            credentials_path,
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mode: Mode::default(),
            refresh_debounce_ms: DEFAULT_REFRESH_DEBOUNCE_MS,
            timeouts: Timeouts::default(),
            credentials_path: default_credentials_path(),
        }
    }
}

/// Trim surrounding whitespace and trailing slashes from an operator-typed base URL.
#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn default_credentials_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("genclient").join("credentials.json"))
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
