//! Raw model record → [`Model`] classification.
//!
//! Precedence, lowest to highest:
//! 1. default `kind = image`, `is_free = true`
//! 2. id contains a conversational keyword (case-insensitive) → `chat`
//! 3. explicit `type` field → `chat` iff it contains `"chat"`, else `image`
//! 4. explicit `is_free` flag overrides the default
//! 5. `endpoint` field, else [`DEFAULT_ENDPOINT_PATH`]

use serde_json::Value;

use super::Model;
use crate::config::Mode;

pub const DEFAULT_ENDPOINT_PATH: &str = "/v1/chat/completions";

/// Substrings marking conversational model families: vendor and family
/// names, version tokens, and generic chat markers.
pub const CHAT_KEYWORDS: &[&str] = &[
    "gpt", "claude", "sonnet", "haiku", "opus", "gemini", "gemma", "llama", "mistral", "mixtral", "qwen", "deepseek",
    "grok", "command-r", "phi-", "glm-", "kimi", "4o", "chat", "instruct",
];

/// The fields of a listing record that classification reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawModel {
    pub id: String,
    pub kind: Option<String>,
    pub is_free: Option<bool>,
    pub endpoint: Option<String>,
}

impl RawModel {
    /// Extract a record from listing JSON. Records without a string `id` yield `None`;
    /// optional fields of the wrong JSON type are treated as absent.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("id").and_then(Value::as_str)?.to_string();
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let is_free = value.get("is_free").and_then(Value::as_bool);
        let endpoint = value
            .get("endpoint")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Some(Self { id, kind, is_free, endpoint })
    }
}

/// Whether `id` names a conversational model family.
#[must_use]
pub fn is_chat_id(id: &str) -> bool {
    let id = id.to_lowercase();
    CHAT_KEYWORDS.iter().any(|keyword| id.contains(keyword))
}

#[must_use]
pub fn classify(raw: &RawModel) -> Model {
    let mut kind = Mode::Image;
    if is_chat_id(&raw.id) {
        kind = Mode::Chat;
    }
    if let Some(explicit) = &raw.kind {
        kind = if explicit.contains("chat") { Mode::Chat } else { Mode::Image };
    }

    Model {
        id: raw.id.clone(),
        kind,
        is_free: raw.is_free.unwrap_or(true),
        endpoint_path: raw
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT_PATH.to_string()),
    }
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
