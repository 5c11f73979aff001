//! Conversation message types.
//!
//! Message content is a tagged variant from the start: plain text, or an
//! ordered sequence of text and image-reference parts. The renderer matches
//! on it instead of inspecting shapes at runtime.

use serde::{Deserialize, Serialize};

use crate::catalog::Model;
use crate::config::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Error,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Error => "error",
        }
    }
}

/// How the rendering layer should present a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderHint {
    Plain,
    Markdown,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// A `data:` URI or remote URL.
    ImageRef { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Plain text when there are no attachments, else one text part followed
    /// by one image part per attachment.
    #[must_use]
    pub fn compose(prompt: &str, attachments: &[String]) -> Self {
        if attachments.is_empty() {
            return Self::Text(prompt.to_string());
        }
        let mut parts = Vec::with_capacity(attachments.len() + 1);
        parts.push(ContentPart::Text { text: prompt.to_string() });
        parts.extend(
            attachments
                .iter()
                .map(|url| ContentPart::ImageRef { url: url.clone() }),
        );
        Self::Parts(parts)
    }

    /// Concatenated text, ignoring image parts.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageRef { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    #[must_use]
    pub fn image_refs(&self) -> Vec<String> {
        match self {
            Self::Text(_) => Vec::new(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ImageRef { url } => Some(url.clone()),
                    ContentPart::Text { .. } => None,
                })
                .collect(),
        }
    }
}

/// Mode and model a user message was dispatched with. Retries replay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub mode: Mode,
    pub model: Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    pub render_hint: RenderHint,
    /// Set on user messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<Exchange>,
}

impl Message {
    #[must_use]
    pub fn user(content: Content, exchange: Exchange) -> Self {
        Self { role: Role::User, content, render_hint: RenderHint::Plain, exchange: Some(exchange) }
    }

    #[must_use]
    pub fn assistant_markdown(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: Content::Text(text.into()), render_hint: RenderHint::Markdown, exchange: None }
    }

    #[must_use]
    pub fn assistant_image(url: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: Content::Text(url.into()), render_hint: RenderHint::Image, exchange: None }
    }

    /// Retryable error entry. The text is rendered as `Error: <detail>`.
    #[must_use]
    pub fn error(detail: impl std::fmt::Display) -> Self {
        Self {
            role: Role::Error,
            content: Content::Text(format!("Error: {detail}")),
            render_hint: RenderHint::Plain,
            exchange: None,
        }
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
