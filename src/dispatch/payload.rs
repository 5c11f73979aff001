//! Request body construction.
//!
//! Chat mode sends the prior history plus the outgoing user turn in the
//! `OpenAI` chat-completions shape. Image mode is single-turn and sends only
//! the prompt; history and attachments are not part of the request.

use serde::Serialize;
use serde_json::Value;

use super::types::{DispatchError, DispatchRequest};
use crate::config::Mode;
use crate::conversation::message::{Content, ContentPart, Message, Role};

pub const IMAGE_COUNT: u32 = 1;
pub const IMAGE_SIZE: &str = "1024x1024";

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum WirePart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },

    #[serde(rename = "image_url")]
    ImageUrl { image_url: WireImageUrl<'a> },
}

#[derive(Serialize)]
struct WireImageUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'static str,
}

impl<'a> From<&'a ContentPart> for WirePart<'a> {
    fn from(part: &'a ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::Text { text },
            ContentPart::ImageRef { url } => Self::ImageUrl { image_url: WireImageUrl { url } },
        }
    }
}

impl<'a> From<&'a Content> for WireContent<'a> {
    fn from(content: &'a Content) -> Self {
        match content {
            Content::Text(text) => Self::Text(text),
            Content::Parts(parts) => Self::Parts(parts.iter().map(WirePart::from).collect()),
        }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

/// Build the JSON body for `request` according to its mode.
///
/// # Errors
///
/// Returns [`DispatchError::Encode`] if serialization fails.
pub fn build_body(request: &DispatchRequest<'_>) -> Result<Value, DispatchError> {
    match request.mode {
        Mode::Chat => chat_body(&request.model.id, request.history, request.prompt, request.attachments),
        Mode::Image => image_body(&request.model.id, request.prompt),
    }
}

/// `{ model, messages: history ++ [user turn] }`. Error entries never leave the client.
///
/// # Errors
///
/// Returns [`DispatchError::Encode`] if serialization fails.
pub fn chat_body(model: &str, history: &[Message], prompt: &str, attachments: &[String]) -> Result<Value, DispatchError> {
    let turn = Content::compose(prompt, attachments);
    let mut messages: Vec<WireMessage<'_>> = history
        .iter()
        .filter(|m| m.role != Role::Error)
        .map(|m| WireMessage { role: m.role.as_str(), content: WireContent::from(&m.content) })
        .collect();
    messages.push(WireMessage { role: Role::User.as_str(), content: WireContent::from(&turn) });

    encode(&ChatRequest { model, messages })
}

/// `{ model, prompt, n: 1, size: "1024x1024" }`.
///
/// # Errors
///
/// Returns [`DispatchError::Encode`] if serialization fails.
pub fn image_body(model: &str, prompt: &str) -> Result<Value, DispatchError> {
    encode(&ImageRequest { model, prompt, n: IMAGE_COUNT, size: IMAGE_SIZE })
}

fn encode(body: &impl Serialize) -> Result<Value, DispatchError> {
    serde_json::to_value(body).map_err(|e| DispatchError::Encode(e.to_string()))
}

#[cfg(test)]
#[path = "payload_test.rs"]
mod tests;
