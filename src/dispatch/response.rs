//! Provider reply → assistant message.

use serde_json::Value;

use super::types::DispatchError;
use crate::config::Mode;
use crate::conversation::message::Message;
use crate::transport::HttpReply;

/// Map a raw reply to an assistant message for `mode`.
///
/// # Errors
///
/// - [`DispatchError::Provider`] for non-2xx statuses, or any body carrying `error.message`
/// - [`DispatchError::MalformedResponse`] when a 2xx body lacks the expected fields
pub fn parse_reply(mode: Mode, reply: &HttpReply) -> Result<Message, DispatchError> {
    let root: Option<Value> = serde_json::from_str(&reply.body).ok();

    if let Some(message) = root.as_ref().and_then(error_message) {
        return Err(DispatchError::Provider { status: reply.status, message });
    }
    if !reply.is_success() {
        return Err(DispatchError::Provider { status: reply.status, message: generic_message(reply, root.as_ref()) });
    }

    let Some(root) = root else {
        return Err(DispatchError::MalformedResponse("body is not JSON".to_string()));
    };
    match mode {
        Mode::Chat => parse_chat(&root),
        Mode::Image => parse_image(&root),
    }
}

pub(crate) fn parse_chat(root: &Value) -> Result<Message, DispatchError> {
    let Some(choice) = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
    else {
        return Err(DispatchError::MalformedResponse("chat_completions: missing choices[0]".to_string()));
    };
    let Some(text) = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
    else {
        return Err(DispatchError::MalformedResponse("chat_completions: missing choices[0].message.content".to_string()));
    };
    Ok(Message::assistant_markdown(text))
}

pub(crate) fn parse_image(root: &Value) -> Result<Message, DispatchError> {
    let Some(url) = root
        .get("data")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|item| item.get("url"))
        .and_then(Value::as_str)
    else {
        return Err(DispatchError::MalformedResponse("images: missing data[0].url".to_string()));
    };
    Ok(Message::assistant_image(url))
}

fn error_message(root: &Value) -> Option<String> {
    root.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn generic_message(reply: &HttpReply, root: Option<&Value>) -> String {
    match root {
        Some(value) => value.to_string(),
        None if reply.body.trim().is_empty() => format!("HTTP {}", reply.status),
        None => reply.body.clone(),
    }
}

#[cfg(test)]
#[path = "response_test.rs"]
mod tests;
