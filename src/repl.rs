//! Line-oriented front end: command parsing, attachment loading, and
//! plain-text rendering of store state.
//!
//! Any line that does not start with `/` is a prompt.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::{ConfigError, Mode};
use crate::conversation::StoreSnapshot;
use crate::conversation::message::{Content, Message, RenderHint, Role};
use crate::error::ErrorCode;

pub const HELP: &str = "\
commands:
  /base <url>      set the provider base URL
  /key <key>       set and persist the API key
  /mode chat|image switch mode
  /models [query]  list models, optionally filtered
  /use <model>     select a model
  /attach <file>   queue an image for the next chat message
  /detach <n>      drop queued image n
  /retry <n>       drop entries from n on and resend the message before n
  /history         show the conversation
  /refresh         reload the model list now
  /clear           clear the conversation
  /quit            exit
anything else is sent as a prompt";

#[derive(Debug, thiserror::Error)]
pub enum ReplError {
    #[error("unknown command: /{0} (try /help)")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("unsupported image type: {0}")]
    UnsupportedImage(String),
}

impl ErrorCode for ReplError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => "E_UNKNOWN_COMMAND",
            Self::Usage(_) => "E_USAGE",
            Self::Config(e) => e.error_code(),
            Self::Read { .. } => "E_READ",
            Self::UnsupportedImage(_) => "E_UNSUPPORTED_IMAGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Prompt(String),
    Base(String),
    Key(String),
    Mode(Mode),
    Models(String),
    Use(String),
    Attach(PathBuf),
    Detach(usize),
    Retry(usize),
    History,
    Refresh,
    Clear,
    Help,
    Quit,
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse one input line.
///
/// # Errors
///
/// Returns [`ReplError`] for unknown commands or missing/invalid arguments.
pub fn parse_line(line: &str) -> Result<Command, ReplError> {
    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Ok(Command::Prompt(line.to_string()));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest.trim(), ""),
    };

    match name {
        "base" => required(arg, "/base <url>").map(Command::Base),
        "key" => Ok(Command::Key(arg.to_string())),
        "mode" => Ok(Command::Mode(required(arg, "/mode chat|image")?.parse()?)),
        "models" => Ok(Command::Models(arg.to_string())),
        "use" => required(arg, "/use <model>").map(Command::Use),
        "attach" => required(arg, "/attach <file>").map(|p| Command::Attach(PathBuf::from(p))),
        "detach" => index(arg, "/detach <n>").map(Command::Detach),
        "retry" => index(arg, "/retry <n>").map(Command::Retry),
        "history" => Ok(Command::History),
        "refresh" => Ok(Command::Refresh),
        "clear" => Ok(Command::Clear),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(ReplError::UnknownCommand(other.to_string())),
    }
}

fn required(arg: &str, usage: &'static str) -> Result<String, ReplError> {
    if arg.is_empty() {
        return Err(ReplError::Usage(usage));
    }
    Ok(arg.to_string())
}

fn index(arg: &str, usage: &'static str) -> Result<usize, ReplError> {
    arg.parse().map_err(|_| ReplError::Usage(usage))
}

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// Mime type for an image path, by extension.
#[must_use]
pub fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[must_use]
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Read an image file into a `data:` URI.
///
/// # Errors
///
/// Returns [`ReplError::UnsupportedImage`] for unknown extensions and
/// [`ReplError::Read`] when the file cannot be read.
pub async fn load_attachment(path: &Path) -> Result<String, ReplError> {
    let Some(mime) = image_mime(path) else {
        return Err(ReplError::UnsupportedImage(path.display().to_string()));
    };
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ReplError::Read { path: path.to_path_buf(), source })?;
    Ok(data_uri(mime, &bytes))
}

// =============================================================================
// RENDERING
// =============================================================================

/// One history entry as `[index] who: text`.
#[must_use]
pub fn render_message(index: usize, message: &Message) -> String {
    let who = match (message.role, message.render_hint) {
        (Role::User, _) => "you",
        (Role::Assistant, RenderHint::Image) => "image",
        (Role::Assistant, _) => "assistant",
        (Role::Error, _) => "error",
    };
    let mut text = message.content.text();
    if let Content::Parts(_) = &message.content {
        let images = message.content.image_refs().len();
        text.push_str(&format!(" [+{images} image{}]", if images == 1 { "" } else { "s" }));
    }
    let mut line = format!("[{index}] {who}: {text}");
    if message.role == Role::Error {
        line.push_str(&format!("  (/retry {index})"));
    }
    line
}

/// Model list with the selection marked.
#[must_use]
pub fn render_models(snapshot: &StoreSnapshot) -> String {
    if snapshot.filtered_models.is_empty() {
        return "no models".to_string();
    }
    snapshot
        .filtered_models
        .iter()
        .map(|m| {
            let marker = if snapshot.selected_model_id.as_deref() == Some(m.id.as_str()) { '*' } else { ' ' };
            let free = if m.is_free { " free" } else { "" };
            format!("{marker} {} ({}{free})", m.id, m.kind)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn render_status(snapshot: &StoreSnapshot) -> String {
    let mut line = format!(
        "mode={} model={} base={} attachments={}",
        snapshot.mode,
        snapshot.selected_model_id.as_deref().unwrap_or("-"),
        snapshot.base_url,
        snapshot.attachments.len(),
    );
    if let Some(error) = &snapshot.error {
        line.push_str(&format!("\n! {error}"));
    }
    line
}

#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;
