//! Conversation store — history, pending attachments, and the submit/retry
//! state machine.
//!
//! DESIGN
//! ======
//! The store is the only thing the rendering layer talks to for
//! conversational actions. It owns the message history exclusively, holds
//! the configuration, and drives the catalog and dispatcher.
//!
//! An exchange moves `Idle -> Sending -> Idle`. A failed dispatch appends a
//! trailing `Role::Error` entry instead of raising, which gives the renderer
//! a retry target. Retry is the only operation that truncates history.
//!
//! CONCURRENCY
//! ===========
//! `submit` and `retry` take `&mut self`, so overlapping exchanges on one
//! store cannot be expressed. Callers that split an exchange with
//! `prepare_*`/`finish` must not interleave two of them; `prepare_*`
//! rejects with [`ValidationError::ExchangeInFlight`] while one is open.
//! There is no mid-flight cancellation.

pub mod message;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, Model, ModelCatalog};
use crate::config::{ClientConfig, Mode, normalize_base_url};
use crate::credentials::CredentialStore;
use crate::dispatch::{DispatchError, DispatchOutcome, DispatchRequest, RequestDispatcher};
use crate::error::ErrorCode;
use crate::transport::HttpTransport;
use message::{Content, Exchange, Message, Role};

// =============================================================================
// TYPES
// =============================================================================

/// Precondition failures. These prevent an action; they never add history.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("no model selected")]
    NoModelSelected,
    #[error("no models available for the current mode")]
    EmptyCatalog,
    #[error("message {0} cannot be retried")]
    InvalidRetryIndex(usize),
    #[error("an exchange is already in flight")]
    ExchangeInFlight,
    #[error("no exchange is in flight")]
    NoExchangeInFlight,
    #[error("attachment is not a data URI")]
    NotADataUri,
    #[error("no attachment at position {0}")]
    NoSuchAttachment(usize),
    #[error("model '{0}' is not available for the current mode")]
    UnknownModel(String),
}

impl ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "E_EMPTY_PROMPT",
            Self::NoModelSelected => "E_NO_MODEL_SELECTED",
            Self::EmptyCatalog => "E_EMPTY_CATALOG",
            Self::InvalidRetryIndex(_) => "E_INVALID_RETRY_INDEX",
            Self::ExchangeInFlight => "E_EXCHANGE_IN_FLIGHT",
            Self::NoExchangeInFlight => "E_NO_EXCHANGE_IN_FLIGHT",
            Self::NotADataUri => "E_NOT_A_DATA_URI",
            Self::NoSuchAttachment(_) => "E_NO_SUCH_ATTACHMENT",
            Self::UnknownModel(_) => "E_UNKNOWN_MODEL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Sending,
}

/// Operator-facing configuration. `api_key` is persisted; the rest is per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub base_url: String,
    pub api_key: String,
    pub mode: Mode,
    /// Always a model of `mode` in the current catalog, or `None`.
    pub selected_model_id: Option<String>,
}

/// One configuration edit from the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    BaseUrl(String),
    ApiKey(String),
    Mode(Mode),
    Model(String),
}

/// An exchange opened by `prepare_submit`/`prepare_retry`, closed by `finish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExchange {
    pub mode: Mode,
    pub model: Model,
    pub base_url: String,
    pub api_key: String,
    /// History before the outgoing user message.
    pub history: Vec<Message>,
    pub prompt: String,
    pub attachments: Vec<String>,
}

impl PendingExchange {
    #[must_use]
    pub fn request(&self) -> DispatchRequest<'_> {
        DispatchRequest {
            mode: self.mode,
            model: &self.model,
            api_key: &self.api_key,
            base_url: &self.base_url,
            history: &self.history,
            prompt: &self.prompt,
            attachments: &self.attachments,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    Replied,
    /// The error entry has already been appended to history.
    Failed(DispatchError),
}

/// Owned read-only view for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub models: Vec<Model>,
    pub filtered_models: Vec<Model>,
    pub messages: Vec<Message>,
    pub attachments: Vec<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub mode: Mode,
    pub base_url: String,
    pub selected_model_id: Option<String>,
}

// =============================================================================
// STORE
// =============================================================================

pub struct ConversationStore {
    config: Configuration,
    catalog: ModelCatalog,
    dispatcher: RequestDispatcher,
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialStore>,
    messages: Vec<Message>,
    attachments: Vec<String>,
    phase: Phase,
    banner: Option<String>,
    search_query: String,
}

impl ConversationStore {
    /// Build a store. The credential is read from `credentials` exactly once, here.
    #[must_use]
    pub fn new(config: &ClientConfig, transport: Arc<dyn HttpTransport>, credentials: Arc<dyn CredentialStore>) -> Self {
        let api_key = credentials.load().unwrap_or_default();
        Self {
            config: Configuration {
                base_url: normalize_base_url(&config.base_url),
                api_key,
                mode: config.mode,
                selected_model_id: None,
            },
            catalog: ModelCatalog::new(Duration::from_millis(config.refresh_debounce_ms)),
            dispatcher: RequestDispatcher::new(transport.clone()),
            transport,
            credentials,
            messages: Vec::new(),
            attachments: Vec::new(),
            phase: Phase::Idle,
            banner: None,
            search_query: String::new(),
        }
    }

    /// Schedule the initial catalog refresh. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        self.schedule_refresh();
    }

    // -------------------------------------------------------------------------
    // read access
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn attachments(&self) -> &[String] {
        &self.attachments
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.phase == Phase::Sending
    }

    /// The catalog banner, set when the last refresh failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    #[must_use]
    pub fn selected_model(&self) -> Option<&Model> {
        self.config
            .selected_model_id
            .as_deref()
            .and_then(|id| self.catalog.get(id))
    }

    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            models: self.catalog.models().to_vec(),
            filtered_models: self
                .catalog
                .search(&self.search_query)
                .into_iter()
                .cloned()
                .collect(),
            messages: self.messages.clone(),
            attachments: self.attachments.clone(),
            loading: self.loading(),
            error: self.banner.clone(),
            mode: self.config.mode,
            base_url: self.config.base_url.clone(),
            selected_model_id: self.config.selected_model_id.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // configuration
    // -------------------------------------------------------------------------

    /// Apply one configuration change.
    ///
    /// Base URL, key, and mode changes restart the debounced catalog refresh;
    /// key changes are also persisted. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownModel`] when selecting a model that is
    /// not in the catalog for the current mode.
    pub fn set_configuration(&mut self, change: ConfigChange) -> Result<(), ValidationError> {
        match change {
            ConfigChange::BaseUrl(raw) => {
                let base_url = normalize_base_url(&raw);
                if base_url != self.config.base_url {
                    info!(%base_url, "config: base URL changed");
                    self.config.base_url = base_url;
                    self.schedule_refresh();
                }
            }
            ConfigChange::ApiKey(raw) => {
                let api_key = raw.trim().to_string();
                if let Err(e) = self.credentials.save(&api_key) {
                    warn!(error = %e, code = e.error_code(), "config: credential not persisted");
                }
                if api_key != self.config.api_key {
                    info!(present = !api_key.is_empty(), "config: API key changed");
                    self.config.api_key = api_key;
                    self.schedule_refresh();
                }
            }
            ConfigChange::Mode(mode) => {
                if mode != self.config.mode {
                    info!(%mode, "config: mode changed");
                    self.config.mode = mode;
                    self.reconcile_selection();
                    self.schedule_refresh();
                }
            }
            ConfigChange::Model(id) => {
                let Some(model) = self
                    .catalog
                    .models_for(self.config.mode)
                    .find(|m| m.id == id)
                else {
                    return Err(ValidationError::UnknownModel(id));
                };
                debug!(model = %model.id, "config: model selected");
                self.config.selected_model_id = Some(model.id.clone());
            }
        }
        Ok(())
    }

    /// Set the catalog search query and return the matching models.
    pub fn search_models(&mut self, query: &str) -> Vec<Model> {
        self.search_query = query.to_string();
        self.catalog
            .search(query)
            .into_iter()
            .cloned()
            .collect()
    }

    // -------------------------------------------------------------------------
    // catalog
    // -------------------------------------------------------------------------

    /// Wait for the pending debounced refresh and apply it. Pends forever
    /// when none is scheduled.
    pub async fn next_catalog_update(&mut self) {
        let result = self.catalog.next_scheduled_refresh().await;
        self.on_catalog_result(result);
    }

    /// Apply a debounced refresh if one has completed. Returns whether anything changed.
    pub fn poll_catalog_update(&mut self) -> bool {
        match self.catalog.try_scheduled_refresh() {
            Some(result) => {
                self.on_catalog_result(result);
                true
            }
            None => false,
        }
    }

    /// Refresh immediately, superseding any scheduled refresh.
    ///
    /// # Errors
    ///
    /// Returns the [`CatalogError`]; the catalog is then empty and the banner set.
    pub async fn refresh_catalog_now(&mut self) -> Result<(), CatalogError> {
        let result = self
            .catalog
            .refresh(self.transport.as_ref(), &self.config.base_url, &self.config.api_key)
            .await
            .map(|_| ());
        self.on_catalog_result(result.clone());
        result
    }

    fn schedule_refresh(&mut self) {
        self.catalog
            .schedule_refresh(self.transport.clone(), self.config.base_url.clone(), self.config.api_key.clone());
    }

    fn on_catalog_result(&mut self, result: Result<(), CatalogError>) {
        self.banner = result.err().map(|e| e.to_string());
        self.reconcile_selection();
    }

    /// Keep the selection inside the catalog filtered by mode.
    fn reconcile_selection(&mut self) {
        let mode = self.config.mode;
        let still_valid = self
            .config
            .selected_model_id
            .as_deref()
            .and_then(|id| self.catalog.get(id))
            .is_some_and(|m| m.kind == mode);
        if still_valid {
            return;
        }
        let next = self
            .catalog
            .default_model_for(mode)
            .filter(|m| m.kind == mode)
            .map(|m| m.id.clone());
        if next != self.config.selected_model_id {
            debug!(?next, %mode, "catalog: selection reconciled");
        }
        self.config.selected_model_id = next;
    }

    // -------------------------------------------------------------------------
    // attachments
    // -------------------------------------------------------------------------

    /// Queue an image for the next chat message.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotADataUri`] unless `data_uri` starts with `data:`.
    pub fn attach_image(&mut self, data_uri: String) -> Result<(), ValidationError> {
        if !data_uri.starts_with("data:") {
            return Err(ValidationError::NotADataUri);
        }
        self.attachments.push(data_uri);
        Ok(())
    }

    /// Remove and return the attachment at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoSuchAttachment`] when `index` is out of range.
    pub fn remove_attachment(&mut self, index: usize) -> Result<String, ValidationError> {
        if index >= self.attachments.len() {
            return Err(ValidationError::NoSuchAttachment(index));
        }
        Ok(self.attachments.remove(index))
    }

    // -------------------------------------------------------------------------
    // exchanges
    // -------------------------------------------------------------------------

    /// Append a user message for `prompt` and dispatch it.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the exchange was not attempted.
    /// Dispatch failures are not errors here: they become an error entry and
    /// [`ExchangeOutcome::Failed`].
    pub async fn submit(&mut self, prompt: &str) -> Result<ExchangeOutcome, ValidationError> {
        let pending = self.prepare_submit(prompt).inspect_err(|e| {
            debug!(reason = %e, "submit: ignored");
        })?;
        let result = self.dispatcher.send(&pending.request()).await;
        self.finish(result)
    }

    /// Drop history from `index` on and resend the user message just before it.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] (history untouched) when `index` is not
    /// preceded by a user message.
    pub async fn retry(&mut self, index: usize) -> Result<ExchangeOutcome, ValidationError> {
        let pending = self.prepare_retry(index).inspect_err(|e| {
            debug!(reason = %e, "retry: ignored");
        })?;
        let result = self.dispatcher.send(&pending.request()).await;
        self.finish(result)
    }

    /// Validate, append the user message, and enter `Sending`.
    ///
    /// # Errors
    ///
    /// See [`ConversationStore::submit`].
    pub fn prepare_submit(&mut self, prompt: &str) -> Result<PendingExchange, ValidationError> {
        if self.phase == Phase::Sending {
            return Err(ValidationError::ExchangeInFlight);
        }
        if prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        let mode = self.config.mode;
        if self.catalog.models_for(mode).next().is_none() {
            return Err(ValidationError::EmptyCatalog);
        }
        let model = self
            .selected_model()
            .cloned()
            .ok_or(ValidationError::NoModelSelected)?;

        // Image generation is single-turn and never carries attachments.
        let attachments = match mode {
            Mode::Chat => self.attachments.clone(),
            Mode::Image => Vec::new(),
        };
        let history = self.messages.clone();
        let content = Content::compose(prompt, &attachments);
        self.messages
            .push(Message::user(content, Exchange { mode, model: model.clone() }));
        self.phase = Phase::Sending;

        Ok(PendingExchange {
            mode,
            model,
            base_url: self.config.base_url.clone(),
            api_key: self.config.api_key.clone(),
            history,
            prompt: prompt.to_string(),
            attachments,
        })
    }

    /// Validate `index`, truncate history, and enter `Sending` with the
    /// original user message's mode, model, prompt, and attachments.
    ///
    /// # Errors
    ///
    /// See [`ConversationStore::retry`].
    pub fn prepare_retry(&mut self, index: usize) -> Result<PendingExchange, ValidationError> {
        if self.phase == Phase::Sending {
            return Err(ValidationError::ExchangeInFlight);
        }
        if index == 0 || index >= self.messages.len() {
            return Err(ValidationError::InvalidRetryIndex(index));
        }
        let original = &self.messages[index - 1];
        if original.role != Role::User {
            return Err(ValidationError::InvalidRetryIndex(index));
        }
        let Some(exchange) = original.exchange.clone() else {
            return Err(ValidationError::InvalidRetryIndex(index));
        };
        let prompt = original.content.text();
        let attachments = original.content.image_refs();

        info!(index, dropped = self.messages.len() - index, model = %exchange.model.id, "retry: resubmitting");
        self.messages.truncate(index);
        self.phase = Phase::Sending;

        Ok(PendingExchange {
            mode: exchange.mode,
            model: exchange.model,
            base_url: self.config.base_url.clone(),
            api_key: self.config.api_key.clone(),
            history: self.messages[..index - 1].to_vec(),
            prompt,
            attachments,
        })
    }

    /// Close the open exchange with its dispatch result and return to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoExchangeInFlight`] (history untouched)
    /// when no exchange is open.
    pub fn finish(&mut self, result: Result<DispatchOutcome, DispatchError>) -> Result<ExchangeOutcome, ValidationError> {
        if self.phase != Phase::Sending {
            return Err(ValidationError::NoExchangeInFlight);
        }
        self.phase = Phase::Idle;
        match result {
            Ok(outcome) => {
                if outcome.clear_attachments {
                    self.attachments.clear();
                }
                self.messages.push(outcome.message);
                Ok(ExchangeOutcome::Replied)
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), retryable = e.retryable(), "exchange failed");
                self.messages.push(Message::error(&e));
                Ok(ExchangeOutcome::Failed(e))
            }
        }
    }

    /// Empty the conversation and pending attachments.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ExchangeInFlight`] while `Sending`.
    pub fn clear_history(&mut self) -> Result<(), ValidationError> {
        if self.phase == Phase::Sending {
            return Err(ValidationError::ExchangeInFlight);
        }
        self.messages.clear();
        self.attachments.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
