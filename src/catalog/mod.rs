//! Model catalog — provider model listing, classification, and lookup.
//!
//! DESIGN
//! ======
//! The catalog is replaced wholesale on every successful fetch and emptied
//! on every failed one; there is no incremental merge. Refresh order is
//! preserved everywhere so search results and default selection are stable.
//!
//! Debounced refreshes run through [`schedule::RefreshScheduler`]; only the
//! newest scheduled fetch is ever applied.

pub mod classify;
pub mod schedule;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Mode;
use crate::error::ErrorCode;
use crate::transport::{HttpTransport, TransportError};
use classify::{RawModel, classify};
use schedule::RefreshScheduler;

// =============================================================================
// TYPES
// =============================================================================

/// A provider model. Immutable once classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub kind: Mode,
    pub is_free: bool,
    pub endpoint_path: String,
}

/// Catalog acquisition failure. Always degrades the catalog to empty.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("model listing failed: {0}")]
    Transport(#[from] TransportError),

    #[error("model listing returned status {status}")]
    Status { status: u16, body: String },

    #[error("model listing parse failed: {0}")]
    Parse(String),

    #[error("model listing has no `data` array")]
    MissingData,
}

impl ErrorCode for CatalogError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_CATALOG_TRANSPORT",
            Self::Status { .. } => "E_CATALOG_STATUS",
            Self::Parse(_) => "E_CATALOG_PARSE",
            Self::MissingData => "E_CATALOG_MISSING_DATA",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.retryable(),
            Self::Status { status, .. } => matches!(status, 429 | 500..=599),
            Self::Parse(_) | Self::MissingData => false,
        }
    }
}

// =============================================================================
// FETCH
// =============================================================================

/// `GET {base_url}/models` and classify every record.
///
/// # Errors
///
/// Returns a [`CatalogError`] when the call fails, the status is not 2xx,
/// or the body has no `data` array.
pub async fn fetch_models(
    transport: &dyn HttpTransport,
    base_url: &str,
    api_key: &str,
) -> Result<Vec<Model>, CatalogError> {
    let url = format!("{}/models", base_url.trim_end_matches('/'));
    info!(%url, "catalog: fetching models");
    let reply = transport.get(&url, api_key).await?;
    if !reply.is_success() {
        return Err(CatalogError::Status { status: reply.status, body: reply.body });
    }
    parse_model_list(&reply.body)
}

/// Parse a `{ "data": [...] }` listing body. Records without an `id` are skipped.
///
/// # Errors
///
/// Returns [`CatalogError::Parse`] for invalid JSON and
/// [`CatalogError::MissingData`] when `data` is absent or not an array.
pub fn parse_model_list(body: &str) -> Result<Vec<Model>, CatalogError> {
    let root: Value = serde_json::from_str(body).map_err(|e| CatalogError::Parse(e.to_string()))?;
    let Some(records) = root.get("data").and_then(Value::as_array) else {
        return Err(CatalogError::MissingData);
    };

    let mut models = Vec::with_capacity(records.len());
    for record in records {
        match RawModel::from_value(record) {
            Some(raw) => models.push(classify(&raw)),
            None => warn!(%record, "catalog: skipping record without id"),
        }
    }
    Ok(models)
}

// =============================================================================
// CATALOG
// =============================================================================

pub struct ModelCatalog {
    models: Vec<Model>,
    scheduler: RefreshScheduler,
}

impl ModelCatalog {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self { models: Vec::new(), scheduler: RefreshScheduler::new(debounce) }
    }

    /// All models in refresh order.
    #[must_use]
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Models whose kind matches `mode`, in refresh order.
    pub fn models_for(&self, mode: Mode) -> impl Iterator<Item = &Model> {
        self.models.iter().filter(move |m| m.kind == mode)
    }

    /// Case-insensitive substring match against id or kind. Only the empty
    /// query returns the whole catalog; whitespace is matched literally.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Model> {
        let query = query.to_lowercase();
        if query.is_empty() {
            return self.models.iter().collect();
        }
        self.models
            .iter()
            .filter(|m| m.id.to_lowercase().contains(&query) || m.kind.as_str().contains(&query))
            .collect()
    }

    /// First model of `mode`, else the first model of any kind.
    #[must_use]
    pub fn default_model_for(&self, mode: Mode) -> Option<&Model> {
        self.models_for(mode)
            .next()
            .or_else(|| self.models.first())
    }

    pub fn replace(&mut self, models: Vec<Model>) {
        self.models = models;
    }

    pub fn clear(&mut self) {
        self.models.clear();
    }

    /// Fetch immediately, cancelling any scheduled refresh.
    ///
    /// # Errors
    ///
    /// Returns the [`CatalogError`] after emptying the catalog.
    pub async fn refresh(
        &mut self,
        transport: &dyn HttpTransport,
        base_url: &str,
        api_key: &str,
    ) -> Result<&[Model], CatalogError> {
        self.scheduler.cancel();
        let result = fetch_models(transport, base_url, api_key).await;
        self.apply(result)?;
        Ok(&self.models)
    }

    /// Restart the debounce timer for a refresh against `base_url`.
    pub fn schedule_refresh(&mut self, transport: Arc<dyn HttpTransport>, base_url: String, api_key: String) {
        self.scheduler.schedule(transport, base_url, api_key);
    }

    pub fn cancel_scheduled_refresh(&mut self) {
        self.scheduler.cancel();
    }

    #[must_use]
    pub fn refresh_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Wait for the newest scheduled refresh and apply it.
    ///
    /// Never resolves while nothing is scheduled, so it can sit in a
    /// `select!` next to input handling.
    ///
    /// # Errors
    ///
    /// Returns the fetch error after emptying the catalog.
    pub async fn next_scheduled_refresh(&mut self) -> Result<(), CatalogError> {
        let outcome = self.scheduler.next().await;
        self.apply(outcome.result)
    }

    /// Apply a scheduled refresh if one has already completed.
    pub fn try_scheduled_refresh(&mut self) -> Option<Result<(), CatalogError>> {
        let outcome = self.scheduler.try_next()?;
        Some(self.apply(outcome.result))
    }

    fn apply(&mut self, result: Result<Vec<Model>, CatalogError>) -> Result<(), CatalogError> {
        match result {
            Ok(models) => {
                info!(count = models.len(), "catalog: refreshed");
                self.replace(models);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "catalog: refresh failed, clearing models");
                self.clear();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
