//! Credential persistence — a single API key that survives restarts.
//!
//! DESIGN
//! ======
//! The key is read once when the conversation store is built and written on
//! every credential change. Callers get the adapter injected, so nothing in
//! the core touches the filesystem directly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no config directory available for credential storage")]
    NoConfigDir,
}

impl ErrorCode for CredentialError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_CREDENTIAL_IO",
            Self::Serialize(_) => "E_CREDENTIAL_SERIALIZE",
            Self::NoConfigDir => "E_NO_CONFIG_DIR",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Read-at-init, write-on-change storage for the API key.
pub trait CredentialStore: Send + Sync {
    /// The persisted key, or `None` if nothing has been stored yet.
    fn load(&self) -> Option<String>;

    /// Persist `api_key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] if the backing storage cannot be written.
    fn save(&self, api_key: &str) -> Result<(), CredentialError>;
}

// =============================================================================
// FILE STORE
// =============================================================================

#[derive(Serialize, Deserialize)]
struct CredentialFile {
    api_key: String,
}

/// JSON file holding `{ "api_key": "..." }`.
pub struct FileCredentialStore {
    path: Option<PathBuf>,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<CredentialFile>(&raw) {
            Ok(file) => Some(file.api_key),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable credential file");
                None
            }
        }
    }

    fn save(&self, api_key: &str) -> Result<(), CredentialError> {
        let path = self.path.as_ref().ok_or(CredentialError::NoConfigDir)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&CredentialFile { api_key: api_key.to_string() })?;
        fs::write(path, raw)?;
        Ok(())
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store for `--no-persist` runs and tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    key: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn with_key(api_key: &str) -> Self {
        Self { key: Mutex::new(Some(api_key.to_string())) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<String> {
        self.key
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn save(&self, api_key: &str) -> Result<(), CredentialError> {
        *self
            .key
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(api_key.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
