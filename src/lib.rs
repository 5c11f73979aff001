//! Terminal client for OpenAI-compatible chat and image-generation providers.
//!
//! The [`ConversationStore`] owns configuration, the model catalog, and the
//! message history; the rendering layer ([`repl`] in the shipped binary)
//! only reads snapshots and forwards operator actions.

pub mod catalog;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod repl;
pub mod transport;

pub use catalog::{CatalogError, Model, ModelCatalog};
pub use config::{ClientConfig, ConfigError, Mode};
pub use conversation::{ConfigChange, ConversationStore, ExchangeOutcome, StoreSnapshot, ValidationError};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use dispatch::{DispatchError, RequestDispatcher};
pub use error::ErrorCode;
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
