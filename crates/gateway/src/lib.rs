//! PaperChat Persistence Gateway
//!
//! Abstracts the backend capabilities the workspace depends on: document
//! storage, reference-flag persistence, conversation-history snapshots,
//! and the assistant request/response capability. Only the contracts live
//! here; the coordinator never sees transport details.

mod assistant;
mod fs;
mod memory;

pub use assistant::{AssistantClient, AssistantError, OllamaClient, ScriptedAssistant};
pub use fs::FsGateway;
pub use memory::MemoryGateway;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A document as the backend lists it: name, server-issued url, byte size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub name: String,
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub name: String,
    pub messages: Vec<PersistedMessage>,
}

/// Full conversation-history snapshot, keyed by session id. The wire
/// layout matches the backend's `chat_histories.json` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub histories: BTreeMap<String, PersistedSession>,
    #[serde(rename = "currentChatId")]
    pub active_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

pub trait PersistenceGateway {
    /// Stores a document and returns its server-issued record.
    fn upload_document(
        &mut self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<StoredDocument, GatewayError>;

    fn list_documents(&self) -> Result<Vec<StoredDocument>, GatewayError>;

    /// Retrieves the stored bytes for a previously uploaded document.
    fn fetch_document(&self, url: &str) -> Result<Vec<u8>, GatewayError>;

    /// Removes a stored document. Deleting an unknown url is an ack, not
    /// an error, matching the backend's delete route.
    fn delete_document(&mut self, url: &str) -> Result<(), GatewayError>;

    fn set_reference(&mut self, url: &str, referenced: bool) -> Result<(), GatewayError>;

    fn list_references(&self) -> Result<Vec<String>, GatewayError>;

    fn save_histories(&mut self, snapshot: &SessionSnapshot) -> Result<(), GatewayError>;

    /// Returns the persisted snapshot, or `None` when nothing has been
    /// saved yet.
    fn load_histories(&self) -> Result<Option<SessionSnapshot>, GatewayError>;
}

pub(crate) fn is_pdf_filename(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(stem, extension)| !stem.is_empty() && extension.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
