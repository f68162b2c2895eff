//! Document library: the set of uploaded documents and the single
//! active-document selection.

use serde::{Deserialize, Serialize};

/// Server-issued document identity (the upload url).
pub type DocumentId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub size_bytes: u64,
    pub referenced: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("unknown document: {0}")]
    NotFound(DocumentId),
}

/// Insertion-ordered document set with at most one active entry.
///
/// Once the library is non-empty exactly one document is active; the
/// active id is tracked here, not as a flag on the documents.
#[derive(Debug, Default)]
pub struct DocumentLibrary {
    documents: Vec<Document>,
    active: Option<DocumentId>,
}

impl DocumentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a document; the first insertion becomes active.
    pub fn add(&mut self, document: Document) {
        if self.active.is_none() {
            self.active = Some(document.id.clone());
        }
        self.documents.push(document);
    }

    /// Removes a document. Unknown ids are a no-op (`None`). Returns
    /// whether the removed document was active; on active removal the
    /// first remaining entry in library order becomes active.
    pub fn remove(&mut self, id: &str) -> Option<bool> {
        let index = self.documents.iter().position(|document| document.id == id)?;
        self.documents.remove(index);

        let was_active = self.active.as_deref() == Some(id);
        if was_active {
            self.active = self.documents.first().map(|document| document.id.clone());
        }

        Some(was_active)
    }

    pub fn select(&mut self, id: &str) -> Result<(), LibraryError> {
        if !self.documents.iter().any(|document| document.id == id) {
            return Err(LibraryError::NotFound(id.to_owned()));
        }

        self.active = Some(id.to_owned());
        Ok(())
    }

    /// Sets the reference flag and returns its prior value, so a failed
    /// persistence attempt can roll the flag back with one more call.
    pub fn set_referenced(&mut self, id: &str, referenced: bool) -> Result<bool, LibraryError> {
        let document = self
            .documents
            .iter_mut()
            .find(|document| document.id == id)
            .ok_or_else(|| LibraryError::NotFound(id.to_owned()))?;

        let prior = document.referenced;
        document.referenced = referenced;
        Ok(prior)
    }

    /// Documents in insertion order.
    pub fn list(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|document| document.id == id)
    }

    pub fn active_id(&self) -> Option<&DocumentId> {
        self.active.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}
