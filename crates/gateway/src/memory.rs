//! In-memory gateway, used as the backend stand-in by tests and demos.

use crate::{
    is_pdf_filename, GatewayError, PersistenceGateway, SessionSnapshot, StoredDocument,
};
use std::collections::BTreeMap;

const URL_PREFIX: &str = "/static/uploads/";

/// Gateway double holding everything in memory, with per-capability
/// failure switches so error paths can be exercised deterministically.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    documents: BTreeMap<String, (StoredDocument, Vec<u8>)>,
    references: Vec<String>,
    snapshot: Option<SessionSnapshot>,
    pub fail_uploads: bool,
    pub fail_deletes: bool,
    pub fail_references: bool,
    pub fail_histories: bool,
    save_count: u64,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshot writes that landed; persistence-ordering tests
    /// key off this.
    pub fn save_count(&self) -> u64 {
        self.save_count
    }

    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.snapshot.as_ref()
    }

    /// Seeds a pre-existing snapshot, as if a prior session saved it.
    pub fn seed_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.snapshot = Some(snapshot);
    }

    fn rejected(capability: &str) -> GatewayError {
        GatewayError::Rejected(format!("{capability} unavailable"))
    }
}

impl PersistenceGateway for MemoryGateway {
    fn upload_document(
        &mut self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<StoredDocument, GatewayError> {
        if self.fail_uploads {
            return Err(Self::rejected("upload"));
        }
        if !is_pdf_filename(filename) {
            return Err(GatewayError::UnsupportedFileType(filename.to_owned()));
        }

        let stored = StoredDocument {
            name: filename.to_owned(),
            url: format!("{URL_PREFIX}{filename}"),
            size: bytes.len() as u64,
        };
        self.documents.insert(stored.url.clone(), (stored.clone(), bytes.to_vec()));

        Ok(stored)
    }

    fn list_documents(&self) -> Result<Vec<StoredDocument>, GatewayError> {
        Ok(self.documents.values().map(|(stored, _)| stored.clone()).collect())
    }

    fn fetch_document(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        self.documents
            .get(url)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| GatewayError::NotFound(url.to_owned()))
    }

    fn delete_document(&mut self, url: &str) -> Result<(), GatewayError> {
        if self.fail_deletes {
            return Err(Self::rejected("delete"));
        }

        self.documents.remove(url);
        self.references.retain(|existing| existing != url);
        Ok(())
    }

    fn set_reference(&mut self, url: &str, referenced: bool) -> Result<(), GatewayError> {
        if self.fail_references {
            return Err(Self::rejected("reference update"));
        }

        if referenced {
            if !self.references.iter().any(|existing| existing == url) {
                self.references.push(url.to_owned());
            }
        } else {
            self.references.retain(|existing| existing != url);
        }
        Ok(())
    }

    fn list_references(&self) -> Result<Vec<String>, GatewayError> {
        Ok(self.references.clone())
    }

    fn save_histories(&mut self, snapshot: &SessionSnapshot) -> Result<(), GatewayError> {
        if self.fail_histories {
            return Err(Self::rejected("history save"));
        }

        self.snapshot = Some(snapshot.clone());
        self.save_count += 1;
        Ok(())
    }

    fn load_histories(&self) -> Result<Option<SessionSnapshot>, GatewayError> {
        if self.fail_histories {
            return Err(Self::rejected("history load"));
        }

        Ok(self.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_lists_documents() {
        let mut gateway = MemoryGateway::new();
        let stored = gateway.upload_document(b"pdf", "a.pdf").expect("upload");

        assert_eq!(gateway.list_documents().expect("list"), vec![stored.clone()]);
        assert_eq!(gateway.fetch_document(&stored.url).expect("fetch"), b"pdf");
    }

    #[test]
    fn failure_switches_reject_requests() {
        let mut gateway = MemoryGateway::new();
        gateway.fail_references = true;

        let err = gateway.set_reference("/static/uploads/a.pdf", true).expect_err("reject");
        assert!(matches!(err, GatewayError::Rejected(_)));
    }

    #[test]
    fn counts_snapshot_writes() {
        let mut gateway = MemoryGateway::new();
        assert_eq!(gateway.save_count(), 0);

        gateway.save_histories(&SessionSnapshot::default()).expect("save");
        gateway.save_histories(&SessionSnapshot::default()).expect("save");
        assert_eq!(gateway.save_count(), 2);
    }
}
