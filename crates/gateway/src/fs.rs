//! Filesystem-backed gateway.
//!
//! Mirrors the backend's storage layout: uploads under `uploads/`,
//! reference flags in `reference_files.json`, and the history snapshot at
//! `histories/chat_histories.json`, all below one root directory.

use crate::{
    is_pdf_filename, GatewayError, PersistenceGateway, SessionSnapshot, StoredDocument,
};
use std::fs;
use std::path::{Path, PathBuf};

const UPLOADS_DIR: &str = "uploads";
const HISTORIES_DIR: &str = "histories";
const HISTORIES_FILE: &str = "chat_histories.json";
const REFERENCES_FILE: &str = "reference_files.json";
const URL_PREFIX: &str = "/static/uploads/";

#[derive(Debug, Clone)]
pub struct FsGateway {
    root: PathBuf,
}

impl FsGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    fn histories_path(&self) -> PathBuf {
        self.root.join(HISTORIES_DIR).join(HISTORIES_FILE)
    }

    fn references_path(&self) -> PathBuf {
        self.root.join(REFERENCES_FILE)
    }

    // Urls carry the backend's `/static/uploads/<name>` shape; only the
    // basename maps to a file under the root.
    fn upload_path(&self, url: &str) -> Result<PathBuf, GatewayError> {
        let name = url.rsplit('/').next().unwrap_or(url);
        let name = sanitize_filename(name);
        if name.is_empty() {
            return Err(GatewayError::NotFound(url.to_owned()));
        }
        Ok(self.uploads_dir().join(name))
    }

    fn load_references(&self) -> Result<Vec<String>, GatewayError> {
        let path = self.references_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save_references(&self, references: &[String]) -> Result<(), GatewayError> {
        fs::create_dir_all(&self.root)?;
        let bytes = serde_json::to_vec_pretty(references)?;
        fs::write(self.references_path(), bytes)?;
        Ok(())
    }
}

impl PersistenceGateway for FsGateway {
    fn upload_document(
        &mut self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<StoredDocument, GatewayError> {
        if !is_pdf_filename(filename) {
            return Err(GatewayError::UnsupportedFileType(filename.to_owned()));
        }

        let name = sanitize_filename(filename);
        if name.is_empty() {
            return Err(GatewayError::UnsupportedFileType(filename.to_owned()));
        }

        let dir = self.uploads_dir();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(&name), bytes)?;

        Ok(StoredDocument {
            url: format!("{URL_PREFIX}{name}"),
            name,
            size: bytes.len() as u64,
        })
    }

    fn list_documents(&self) -> Result<Vec<StoredDocument>, GatewayError> {
        let dir = self.uploads_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !is_pdf_filename(&name) {
                continue;
            }

            let size = entry.metadata()?.len();
            documents.push(StoredDocument {
                url: format!("{URL_PREFIX}{name}"),
                name,
                size,
            });
        }

        documents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(documents)
    }

    fn fetch_document(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        let path = self.upload_path(url)?;
        if !path.exists() {
            return Err(GatewayError::NotFound(url.to_owned()));
        }

        Ok(fs::read(path)?)
    }

    fn delete_document(&mut self, url: &str) -> Result<(), GatewayError> {
        let path = self.upload_path(url)?;
        if path.exists() {
            fs::remove_file(path)?;
        }

        // Drop a stale reference flag along with the file.
        let mut references = self.load_references()?;
        if references.iter().any(|existing| existing == url) {
            references.retain(|existing| existing != url);
            self.save_references(&references)?;
        }

        Ok(())
    }

    fn set_reference(&mut self, url: &str, referenced: bool) -> Result<(), GatewayError> {
        let mut references = self.load_references()?;

        if referenced {
            if !references.iter().any(|existing| existing == url) {
                references.push(url.to_owned());
            }
        } else {
            references.retain(|existing| existing != url);
        }

        self.save_references(&references)
    }

    fn list_references(&self) -> Result<Vec<String>, GatewayError> {
        self.load_references()
    }

    fn save_histories(&mut self, snapshot: &SessionSnapshot) -> Result<(), GatewayError> {
        let path = self.histories_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn load_histories(&self) -> Result<Option<SessionSnapshot>, GatewayError> {
        let path = self.histories_path();
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}
