//! Workspace coordinator.
//!
//! The only place allowed to touch two components for one logical
//! action: it mediates uploads, deletions, selection, zooming, and the
//! conversation actions, and reconciles server state through the
//! persistence gateway without blocking further interaction.

use crate::library::{Document, DocumentLibrary, LibraryError};
use crate::session::{Role, SessionError, SessionId, SessionStore};
use crate::viewport::{ViewportController, ViewportError, DEFAULT_SCALE, ZOOM_STEP};
use paperchat_engine::RenderEngine;
use paperchat_gateway::{AssistantClient, GatewayError, PersistenceGateway};

const ANALYZE_FAILED: &str = "Analysis request failed";
const TRANSLATE_FAILED: &str = "Translation request failed";
const CHAT_FAILED: &str = "Message delivery failed";
const DOCUMENT_LOAD_FAILED: &str = "Unable to load the PDF file";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Viewport(#[from] ViewportError),
    #[error("upload failed: {0}")]
    Upload(#[source] GatewayError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
    Reset,
}

/// One user gesture, named. The presentation layer translates gestures
/// to commands and never carries workspace logic of its own.
#[derive(Debug, Clone)]
pub enum WorkspaceCommand {
    UploadDocument { filename: String, bytes: Vec<u8> },
    DeleteDocument { id: String },
    SelectDocument { id: String },
    SetReference { id: String, referenced: bool },
    Zoom(ZoomDirection),
    SelectText { text: String },
    Analyze,
    Translate,
    Chat,
    SendMessage { text: String },
    CreateSession { name: Option<String> },
    SwitchSession { id: String },
    RenameSession { id: String, name: String },
    DeleteSession { id: String },
}

pub struct WorkspaceCoordinator<E, G, A> {
    engine: E,
    gateway: G,
    assistant: A,
    library: DocumentLibrary,
    viewport: ViewportController,
    sessions: SessionStore,
    selection: Option<String>,
}

impl<E, G, A> WorkspaceCoordinator<E, G, A>
where
    E: RenderEngine,
    G: PersistenceGateway,
    A: AssistantClient,
{
    pub fn new(engine: E, gateway: G, assistant: A) -> Self {
        Self {
            engine,
            gateway,
            assistant,
            library: DocumentLibrary::new(),
            viewport: ViewportController::new(),
            sessions: SessionStore::new(),
            selection: None,
        }
    }

    /// Restores persisted state on first load: the session snapshot,
    /// the uploaded-document list with reference flags, and the active
    /// document's pages. Backend failures degrade to an empty library
    /// and a fresh session; nothing here is fatal.
    pub fn bootstrap(&mut self) {
        match self.gateway.load_histories() {
            Ok(Some(snapshot)) => self.sessions.restore(snapshot),
            Ok(None) => {
                self.sessions.create_session(None);
            }
            Err(error) => {
                log::warn!("failed to load chat histories: {error}");
                self.sessions.create_session(None);
            }
        }

        let documents = self.gateway.list_documents().unwrap_or_else(|error| {
            log::warn!("failed to list documents: {error}");
            Vec::new()
        });
        let references = self.gateway.list_references().unwrap_or_else(|error| {
            log::warn!("failed to load reference flags: {error}");
            Vec::new()
        });

        for stored in documents {
            let referenced = references.iter().any(|url| *url == stored.url);
            self.library.add(Document {
                id: stored.url,
                name: stored.name,
                size_bytes: stored.size,
                referenced,
            });
        }

        if let Some(active) = self.library.active_id().cloned() {
            self.show_document(&active);
        }
    }

    pub fn dispatch(&mut self, command: WorkspaceCommand) -> Result<(), WorkspaceError> {
        match command {
            WorkspaceCommand::UploadDocument { filename, bytes } => {
                self.upload_document(&bytes, &filename).map(|_| ())
            }
            WorkspaceCommand::DeleteDocument { id } => {
                self.delete_document(&id);
                Ok(())
            }
            WorkspaceCommand::SelectDocument { id } => self.select_document(&id),
            WorkspaceCommand::SetReference { id, referenced } => {
                self.set_reference(&id, referenced)
            }
            WorkspaceCommand::Zoom(direction) => self.zoom(direction),
            WorkspaceCommand::SelectText { text } => {
                self.handle_text_selection(&text);
                Ok(())
            }
            WorkspaceCommand::Analyze => self.analyze_selection(),
            WorkspaceCommand::Translate => self.translate_selection(),
            WorkspaceCommand::Chat => self.chat_selection(),
            WorkspaceCommand::SendMessage { text } => self.send_message(&text),
            WorkspaceCommand::CreateSession { name } => {
                self.create_session(name.as_deref());
                Ok(())
            }
            WorkspaceCommand::SwitchSession { id } => self.switch_session(&id),
            WorkspaceCommand::RenameSession { id, name } => self.rename_session(&id, &name),
            WorkspaceCommand::DeleteSession { id } => self.delete_session(&id),
        }
    }

    /// Stores the document through the gateway and adds it to the
    /// library; the first document of the workspace also loads into the
    /// viewport.
    pub fn upload_document(
        &mut self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<Document, WorkspaceError> {
        let stored =
            self.gateway.upload_document(bytes, filename).map_err(WorkspaceError::Upload)?;

        let document = Document {
            id: stored.url,
            name: stored.name,
            size_bytes: stored.size,
            referenced: false,
        };

        let first = self.library.is_empty();
        self.library.add(document.clone());

        if first {
            let id = document.id.clone();
            self.show_document(&id);
        }

        Ok(document)
    }

    /// Deletes through the gateway first; a rejected deletion mutates
    /// nothing locally. On confirmed deletion of the active document the
    /// replacement loads, or the viewport clears when none remains.
    pub fn delete_document(&mut self, id: &str) {
        if let Err(error) = self.gateway.delete_document(id) {
            log::warn!("failed to delete document {id}: {error}");
            return;
        }

        if self.library.remove(id) == Some(true) {
            match self.library.active_id().cloned() {
                Some(next) => self.show_document(&next),
                None => self.viewport.clear(&mut self.engine),
            }
        }
    }

    pub fn select_document(&mut self, id: &str) -> Result<(), WorkspaceError> {
        self.library.select(id)?;
        self.show_document(id);
        Ok(())
    }

    /// Two-phase reference toggle: apply locally, attempt persistence,
    /// and on failure restore the prior flag so displayed state never
    /// silently diverges from the server's.
    pub fn set_reference(&mut self, id: &str, referenced: bool) -> Result<(), WorkspaceError> {
        let prior = self.library.set_referenced(id, referenced)?;

        if let Err(error) = self.gateway.set_reference(id, referenced) {
            log::warn!("failed to persist reference flag for {id}, rolling back: {error}");
            let _ = self.library.set_referenced(id, prior);
        }

        Ok(())
    }

    pub fn zoom(&mut self, direction: ZoomDirection) -> Result<(), WorkspaceError> {
        let target = match direction {
            ZoomDirection::In => self.viewport.scale() + ZOOM_STEP,
            ZoomDirection::Out => self.viewport.scale() - ZOOM_STEP,
            ZoomDirection::Reset => DEFAULT_SCALE,
        };

        self.viewport.set_scale(&self.engine, target)?;
        Ok(())
    }

    /// Records the latest non-empty selected text for the analyze,
    /// translate, and chat actions.
    pub fn handle_text_selection(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.selection = Some(trimmed.to_owned());
        }
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn analyze_selection(&mut self) -> Result<(), WorkspaceError> {
        let Some(text) = self.selection.clone() else {
            return Ok(());
        };

        let session = self.ensure_active_session();
        self.append_and_persist(&session, Role::User, text.clone())?;

        match self.assistant.analyze(&text) {
            Ok(reply) => self.append_and_persist(&session, Role::System, reply)?,
            Err(error) => {
                log::warn!("analyze request failed: {error}");
                self.append_and_persist(&session, Role::System, ANALYZE_FAILED)?;
            }
        }
        Ok(())
    }

    pub fn translate_selection(&mut self) -> Result<(), WorkspaceError> {
        let Some(text) = self.selection.clone() else {
            return Ok(());
        };

        let session = self.ensure_active_session();
        self.append_and_persist(&session, Role::User, format!("Translate: {text}"))?;

        match self.assistant.translate(&text) {
            Ok(reply) => self.append_and_persist(&session, Role::System, reply)?,
            Err(error) => {
                log::warn!("translate request failed: {error}");
                self.append_and_persist(&session, Role::System, TRANSLATE_FAILED)?;
            }
        }
        Ok(())
    }

    /// Sends the current selection as a chat message.
    pub fn chat_selection(&mut self) -> Result<(), WorkspaceError> {
        let Some(text) = self.selection.clone() else {
            return Ok(());
        };
        self.send_message(&text)
    }

    pub fn send_message(&mut self, text: &str) -> Result<(), WorkspaceError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let session = self.ensure_active_session();
        self.append_and_persist(&session, Role::User, text)?;

        match self.assistant.chat(text) {
            Ok(reply) => self.append_and_persist(&session, Role::System, reply)?,
            Err(error) => {
                log::warn!("chat request failed: {error}");
                self.append_and_persist(&session, Role::System, CHAT_FAILED)?;
            }
        }
        Ok(())
    }

    pub fn create_session(&mut self, name: Option<&str>) -> SessionId {
        let id = self.sessions.create_session(name);
        self.persist_sessions();
        id
    }

    pub fn switch_session(&mut self, id: &str) -> Result<(), WorkspaceError> {
        self.sessions.switch_to(id)?;
        self.persist_sessions();
        Ok(())
    }

    pub fn rename_session(&mut self, id: &str, name: &str) -> Result<(), WorkspaceError> {
        self.sessions.rename(id, name)?;
        self.persist_sessions();
        Ok(())
    }

    pub fn delete_session(&mut self, id: &str) -> Result<(), WorkspaceError> {
        self.sessions.delete(id)?;
        self.persist_sessions();
        Ok(())
    }

    pub fn library(&self) -> &DocumentLibrary {
        &self.library
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// Fetches and loads a document into the viewport. Load failures are
    /// not fatal: the prior viewport state stays, the failure is logged,
    /// and a system note lands in the conversation.
    fn show_document(&mut self, id: &str) {
        let outcome = match self.gateway.fetch_document(id) {
            Ok(bytes) => self
                .viewport
                .load_document(&mut self.engine, id.to_owned(), bytes)
                .map(|_| ())
                .map_err(WorkspaceError::from),
            Err(error) => Err(error.into()),
        };

        if let Err(error) = outcome {
            log::warn!("failed to load document {id}: {error}");
            let session = self.ensure_active_session();
            if let Err(error) =
                self.append_and_persist(&session, Role::System, DOCUMENT_LOAD_FAILED)
            {
                log::warn!("failed to record load failure: {error}");
            }
        }
    }

    fn ensure_active_session(&mut self) -> SessionId {
        match self.sessions.active_id() {
            Some(id) => id.clone(),
            None => self.sessions.create_session(None),
        }
    }

    // Every mutating session operation issues its own full-snapshot
    // write; failed writes are logged, not retried.
    fn append_and_persist(
        &mut self,
        session: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<(), WorkspaceError> {
        self.sessions.append_message(session, role, content)?;
        self.persist_sessions();
        Ok(())
    }

    fn persist_sessions(&mut self) {
        let snapshot = self.sessions.snapshot();
        if let Err(error) = self.gateway.save_histories(&snapshot) {
            log::warn!("failed to persist chat histories: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Message;
    use crate::testutil::FakeEngine;
    use crate::viewport::MAX_SCALE;
    use paperchat_gateway::{MemoryGateway, ScriptedAssistant};

    type Workspace = WorkspaceCoordinator<FakeEngine, MemoryGateway, ScriptedAssistant>;

    fn workspace() -> Workspace {
        let mut workspace = WorkspaceCoordinator::new(
            FakeEngine::new(),
            MemoryGateway::new(),
            ScriptedAssistant::new(),
        );
        workspace.bootstrap();
        workspace
    }

    fn upload(workspace: &mut Workspace, name: &str, pages: usize) -> Document {
        workspace.upload_document(&vec![0; pages], name).expect("upload should succeed")
    }

    #[test]
    fn first_upload_activates_and_renders() {
        let mut workspace = workspace();
        let document = upload(&mut workspace, "doc1.pdf", 2);

        assert_eq!(workspace.library().len(), 1);
        assert_eq!(workspace.library().active_id(), Some(&document.id));
        assert_eq!(workspace.viewport().active_document(), Some(&document.id));
        assert_eq!(workspace.viewport().pages().len(), 2);
        assert_eq!(workspace.viewport().scale(), DEFAULT_SCALE);
    }

    #[test]
    fn second_upload_does_not_steal_viewport() {
        let mut workspace = workspace();
        let first = upload(&mut workspace, "doc1.pdf", 2);
        upload(&mut workspace, "doc2.pdf", 3);

        assert_eq!(workspace.library().active_id(), Some(&first.id));
        assert_eq!(workspace.viewport().pages().len(), 2);
    }

    #[test]
    fn upload_rejects_non_pdf_before_any_mutation() {
        let mut workspace = workspace();

        let err = workspace.upload_document(b"x", "notes.txt").expect_err("should reject");
        assert!(matches!(err, WorkspaceError::Upload(GatewayError::UnsupportedFileType(_))));
        assert!(workspace.library().is_empty());
    }

    #[test]
    fn deleting_active_document_loads_replacement() {
        let mut workspace = workspace();
        let first = upload(&mut workspace, "doc1.pdf", 2);
        let second = upload(&mut workspace, "doc2.pdf", 3);

        workspace.delete_document(&first.id);

        assert_eq!(workspace.library().active_id(), Some(&second.id));
        assert_eq!(workspace.viewport().active_document(), Some(&second.id));
        assert_eq!(workspace.viewport().pages().len(), 3);
    }

    #[test]
    fn deleting_inactive_document_keeps_viewport() {
        let mut workspace = workspace();
        let first = upload(&mut workspace, "doc1.pdf", 2);
        let second = upload(&mut workspace, "doc2.pdf", 3);

        workspace.delete_document(&second.id);

        assert_eq!(workspace.library().active_id(), Some(&first.id));
        assert_eq!(workspace.viewport().pages().len(), 2);
    }

    #[test]
    fn deleting_last_document_clears_viewport() {
        let mut workspace = workspace();
        let document = upload(&mut workspace, "doc1.pdf", 2);

        workspace.delete_document(&document.id);

        assert!(workspace.library().is_empty());
        assert!(workspace.viewport().active_document().is_none());
        assert!(workspace.viewport().pages().is_empty());
    }

    #[test]
    fn rejected_deletion_mutates_nothing() {
        let mut workspace = workspace();
        let document = upload(&mut workspace, "doc1.pdf", 2);

        workspace.gateway_mut().fail_deletes = true;
        workspace.delete_document(&document.id);

        assert_eq!(workspace.library().len(), 1);
        assert_eq!(workspace.viewport().active_document(), Some(&document.id));
    }

    #[test]
    fn select_document_switches_viewport() {
        let mut workspace = workspace();
        upload(&mut workspace, "doc1.pdf", 2);
        let second = upload(&mut workspace, "doc2.pdf", 3);

        workspace.select_document(&second.id).expect("select should succeed");

        assert_eq!(workspace.library().active_id(), Some(&second.id));
        assert_eq!(workspace.viewport().pages().len(), 3);

        let err = workspace.select_document("ghost").expect_err("unknown id should fail");
        assert!(matches!(err, WorkspaceError::Library(LibraryError::NotFound(_))));
    }

    #[test]
    fn zoom_in_clamps_at_max_scale() {
        let mut workspace = workspace();
        upload(&mut workspace, "doc1.pdf", 1);

        for _ in 0..7 {
            workspace.zoom(ZoomDirection::In).expect("zoom should succeed");
        }

        assert_eq!(workspace.viewport().scale(), MAX_SCALE);
        assert_eq!(workspace.viewport().pages()[0].width_px(), 300);

        workspace.zoom(ZoomDirection::Reset).expect("zoom should succeed");
        assert_eq!(workspace.viewport().scale(), DEFAULT_SCALE);
    }

    #[test]
    fn reference_toggle_persists_on_success() {
        let mut workspace = workspace();
        let document = upload(&mut workspace, "doc1.pdf", 1);

        workspace.set_reference(&document.id, true).expect("toggle should succeed");

        assert!(workspace.library().get(&document.id).expect("document").referenced);
        assert_eq!(
            workspace.gateway().list_references().expect("list"),
            vec![document.id.clone()]
        );
    }

    #[test]
    fn reference_toggle_rolls_back_on_gateway_failure() {
        let mut workspace = workspace();
        let document = upload(&mut workspace, "doc1.pdf", 1);

        workspace.gateway_mut().fail_references = true;
        workspace.set_reference(&document.id, true).expect("toggle itself succeeds");

        assert!(!workspace.library().get(&document.id).expect("document").referenced);
    }

    #[test]
    fn conversation_order_survives_session_switch() {
        let assistant = ScriptedAssistant::new();
        assistant.push_reply("hi");
        let mut workspace = WorkspaceCoordinator::new(
            FakeEngine::new(),
            MemoryGateway::new(),
            assistant,
        );
        workspace.bootstrap();
        let s1 = workspace.sessions().active_id().expect("active session").clone();

        workspace.send_message("hello").expect("send should succeed");

        let s2 = workspace.create_session(None);
        assert_ne!(s1, s2);

        workspace.switch_session(&s1).expect("switch should succeed");
        let messages = &workspace.sessions().active().expect("session").messages;
        assert_eq!(
            messages,
            &vec![
                Message { role: Role::User, content: "hello".to_owned() },
                Message { role: Role::System, content: "hi".to_owned() },
            ]
        );
    }

    #[test]
    fn assistant_failure_appends_fixed_system_message() {
        let mut workspace = workspace();

        workspace.handle_text_selection("some passage");
        workspace.analyze_selection().expect("analyze should not error");

        let messages = &workspace.sessions().active().expect("session").messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message { role: Role::User, content: "some passage".to_owned() });
        assert_eq!(
            messages[1],
            Message { role: Role::System, content: "Analysis request failed".to_owned() }
        );
    }

    #[test]
    fn translate_decorates_the_user_message() {
        let assistant = ScriptedAssistant::new();
        assistant.push_reply("bonjour");
        let mut workspace =
            WorkspaceCoordinator::new(FakeEngine::new(), MemoryGateway::new(), assistant);
        workspace.bootstrap();

        workspace.handle_text_selection("hello");
        workspace.translate_selection().expect("translate should succeed");

        let messages = &workspace.sessions().active().expect("session").messages;
        assert_eq!(messages[0].content, "Translate: hello");
        assert_eq!(messages[1].content, "bonjour");
    }

    #[test]
    fn chat_sends_the_selection_verbatim() {
        let assistant = ScriptedAssistant::new();
        assistant.push_reply("sure");
        let mut workspace =
            WorkspaceCoordinator::new(FakeEngine::new(), MemoryGateway::new(), assistant);
        workspace.bootstrap();

        workspace.handle_text_selection("what does this mean?");
        workspace.dispatch(WorkspaceCommand::Chat).expect("chat should succeed");

        let messages = &workspace.sessions().active().expect("session").messages;
        assert_eq!(messages[0].content, "what does this mean?");
        assert_eq!(messages[1].content, "sure");
    }

    #[test]
    fn blank_selection_is_ignored() {
        let mut workspace = workspace();

        workspace.handle_text_selection("   ");
        assert!(workspace.selection().is_none());

        workspace.analyze_selection().expect("no-op");
        assert!(workspace.sessions().active().expect("session").messages.is_empty());
    }

    #[test]
    fn every_message_issues_a_snapshot_write() {
        let assistant = ScriptedAssistant::new();
        assistant.push_reply("hi");
        let mut workspace =
            WorkspaceCoordinator::new(FakeEngine::new(), MemoryGateway::new(), assistant);
        workspace.bootstrap();

        let before = workspace.gateway().save_count();
        workspace.send_message("hello").expect("send should succeed");

        assert_eq!(workspace.gateway().save_count(), before + 2);

        let snapshot = workspace.gateway().snapshot().expect("snapshot saved");
        let active = snapshot.active_id.clone().expect("active id persisted");
        assert_eq!(snapshot.histories[&active].messages.len(), 2);
    }

    #[test]
    fn failed_snapshot_write_is_dropped_not_retried() {
        let mut workspace = workspace();
        workspace.gateway_mut().fail_histories = true;

        workspace.send_message("hello").expect("send should still succeed");

        assert_eq!(workspace.gateway().save_count(), 0);
        assert_eq!(workspace.sessions().active().expect("session").messages.len(), 2);
    }

    #[test]
    fn viewport_load_failure_leaves_note_in_conversation() {
        let mut workspace = workspace();

        // Zero-length uploads open as unrenderable documents.
        let document = workspace.upload_document(b"", "doc1.pdf").expect("upload succeeds");

        assert_eq!(workspace.library().active_id(), Some(&document.id));
        assert!(workspace.viewport().active_document().is_none());

        let messages = &workspace.sessions().active().expect("session").messages;
        assert_eq!(messages.last().expect("note").content, "Unable to load the PDF file");
    }

    #[test]
    fn bootstrap_restores_documents_flags_and_sessions() {
        let mut gateway = MemoryGateway::new();
        let stored = gateway.upload_document(&[0, 0], "doc1.pdf").expect("seed upload");
        gateway.set_reference(&stored.url, true).expect("seed reference");

        let mut seed_sessions = SessionStore::new();
        let older = seed_sessions.create_session(Some("notes"));
        seed_sessions
            .append_message(&older, Role::User, "carried over")
            .expect("seed message");
        seed_sessions.create_session(None);
        seed_sessions.switch_to(&older).expect("seed switch");
        gateway.seed_snapshot(seed_sessions.snapshot());

        let mut workspace =
            WorkspaceCoordinator::new(FakeEngine::new(), gateway, ScriptedAssistant::new());
        workspace.bootstrap();

        assert_eq!(workspace.library().len(), 1);
        assert!(workspace.library().get(&stored.url).expect("document").referenced);
        assert_eq!(workspace.viewport().pages().len(), 2);

        assert_eq!(workspace.sessions().len(), 2);
        assert_eq!(workspace.sessions().active_id().map(String::as_str), Some(older.as_str()));
        assert_eq!(
            workspace.sessions().active().expect("session").messages[0].content,
            "carried over"
        );
    }

    #[test]
    fn dispatch_routes_commands() {
        let mut workspace = workspace();

        workspace
            .dispatch(WorkspaceCommand::UploadDocument {
                filename: "doc1.pdf".to_owned(),
                bytes: vec![0; 2],
            })
            .expect("dispatch upload");
        workspace.dispatch(WorkspaceCommand::Zoom(ZoomDirection::In)).expect("dispatch zoom");

        assert_eq!(workspace.library().len(), 1);
        assert_eq!(workspace.viewport().scale(), DEFAULT_SCALE + ZOOM_STEP);
    }
}
