//! PaperChat Workspace Core
//!
//! The workspace state coordinator: document library, viewport, session
//! store, and the coordinator that keeps the three consistent across
//! uploads, deletions, zooming, and conversation actions.

pub mod coordinator;
pub mod library;
pub mod session;
pub mod viewport;

pub use coordinator::{WorkspaceCommand, WorkspaceCoordinator, WorkspaceError, ZoomDirection};
pub use library::{Document, DocumentId, DocumentLibrary, LibraryError};
pub use session::{Message, Role, Session, SessionError, SessionId, SessionStore};
pub use viewport::{
    RenderTicket, RenderedPage, ViewportController, ViewportError, DEFAULT_SCALE, MAX_SCALE,
    MIN_SCALE, ZOOM_STEP,
};

#[cfg(test)]
pub(crate) mod testutil;
