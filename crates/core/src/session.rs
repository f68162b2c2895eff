//! Conversation sessions: named, ordered message logs with a single
//! active session, convertible to and from the persisted snapshot.

use chrono::{DateTime, Utc};
use paperchat_gateway::{PersistedMessage, PersistedSession, SessionSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
}

impl Role {
    fn as_wire(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }

    fn from_wire(role: &str) -> Self {
        match role {
            "user" => Self::User,
            _ => Self::System,
        }
    }
}

/// Immutable once appended; per-session order is arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Time-derived, monotonically orderable session identity
/// (millisecond timestamp rendered as a string).
pub type SessionId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
}

/// Session set in display order (newest first) plus the active id.
///
/// The store itself may be empty before the first create or restore;
/// the coordinator guarantees it never stays that way.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Vec<Session>,
    active: Option<SessionId>,
    last_issued_ms: i64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session with a fresh, strictly increasing id, inserts
    /// it at the front of the display order, and makes it active.
    pub fn create_session(&mut self, name: Option<&str>) -> SessionId {
        let millis = Utc::now().timestamp_millis().max(self.last_issued_ms + 1);
        self.last_issued_ms = millis;
        let id: SessionId = millis.to_string();

        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| default_session_name(millis));

        self.sessions.insert(0, Session { id: id.clone(), name, messages: Vec::new() });
        self.active = Some(id.clone());
        id
    }

    pub fn append_message(
        &mut self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<(), SessionError> {
        let session = self.session_mut(session_id)?;
        session.messages.push(Message { role, content: content.into() });
        Ok(())
    }

    pub fn switch_to(&mut self, session_id: &str) -> Result<(), SessionError> {
        if !self.sessions.iter().any(|session| session.id == session_id) {
            return Err(SessionError::UnknownSession(session_id.to_owned()));
        }

        self.active = Some(session_id.to_owned());
        Ok(())
    }

    /// Renames a session; an empty name (after trimming) keeps the
    /// prior one.
    pub fn rename(&mut self, session_id: &str, new_name: &str) -> Result<(), SessionError> {
        let session = self.session_mut(session_id)?;

        let trimmed = new_name.trim();
        if !trimmed.is_empty() {
            session.name = trimmed.to_owned();
        }
        Ok(())
    }

    /// Deletes a session. When the active one goes away the replacement
    /// is, in order: the immediately-preceding session in display order,
    /// the immediately-following one, or a freshly created session.
    pub fn delete(&mut self, session_id: &str) -> Result<(), SessionError> {
        let index = self
            .sessions
            .iter()
            .position(|session| session.id == session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_owned()))?;

        self.sessions.remove(index);

        if self.active.as_deref() == Some(session_id) {
            if index > 0 {
                self.active = Some(self.sessions[index - 1].id.clone());
            } else if let Some(following) = self.sessions.first() {
                self.active = Some(following.id.clone());
            } else {
                self.create_session(None);
            }
        }

        Ok(())
    }

    /// Rebuilds the store from a persisted snapshot. Sessions are
    /// ordered by the creation timestamp parsed from their ids (newest
    /// first), not by snapshot insertion order. The restored set is
    /// never left empty or without an active session.
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        let SessionSnapshot { histories, active_id } = snapshot;

        let mut sessions: Vec<Session> = histories
            .into_iter()
            .map(|(id, persisted)| {
                let name = if persisted.name.trim().is_empty() {
                    default_session_name(id_timestamp(&id))
                } else {
                    persisted.name
                };
                let messages = persisted
                    .messages
                    .into_iter()
                    .map(|message| Message {
                        role: Role::from_wire(&message.role),
                        content: message.content,
                    })
                    .collect();
                Session { id, name, messages }
            })
            .collect();
        sessions.sort_by_key(|session| std::cmp::Reverse(id_timestamp(&session.id)));

        self.last_issued_ms = sessions.iter().map(|s| id_timestamp(&s.id)).max().unwrap_or(0);
        self.sessions = sessions;

        self.active = active_id
            .filter(|id| self.sessions.iter().any(|session| &session.id == id))
            .or_else(|| self.sessions.first().map(|session| session.id.clone()));

        if self.active.is_none() {
            self.create_session(None);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let histories: BTreeMap<String, PersistedSession> = self
            .sessions
            .iter()
            .map(|session| {
                let messages = session
                    .messages
                    .iter()
                    .map(|message| PersistedMessage {
                        role: message.role.as_wire().to_owned(),
                        content: message.content.clone(),
                    })
                    .collect();
                (
                    session.id.clone(),
                    PersistedSession { name: session.name.clone(), messages },
                )
            })
            .collect();

        SessionSnapshot { histories, active_id: self.active.clone() }
    }

    /// Sessions in display order, newest first.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == session_id)
    }

    pub fn active_id(&self) -> Option<&SessionId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut Session, SessionError> {
        self.sessions
            .iter_mut()
            .find(|session| session.id == session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_owned()))
    }
}

fn id_timestamp(id: &str) -> i64 {
    id.parse().unwrap_or(0)
}

fn default_session_name(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|created| format!("Chat {}", created.format("%Y-%m-%d %H:%M")))
        .unwrap_or_else(|| "New chat".to_owned())
}
