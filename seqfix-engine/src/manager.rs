/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session registry.
//!
//! [`SessionManager`] owns every session of an engine instance, keyed by
//! [`SessionId`]. It is passed by reference wherever lookup is needed; there
//! is no process-wide static registry. Sessions stay registered across
//! network disconnects and are removed only at engine shutdown.

use parking_lot::RwLock;
use seqfix_core::error::{FixError, SessionError};
use seqfix_core::fields::tags;
use seqfix_core::message::Message;
use seqfix_core::types::SessionId;
use seqfix_session::Session;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

/// Registry of live sessions, keyed by identity.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under its identity, replacing any previous
    /// registration.
    pub fn register(&self, session: Arc<Session>) {
        self.sessions
            .write()
            .insert(session.session_id().clone(), session);
    }

    /// Locates a session by identity.
    #[must_use]
    pub fn lookup(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Returns true if a session exists with the given identity.
    #[must_use]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Returns the number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns true if no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Returns a snapshot of all registered sessions.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Unregisters every session, closing each one's resources.
    pub fn unregister_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in sessions {
            if let Err(e) = session.close() {
                error!(session_id = %session.session_id(), "Failed to close session resources: {e}");
            }
        }
    }

    /// Sends a message through the session with the given identity. The
    /// identity's CompIDs are stamped onto the message by the send
    /// pipeline.
    ///
    /// # Errors
    /// Returns `SessionError::SessionNotFound` if no session is registered
    /// under the identity.
    pub fn send_to_target(
        &self,
        message: Message,
        session_id: &SessionId,
    ) -> Result<bool, FixError> {
        let session = self
            .lookup(session_id)
            .ok_or_else(|| SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        Ok(session.send(message))
    }

    /// Convenience lookup using the CompIDs already present on a message
    /// header (reversed relative to inbound traffic).
    ///
    /// # Errors
    /// Returns `SessionError::SessionNotFound` if the header carries no
    /// resolvable identity.
    pub fn send_to_target_from_header(&self, message: Message) -> Result<bool, FixError> {
        let sessions = self.sessions.read();
        let sender = message.header.get_str(tags::SENDER_COMP_ID).unwrap_or("");
        let target = message.header.get_str(tags::TARGET_COMP_ID).unwrap_or("");
        let found = sessions
            .values()
            .find(|s| {
                s.session_id().sender_comp_id.as_str() == sender
                    && s.session_id().target_comp_id.as_str() == target
            })
            .cloned();
        drop(sessions);
        let session = found.ok_or_else(|| SessionError::SessionNotFound {
            session_id: format!("{sender}->{target}"),
        })?;
        Ok(session.send(message))
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.len())
            .finish()
    }
}
