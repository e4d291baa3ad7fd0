//! The session registry: every participant currently connected.
//!
//! Owns the id → session map and issues session ids. The registry is a
//! plain struct; the server wraps it in a `tokio::sync::Mutex` and it is
//! only touched on connect, join, and disconnect, never per round.

use std::collections::HashMap;
use std::time::Instant;

use dilemma_protocol::SessionId;
use dilemma_transport::ConnectionId;
use rand::Rng;

use crate::{PlayerSession, SessionError, SessionSender};

/// Registry of connected sessions.
///
/// ```text
/// register() ──→ set_display_name() ──→ remove()
///     │                                   ▲
///     └───────────(disconnect)────────────┘
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// All live sessions, keyed by their server-issued id.
    sessions: HashMap<SessionId, PlayerSession>,

    /// Reverse index so a connection can never carry two sessions.
    /// Kept in sync with `sessions`.
    connections: HashMap<ConnectionId, SessionId>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new session for a freshly accepted connection.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if this connection already has
    /// a session.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        sender: SessionSender,
    ) -> Result<&PlayerSession, SessionError> {
        if self.connections.contains_key(&connection_id) {
            return Err(SessionError::AlreadyConnected(connection_id));
        }

        let session_id = loop {
            let candidate = generate_session_id();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = PlayerSession {
            session_id: session_id.clone(),
            display_name: None,
            connection_id,
            sender,
            connected_at: Instant::now(),
        };

        self.connections.insert(connection_id, session_id.clone());
        self.sessions.insert(session_id.clone(), session);

        tracing::info!(%session_id, %connection_id, "session registered");

        Ok(self.sessions.get(&session_id).expect("just inserted"))
    }

    /// Records the display name a player chose in `join_game`.
    ///
    /// Surrounding whitespace is trimmed. A later join replaces the name.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the session is gone.
    pub fn set_display_name(
        &mut self,
        session_id: &SessionId,
        name: &str,
    ) -> Result<&PlayerSession, SessionError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        session.display_name = Some(name.trim().to_string());
        Ok(session)
    }

    /// Removes a session when its connection ends.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the session was already removed.
    pub fn remove(
        &mut self,
        session_id: &SessionId,
    ) -> Result<PlayerSession, SessionError> {
        let session = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        self.connections.remove(&session.connection_id);

        tracing::info!(
            %session_id,
            connected_for_ms = session.connected_at.elapsed().as_millis() as u64,
            "session removed"
        );
        Ok(session)
    }

    /// Looks up a session by id.
    pub fn get(&self, session_id: &SessionId) -> Option<&PlayerSession> {
        self.sessions.get(session_id)
    }

    /// Number of connected sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Generates a random 32-character hex session id (128 bits of entropy).
///
/// Ids are unguessable so that one client can't address another's session.
fn generate_session_id() -> SessionId {
    let bytes: [u8; 16] = rand::rng().random();
    SessionId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

// =========================================================================
// Tests
// =========================================================================
