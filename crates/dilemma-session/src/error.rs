//! Error types for the session layer.

use dilemma_protocol::SessionId;
use dilemma_transport::ConnectionId;

/// Errors that can occur while registering or looking up sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists with this id. Either it was never issued or the
    /// connection already went away.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The connection already has a session. One connection, one session.
    #[error("connection {0} already has a session")]
    AlreadyConnected(ConnectionId),
}
