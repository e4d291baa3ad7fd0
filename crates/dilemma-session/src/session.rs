//! Session types: the server's record of one connected participant.

use std::time::Instant;

use dilemma_protocol::{ServerMessage, SessionId};
use dilemma_transport::ConnectionId;
use tokio::sync::mpsc;

/// Outbound channel to a session's connection task.
///
/// Anything that wants to talk to a player (the matchmaker, a match actor)
/// holds a clone of this. The connection task owns the receiving end and
/// writes each message to the socket in order.
pub type SessionSender = mpsc::UnboundedSender<ServerMessage>;

/// A single connected participant.
///
/// Created on connect, destroyed on disconnect. A session is never owned by
/// a match; matches and the matchmaker refer to it by [`SessionId`] and a
/// cloned [`SessionSender`].
#[derive(Debug, Clone)]
pub struct PlayerSession {
    /// Server-issued, opaque identifier.
    pub session_id: SessionId,

    /// Name chosen in `join_game`. `None` until the player joins.
    pub display_name: Option<String>,

    /// The transport connection this session rides on.
    pub connection_id: ConnectionId,

    /// Handle for pushing messages to this session's socket.
    pub sender: SessionSender,

    /// When the connection was established.
    pub connected_at: Instant,
}

impl PlayerSession {
    /// Queues a message for this session.
    ///
    /// Returns `false` if the connection task has already gone away; the
    /// message is dropped in that case.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.sender.send(msg).is_ok()
    }
}
