//! Error types for the client.

use dilemma_protocol::ProtocolError;
use tokio_tungstenite::tungstenite;

use crate::Phase;

/// Errors from the client state machine or its connection.
///
/// Anything except `AlreadySubmitted` and `InvalidAction` also moves the
/// machine to [`Phase::Errored`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The WebSocket failed to connect, send, or receive.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// A frame from the server couldn't be decoded, or an outbound
    /// message couldn't be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server reported an error. Terminal for the current match.
    #[error("server error: {0}")]
    Server(String),

    /// The server sent a message that makes no sense in this phase.
    #[error("unexpected `{message}` message while {phase}")]
    UnexpectedMessage { message: &'static str, phase: Phase },

    /// A choice was already submitted for this round.
    #[error("choice already submitted for round {round}")]
    AlreadySubmitted { round: u32 },

    /// A local action that isn't allowed in the current phase.
    #[error("cannot {action} while {phase}")]
    InvalidAction { action: &'static str, phase: Phase },

    /// The connection closed before the match finished.
    #[error("connection closed")]
    ConnectionClosed,
}
