//! Unified error type for the dilemma server.

use dilemma_match::{MatchStateError, MatchmakingError};
use dilemma_protocol::ProtocolError;
use dilemma_session::SessionError;
use dilemma_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` on each variant lets `?` convert layer errors
/// automatically inside the server and its connection handlers.
#[derive(Debug, thiserror::Error)]
pub enum DilemmaError {
    /// Connection, send, or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode, decode, or validation failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session registration or lookup failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Queueing failure or a bad match config.
    #[error(transparent)]
    Matchmaking(#[from] MatchmakingError),

    /// A rejected submission or abandon.
    #[error(transparent)]
    MatchState(#[from] MatchStateError),
}
