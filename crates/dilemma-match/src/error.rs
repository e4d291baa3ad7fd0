//! Error types for matchmaking and match play.

use dilemma_protocol::{MatchId, SessionId};

/// Errors from the [`Matchmaker`](crate::Matchmaker).
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    /// The session is already playing a match that hasn't finished.
    #[error("session {0} is already in match {1}")]
    AlreadyInMatch(SessionId, MatchId),

    /// The session is already in the waiting queue.
    #[error("session {0} is already waiting for an opponent")]
    AlreadyWaiting(SessionId),

    /// The match configuration can't produce a playable match.
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
}

/// Errors from submitting to or abandoning a match.
///
/// A rejected submission never changes the match.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchStateError {
    /// The choice names a round other than the one being played, usually
    /// a retransmit for a round that was already resolved.
    #[error("stale round: choice was for round {submitted}, current round is {current}")]
    StaleRound { submitted: u32, current: u32 },

    /// The session is not a participant of this match (or of any match).
    #[error("No active game found for session {0}")]
    UnknownSession(SessionId),

    /// The session already chose for this round. Choices can't be changed.
    #[error("choice already submitted for round {round}")]
    AlreadyChosen { round: u32 },

    /// The match is over.
    #[error("match {0} has finished")]
    MatchFinished(MatchId),
}
