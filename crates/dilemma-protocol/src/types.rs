//! Core protocol types for the dilemma wire format.
//!
//! Every type here travels on the wire. Messages are internally tagged
//! JSON objects: `{"type": "make_choice", "choice": "defect"}`. The tag
//! names and field names are the public contract with browser clients, so
//! the tests at the bottom pin the exact JSON shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Longest display name accepted in `join_game`, in characters, after
/// trimming surrounding whitespace.
pub const MAX_USERNAME_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier for one connected participant.
///
/// Issued by the server when a connection is established; clients never
/// choose it. Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an already-generated identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for one match. Sent to clients as `game_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// One of the two actions a player may take in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Cooperate,
    Defect,
}

impl Choice {
    /// Both choices, in a fixed order.
    pub const ALL: [Choice; 2] = [Choice::Cooperate, Choice::Defect];
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cooperate => f.write_str("cooperate"),
            Self::Defect => f.write_str("defect"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter the matchmaking queue under the given display name.
    JoinGame { username: String },

    /// Submit a choice for the current round.
    ///
    /// `round_number` is the round the client believes is current. When
    /// present, the server rejects the choice if that round has already
    /// been resolved. Older clients omit it.
    MakeChoice {
        choice: Choice,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round_number: Option<u32>,
    },
}

impl ClientMessage {
    /// Checks the protocol rules that serde can't express.
    ///
    /// # Errors
    /// `ProtocolError::InvalidMessage` for an empty or over-long username,
    /// or a `round_number` of 0 (rounds are 1-based).
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::JoinGame { username } => {
                let name = username.trim();
                if name.is_empty() {
                    return Err(ProtocolError::InvalidMessage(
                        "username must not be empty".into(),
                    ));
                }
                if name.chars().count() > MAX_USERNAME_LEN {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "username longer than {MAX_USERNAME_LEN} characters"
                    )));
                }
                Ok(())
            }
            Self::MakeChoice {
                round_number: Some(0),
                ..
            } => Err(ProtocolError::InvalidMessage(
                "round_number starts at 1".into(),
            )),
            Self::MakeChoice { .. } => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// One resolved round, as seen by the side receiving it.
///
/// "player" fields describe the receiver, "opponent" fields the other side.
/// `opponent_points` is the opponent's *cumulative* total (the field name is
/// kept from the first version of the protocol); the opponent's points for
/// this round alone are in `opponent_round_points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    pub game_id: MatchId,
    /// The round that comes next. After the final round this is
    /// `total_rounds + 1`, and a `game_end` follows.
    pub round_number: u32,
    pub player_choice: Choice,
    pub opponent_choice: Choice,
    /// Points the receiver earned this round.
    pub points: u32,
    /// Points the opponent earned this round.
    pub opponent_round_points: u32,
    /// The receiver's cumulative total.
    pub total_points: u32,
    /// The opponent's cumulative total.
    pub opponent_points: u32,
}

/// Final totals from the receiver's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub player: u32,
    pub opponent: u32,
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Enqueued, no opponent yet.
    Waiting { message: String },

    /// A match was formed.
    GameStart {
        game_id: MatchId,
        opponent: String,
        total_rounds: u32,
    },

    /// Both choices for a round arrived and the round was scored.
    RoundResult(RoundReport),

    /// The match is over. Always preceded by the `round_result` of the
    /// last round, so the totals here are never news.
    GameEnd {
        game_id: MatchId,
        final_score: FinalScore,
    },

    /// A protocol, matchmaking, or match failure. Also sent when the
    /// opponent disconnects mid-match.
    Error { message: String },
}

impl ServerMessage {
    /// Shorthand for `ServerMessage::Error`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The standard `waiting` notice.
    pub fn waiting() -> Self {
        Self::Waiting {
            message: "Waiting for opponent...".into(),
        }
    }

    /// The wire `type` tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Waiting { .. } => "waiting",
            Self::GameStart { .. } => "game_start",
            Self::RoundResult(_) => "round_result",
            Self::GameEnd { .. } => "game_end",
            Self::Error { .. } => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
