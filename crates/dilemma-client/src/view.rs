//! The client's view of its current match.

use std::fmt;

use dilemma_protocol::{Choice, MatchId};

/// Where the client is in the connect → match → finish lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not yet connected, or reset after a finished/errored match.
    Connecting,
    /// `join_game` sent; no opponent yet.
    WaitingForMatch,
    /// A round is open and no choice has been submitted for it.
    InRound,
    /// Our choice is in; the round resolves when the opponent's arrives.
    WaitingForOpponent,
    /// The last round resolved; `game_end` is on its way.
    RoundResolved,
    /// The match ended normally. No further submissions.
    Finished,
    /// Terminal failure. Rejects everything until [`reset`](crate::ClientMachine::reset).
    Errored,
}

impl Phase {
    /// `Finished` and `Errored` accept no further actions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Errored)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::WaitingForMatch => "waiting for a match",
            Self::InRound => "in round",
            Self::WaitingForOpponent => "waiting for opponent",
            Self::RoundResolved => "round resolved",
            Self::Finished => "finished",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// One resolved round, from this client's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRecord {
    pub round_number: u32,
    pub own_choice: Choice,
    pub opponent_choice: Choice,
    pub own_points: u32,
    pub opponent_points: u32,
}

/// Everything a presentation layer needs to draw the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    pub phase: Phase,
    pub game_id: Option<MatchId>,
    /// The round being played, 1-based. `total_rounds + 1` once the last
    /// round has resolved.
    pub round_number: u32,
    pub total_rounds: u32,
    pub own_score: u32,
    pub opponent_score: u32,
    pub opponent: Option<String>,
    pub history: Vec<RoundRecord>,
    /// Our choice for the open round. Cleared when the round resolves.
    pub last_choice: Option<Choice>,
    pub last_error: Option<String>,
}

impl Default for ClientView {
    fn default() -> Self {
        Self {
            phase: Phase::Connecting,
            game_id: None,
            round_number: 0,
            total_rounds: 0,
            own_score: 0,
            opponent_score: 0,
            opponent: None,
            history: Vec::new(),
            last_choice: None,
            last_error: None,
        }
    }
}
