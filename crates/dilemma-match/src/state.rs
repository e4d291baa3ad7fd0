//! Per-match state machine.
//!
//! [`MatchState`] is plain data with no I/O. Every operation returns the
//! messages it wants delivered as `(Side, ServerMessage)` pairs, and the
//! match actor routes them. That keeps all of the round invariants testable
//! without a runtime:
//!
//! - at most one pending round; a round resolves exactly when both sides
//!   have chosen for it, inside the call that delivers the second choice
//! - `history.len() == current_round - 1` while active, and
//!   `== total_rounds` once completed
//! - cumulative scores are the sums over `history` and never decrease

use dilemma_protocol::{
    Choice, FinalScore, MatchId, RoundReport, ServerMessage, SessionId,
};

use crate::scoring::score;
use crate::{FinishReason, MatchStateError, MatchStatus};

/// One of the two seats in a match. A is the player who waited longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// Both sides, A first.
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    /// The opposing side.
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// A message addressed to one side of the match.
pub type Outbound = (Side, ServerMessage);

/// Who sits in a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub session_id: SessionId,
    pub display_name: String,
}

/// A resolved round. Immutable once it is in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    pub round_number: u32,
    pub choice_a: Choice,
    pub choice_b: Choice,
    pub points_a: u32,
    pub points_b: u32,
}

impl Round {
    /// Returns `(own_choice, opponent_choice, own_points, opponent_points)`
    /// from `side`'s point of view.
    pub fn for_side(&self, side: Side) -> (Choice, Choice, u32, u32) {
        match side {
            Side::A => (self.choice_a, self.choice_b, self.points_a, self.points_b),
            Side::B => (self.choice_b, self.choice_a, self.points_b, self.points_a),
        }
    }
}

/// The full state of one match.
#[derive(Debug, Clone)]
pub struct MatchState {
    match_id: MatchId,
    participants: [Participant; 2],
    total_rounds: u32,
    /// 1-based; never exceeds `total_rounds`.
    current_round: u32,
    scores: [u32; 2],
    /// Choices received for `current_round`.
    pending: [Option<Choice>; 2],
    history: Vec<Round>,
    status: MatchStatus,
}

impl MatchState {
    /// Creates a match at round 1 with zero scores.
    ///
    /// `total_rounds` of 0 is clamped to 1; the matchmaker validates its
    /// config before it gets here.
    pub fn new(
        match_id: MatchId,
        a: Participant,
        b: Participant,
        total_rounds: u32,
    ) -> Self {
        Self {
            match_id,
            participants: [a, b],
            total_rounds: total_rounds.max(1),
            current_round: 1,
            scores: [0, 0],
            pending: [None, None],
            history: Vec::with_capacity(total_rounds as usize),
            status: MatchStatus::Active,
        }
    }

    /// The `game_start` message for each side.
    pub fn start_messages(&self) -> Vec<Outbound> {
        Side::BOTH
            .into_iter()
            .map(|side| {
                let msg = ServerMessage::GameStart {
                    game_id: self.match_id,
                    opponent: self.participant(side.other()).display_name.clone(),
                    total_rounds: self.total_rounds,
                };
                (side, msg)
            })
            .collect()
    }

    /// Which side a session is sitting on, if any.
    pub fn side_of(&self, session_id: &SessionId) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|side| self.participant(*side).session_id == *session_id)
    }

    /// Records a choice for `round_number`.
    ///
    /// If the opponent has already chosen for this round, the round is
    /// resolved before returning and the result messages are returned. A
    /// first choice returns no messages: nobody learns anything until both
    /// choices are in.
    ///
    /// # Errors
    /// - [`MatchStateError::MatchFinished`]: the match is over
    /// - [`MatchStateError::UnknownSession`]: not a participant
    /// - [`MatchStateError::StaleRound`]: `round_number != current_round`
    /// - [`MatchStateError::AlreadyChosen`]: this side already chose
    ///
    /// On error the match is unchanged.
    pub fn submit_choice(
        &mut self,
        session_id: &SessionId,
        choice: Choice,
        round_number: u32,
    ) -> Result<Vec<Outbound>, MatchStateError> {
        if !self.status.is_active() {
            return Err(MatchStateError::MatchFinished(self.match_id));
        }
        let side = self
            .side_of(session_id)
            .ok_or_else(|| MatchStateError::UnknownSession(session_id.clone()))?;
        if round_number != self.current_round {
            return Err(MatchStateError::StaleRound {
                submitted: round_number,
                current: self.current_round,
            });
        }
        let slot = &mut self.pending[side.index()];
        if slot.is_some() {
            return Err(MatchStateError::AlreadyChosen {
                round: self.current_round,
            });
        }
        *slot = Some(choice);

        tracing::debug!(
            match_id = %self.match_id,
            %session_id,
            round = self.current_round,
            "choice recorded"
        );

        Ok(self.resolve_if_ready())
    }

    /// Ends the match early because `session_id` left.
    ///
    /// Returns an `error` message for the remaining side. Does nothing if
    /// the match is already finished.
    ///
    /// # Errors
    /// [`MatchStateError::UnknownSession`] if the session isn't a
    /// participant of an active match.
    pub fn abandon(
        &mut self,
        session_id: &SessionId,
    ) -> Result<Vec<Outbound>, MatchStateError> {
        if !self.status.is_active() {
            return Ok(Vec::new());
        }
        let side = self
            .side_of(session_id)
            .ok_or_else(|| MatchStateError::UnknownSession(session_id.clone()))?;

        self.status = MatchStatus::Finished(FinishReason::Abandoned);
        self.pending = [None, None];

        tracing::info!(
            match_id = %self.match_id,
            %session_id,
            round = self.current_round,
            "match abandoned"
        );

        Ok(vec![(
            side.other(),
            ServerMessage::error("Your opponent left the game"),
        )])
    }

    fn resolve_if_ready(&mut self) -> Vec<Outbound> {
        let (Some(choice_a), Some(choice_b)) = (self.pending[0], self.pending[1])
        else {
            return Vec::new();
        };

        let (points_a, points_b) = score(choice_a, choice_b);
        let round = Round {
            round_number: self.current_round,
            choice_a,
            choice_b,
            points_a,
            points_b,
        };

        self.scores[0] += points_a;
        self.scores[1] += points_b;
        self.pending = [None, None];
        self.history.push(round);

        let next_round = self.current_round + 1;
        let completed = self.current_round == self.total_rounds;
        if completed {
            self.status = MatchStatus::Finished(FinishReason::Completed);
        } else {
            self.current_round = next_round;
        }

        tracing::info!(
            match_id = %self.match_id,
            round = round.round_number,
            %choice_a,
            %choice_b,
            score_a = self.scores[0],
            score_b = self.scores[1],
            "round resolved"
        );

        let mut out: Vec<Outbound> = Side::BOTH
            .into_iter()
            .map(|side| {
                let report = self.report(side, &round, next_round);
                (side, ServerMessage::RoundResult(report))
            })
            .collect();

        if completed {
            tracing::info!(match_id = %self.match_id, "match completed");
            out.extend(Side::BOTH.into_iter().map(|side| {
                let msg = ServerMessage::GameEnd {
                    game_id: self.match_id,
                    final_score: FinalScore {
                        player: self.score(side),
                        opponent: self.score(side.other()),
                    },
                };
                (side, msg)
            }));
        }

        out
    }

    fn report(&self, side: Side, round: &Round, next_round: u32) -> RoundReport {
        let (own, opponent, points, opponent_round_points) = round.for_side(side);
        RoundReport {
            game_id: self.match_id,
            round_number: next_round,
            player_choice: own,
            opponent_choice: opponent,
            points,
            opponent_round_points,
            total_points: self.score(side),
            opponent_points: self.score(side.other()),
        }
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn participant(&self, side: Side) -> &Participant {
        &self.participants[side.index()]
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    /// Cumulative score for one side.
    pub fn score(&self, side: Side) -> u32 {
        self.scores[side.index()]
    }

    /// Whether `side` has already chosen in the current round.
    pub fn has_chosen(&self, side: Side) -> bool {
        self.pending[side.index()].is_some()
    }

    /// Resolved rounds, oldest first.
    pub fn history(&self) -> &[Round] {
        &self.history
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        !self.status.is_active()
    }
}

// =========================================================================
// Tests
// =========================================================================
