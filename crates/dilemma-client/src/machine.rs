//! The client state machine.
//!
//! Synchronous and single-threaded: it takes one inbound
//! [`ServerMessage`] or one local action at a time and is the only thing
//! that writes the [`ClientView`]. It does no I/O; the caller sends the
//! [`ClientMessage`]s it returns.
//!
//! ```text
//! Connecting ──connect──→ WaitingForMatch ──game_start──→ InRound
//!                                                          │   ▲
//!                                                   submit │   │ round_result
//!                                                          ▼   │ (more rounds)
//!                                                  WaitingForOpponent
//!                                                          │ round_result (last)
//!                                                          ▼
//!                                 Finished ←──game_end── RoundResolved
//!
//! any phase ──error / bad message / transport failure──→ Errored
//! ```

use std::fmt::Display;

use dilemma_protocol::{Choice, ClientMessage, ProtocolError, RoundReport, ServerMessage};

use crate::{ClientError, ClientView, Phase, RoundRecord};

/// Interprets the dilemma protocol for one player.
#[derive(Debug, Clone)]
pub struct ClientMachine {
    username: String,
    view: ClientView,
}

impl ClientMachine {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            view: ClientView::default(),
        }
    }

    pub fn view(&self) -> &ClientView {
        &self.view
    }

    pub fn phase(&self) -> Phase {
        self.view.phase
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The connection is up. Returns the `join_game` to send.
    ///
    /// # Errors
    /// `InvalidAction` unless the machine is in `Connecting`.
    pub fn on_connected(&mut self) -> Result<ClientMessage, ClientError> {
        self.require(Phase::Connecting, "join")?;
        self.view.phase = Phase::WaitingForMatch;
        Ok(ClientMessage::JoinGame {
            username: self.username.clone(),
        })
    }

    /// The player picked a choice. Returns the `make_choice` to send.
    ///
    /// # Errors
    /// `AlreadySubmitted` while waiting for the opponent, `InvalidAction`
    /// in any other phase but `InRound`. Neither changes the view.
    pub fn submit_choice(&mut self, choice: Choice) -> Result<ClientMessage, ClientError> {
        match self.view.phase {
            Phase::InRound => {
                self.view.last_choice = Some(choice);
                self.view.phase = Phase::WaitingForOpponent;
                Ok(ClientMessage::MakeChoice {
                    choice,
                    round_number: Some(self.view.round_number),
                })
            }
            Phase::WaitingForOpponent => Err(ClientError::AlreadySubmitted {
                round: self.view.round_number,
            }),
            phase => Err(ClientError::InvalidAction {
                action: "submit a choice",
                phase,
            }),
        }
    }

    /// Applies one message from the server.
    ///
    /// Messages arriving after the machine has finished or errored are
    /// ignored.
    ///
    /// # Errors
    /// `Server` for an `error` message and `UnexpectedMessage` for a
    /// message that is out of place. Both leave the machine `Errored`.
    pub fn handle_message(&mut self, msg: ServerMessage) -> Result<(), ClientError> {
        let phase = self.view.phase;
        if phase.is_terminal() {
            tracing::debug!(kind = msg.kind(), %phase, "message ignored");
            return Ok(());
        }

        match msg {
            ServerMessage::Waiting { .. } if phase == Phase::WaitingForMatch => Ok(()),

            ServerMessage::GameStart {
                game_id,
                opponent,
                total_rounds,
            } if phase == Phase::WaitingForMatch => {
                self.view = ClientView {
                    phase: Phase::InRound,
                    game_id: Some(game_id),
                    round_number: 1,
                    total_rounds,
                    opponent: Some(opponent),
                    ..ClientView::default()
                };
                tracing::info!(%game_id, total_rounds, "match started");
                Ok(())
            }

            ServerMessage::RoundResult(report)
                if phase == Phase::WaitingForOpponent && self.is_next_round(&report) =>
            {
                self.apply_round(report);
                Ok(())
            }

            ServerMessage::GameEnd {
                game_id,
                final_score,
            } if phase == Phase::RoundResolved && self.view.game_id == Some(game_id) => {
                self.view.own_score = final_score.player;
                self.view.opponent_score = final_score.opponent;
                self.view.phase = Phase::Finished;
                tracing::info!(
                    %game_id,
                    own = final_score.player,
                    opponent = final_score.opponent,
                    "match finished"
                );
                Ok(())
            }

            ServerMessage::Error { message } => {
                self.fail(message.clone());
                Err(ClientError::Server(message))
            }

            other => {
                let kind = other.kind();
                self.fail(format!("unexpected `{kind}` message while {phase}"));
                Err(ClientError::UnexpectedMessage {
                    message: kind,
                    phase,
                })
            }
        }
    }

    /// An inbound frame couldn't be decoded.
    pub fn on_protocol_error(&mut self, err: &ProtocolError) {
        self.fail(err.to_string());
    }

    /// The transport failed.
    pub fn on_transport_error(&mut self, err: impl Display) {
        self.fail(err.to_string());
    }

    /// The connection closed. Only a clean close after `Finished` is
    /// expected; anything else is an error.
    pub fn on_closed(&mut self, clean: bool) {
        if self.view.phase == Phase::Finished && clean {
            return;
        }
        if self.view.phase != Phase::Errored {
            self.fail("connection closed".to_string());
        }
    }

    /// Starts over, ready for a new connection. History and scores are
    /// discarded.
    pub fn reset(&mut self) {
        self.view = ClientView::default();
    }

    fn is_next_round(&self, report: &RoundReport) -> bool {
        self.view.game_id == Some(report.game_id)
            && report.round_number == self.view.round_number + 1
    }

    fn apply_round(&mut self, report: RoundReport) {
        let view = &mut self.view;
        view.history.push(RoundRecord {
            round_number: view.round_number,
            own_choice: report.player_choice,
            opponent_choice: report.opponent_choice,
            own_points: report.points,
            opponent_points: report.opponent_round_points,
        });
        view.own_score = report.total_points;
        view.opponent_score = report.opponent_points;
        view.round_number = report.round_number;
        view.last_choice = None;
        view.phase = if report.round_number > view.total_rounds {
            Phase::RoundResolved
        } else {
            Phase::InRound
        };
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(phase = %self.view.phase, error = %message, "client errored");
        self.view.phase = Phase::Errored;
        self.view.last_error = Some(message);
    }

    fn require(&self, phase: Phase, action: &'static str) -> Result<(), ClientError> {
        if self.view.phase == phase {
            Ok(())
        } else {
            Err(ClientError::InvalidAction {
                action,
                phase: self.view.phase,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use dilemma_protocol::{FinalScore, MatchId};

    use super::*;

    use dilemma_protocol::Choice::{Cooperate as C, Defect as D};

    fn started(total_rounds: u32) -> ClientMachine {
        let mut m = ClientMachine::new("alice");
        m.on_connected().unwrap();
        m.handle_message(ServerMessage::waiting()).unwrap();
        m.handle_message(ServerMessage::GameStart {
            game_id: MatchId(7),
            opponent: "bob".into(),
            total_rounds,
        })
        .unwrap();
        m
    }

    fn result(round_number: u32, own: Choice, opp: Choice, totals: (u32, u32)) -> ServerMessage {
        let (points, opponent_round_points) = match (own, opp) {
            (C, C) => (3, 3),
            (C, D) => (0, 5),
            (D, C) => (5, 0),
            (D, D) => (1, 1),
        };
        ServerMessage::RoundResult(RoundReport {
            game_id: MatchId(7),
            round_number,
            player_choice: own,
            opponent_choice: opp,
            points,
            opponent_round_points,
            total_points: totals.0,
            opponent_points: totals.1,
        })
    }

    #[test]
    fn test_on_connected_sends_join_and_waits() {
        let mut m = ClientMachine::new("alice");
        let msg = m.on_connected().unwrap();

        assert_eq!(msg, ClientMessage::JoinGame { username: "alice".into() });
        assert_eq!(m.phase(), Phase::WaitingForMatch);
    }

    #[test]
    fn test_on_connected_twice_rejected() {
        let mut m = ClientMachine::new("alice");
        m.on_connected().unwrap();

        assert!(matches!(m.on_connected(), Err(ClientError::InvalidAction { .. })));
        assert_eq!(m.phase(), Phase::WaitingForMatch);
    }

    #[test]
    fn test_game_start_enters_round_one() {
        let m = started(5);
        let view = m.view();

        assert_eq!(view.phase, Phase::InRound);
        assert_eq!(view.round_number, 1);
        assert_eq!(view.total_rounds, 5);
        assert_eq!(view.opponent.as_deref(), Some("bob"));
        assert_eq!((view.own_score, view.opponent_score), (0, 0));
    }

    #[test]
    fn test_submit_choice_sends_round_number() {
        let mut m = started(5);

        let msg = m.submit_choice(D).unwrap();

        assert_eq!(
            msg,
            ClientMessage::MakeChoice { choice: D, round_number: Some(1) }
        );
        assert_eq!(m.phase(), Phase::WaitingForOpponent);
        assert_eq!(m.view().last_choice, Some(D));
    }

    #[test]
    fn test_submit_choice_twice_rejected() {
        let mut m = started(5);
        m.submit_choice(C).unwrap();

        let result = m.submit_choice(D);

        assert!(matches!(result, Err(ClientError::AlreadySubmitted { round: 1 })));
        assert_eq!(m.view().last_choice, Some(C));
        assert_eq!(m.phase(), Phase::WaitingForOpponent);
    }

    #[test]
    fn test_submit_choice_before_match_rejected() {
        let mut m = ClientMachine::new("alice");
        m.on_connected().unwrap();

        assert!(matches!(m.submit_choice(C), Err(ClientError::InvalidAction { .. })));
        assert_eq!(m.phase(), Phase::WaitingForMatch);
    }

    #[test]
    fn test_round_result_advances_round() {
        let mut m = started(5);
        m.submit_choice(C).unwrap();

        m.handle_message(result(2, C, D, (0, 5))).unwrap();

        let view = m.view();
        assert_eq!(view.phase, Phase::InRound);
        assert_eq!(view.round_number, 2);
        assert_eq!((view.own_score, view.opponent_score), (0, 5));
        assert_eq!(view.last_choice, None);
        assert_eq!(
            view.history,
            vec![RoundRecord {
                round_number: 1,
                own_choice: C,
                opponent_choice: D,
                own_points: 0,
                opponent_points: 5,
            }]
        );
    }

    #[test]
    fn test_full_match_finishes() {
        let mut m = started(2);
        m.submit_choice(C).unwrap();
        m.handle_message(result(2, C, C, (3, 3))).unwrap();
        m.submit_choice(D).unwrap();
        m.handle_message(result(3, D, C, (8, 3))).unwrap();
        assert_eq!(m.phase(), Phase::RoundResolved);
        assert!(matches!(m.submit_choice(C), Err(ClientError::InvalidAction { .. })));

        m.handle_message(ServerMessage::GameEnd {
            game_id: MatchId(7),
            final_score: FinalScore { player: 8, opponent: 3 },
        })
        .unwrap();

        let view = m.view();
        assert_eq!(view.phase, Phase::Finished);
        assert_eq!((view.own_score, view.opponent_score), (8, 3));
        assert_eq!(view.history.len(), 2);
        assert!(matches!(m.submit_choice(C), Err(ClientError::InvalidAction { .. })));
    }

    #[test]
    fn test_duplicate_round_result_errors() {
        let mut m = started(5);
        m.submit_choice(C).unwrap();
        m.handle_message(result(2, C, C, (3, 3))).unwrap();
        m.submit_choice(C).unwrap();

        let err = m.handle_message(result(2, C, C, (3, 3))).unwrap_err();

        assert!(matches!(err, ClientError::UnexpectedMessage { message: "round_result", .. }));
        assert_eq!(m.phase(), Phase::Errored);
        assert_eq!(m.view().history.len(), 1);
    }

    #[test]
    fn test_round_result_before_game_start_errors() {
        let mut m = ClientMachine::new("alice");
        m.on_connected().unwrap();

        let err = m.handle_message(result(2, C, C, (3, 3))).unwrap_err();

        assert!(matches!(
            err,
            ClientError::UnexpectedMessage { phase: Phase::WaitingForMatch, .. }
        ));
        assert_eq!(m.phase(), Phase::Errored);
        assert!(m.view().last_error.is_some());
    }

    #[test]
    fn test_server_error_is_terminal() {
        let mut m = started(5);

        let err = m
            .handle_message(ServerMessage::error("Your opponent left the game"))
            .unwrap_err();

        assert!(matches!(err, ClientError::Server(_)));
        assert_eq!(m.phase(), Phase::Errored);
        assert_eq!(m.view().last_error.as_deref(), Some("Your opponent left the game"));
        assert!(m.submit_choice(C).is_err());
    }

    #[test]
    fn test_messages_after_errored_are_ignored() {
        let mut m = started(5);
        m.on_transport_error("reset by peer");

        m.handle_message(ServerMessage::waiting()).unwrap();

        assert_eq!(m.phase(), Phase::Errored);
        assert_eq!(m.view().last_error.as_deref(), Some("reset by peer"));
    }

    #[test]
    fn test_on_closed_before_finish_errors() {
        let mut m = started(5);
        m.on_closed(true);
        assert_eq!(m.phase(), Phase::Errored);
    }

    #[test]
    fn test_on_closed_after_finish_keeps_finished() {
        let mut m = started(1);
        m.submit_choice(D).unwrap();
        m.handle_message(result(2, D, D, (1, 1))).unwrap();
        m.handle_message(ServerMessage::GameEnd {
            game_id: MatchId(7),
            final_score: FinalScore { player: 1, opponent: 1 },
        })
        .unwrap();

        m.on_closed(true);

        assert_eq!(m.phase(), Phase::Finished);
    }

    #[test]
    fn test_on_protocol_error_errors() {
        let mut m = started(5);
        m.on_protocol_error(&ProtocolError::InvalidMessage("bad".into()));
        assert_eq!(m.phase(), Phase::Errored);
    }

    #[test]
    fn test_reset_returns_to_connecting() {
        let mut m = started(5);
        m.on_closed(false);

        m.reset();

        assert_eq!(m.view(), &ClientView::default());
        assert!(m.on_connected().is_ok());
    }
}
