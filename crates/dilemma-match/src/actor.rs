//! Match actor: one Tokio task per match, owning its [`MatchState`].
//!
//! Commands arrive over an mpsc channel and are applied one at a time, so
//! the "both choices present → resolve" check-and-act can never interleave
//! with another submission. Outbound messages go straight to each human
//! seat's [`SessionSender`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dilemma_protocol::{Choice, MatchId, ServerMessage, SessionId};
use dilemma_session::SessionSender;
use tokio::sync::{mpsc, oneshot};

use crate::bot::BotPlayer;
use crate::state::{MatchState, Outbound, Side};
use crate::{MatchStateError, MatchStatus};

/// Sent to both players when the server stops mid-match.
pub const SHUTDOWN_MESSAGE: &str = "Server is shutting down";

/// Who controls a seat.
#[derive(Debug, Clone)]
pub(crate) enum SeatKind {
    /// A connected player; results are pushed to their connection.
    Human(SessionSender),
    /// A server-side bot; it submits through the match's own channel.
    Bot(BotPlayer),
}

/// Commands sent to a match actor.
pub(crate) enum MatchCommand {
    Submit {
        session_id: SessionId,
        choice: Choice,
        /// `None` means "whatever round is current".
        round_number: Option<u32>,
        reply: oneshot::Sender<Result<(), MatchStateError>>,
    },
    Abandon {
        session_id: SessionId,
        reply: oneshot::Sender<Result<(), MatchStateError>>,
    },
    GetInfo {
        reply: oneshot::Sender<MatchInfo>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A snapshot of a match, for stats and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfo {
    pub match_id: MatchId,
    pub status: MatchStatus,
    pub current_round: u32,
    pub total_rounds: u32,
    pub scores: [u32; 2],
    pub rounds_played: usize,
    pub sessions: [SessionId; 2],
}

/// Handle to a running match actor.
///
/// Cheap to clone. The matchmaker keeps one per match and hands clones to
/// connection handlers.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    sender: mpsc::Sender<MatchCommand>,
    /// Set by the actor before it sends the final messages of a match,
    /// so a player who has seen `game_end` can never see this as active.
    finished: Arc<AtomicBool>,
}

impl MatchHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Returns `true` once the match has ended or its actor has stopped.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire) || self.sender.is_closed()
    }

    /// Submits a choice and waits for the actor to accept or reject it.
    ///
    /// # Errors
    /// Any [`MatchStateError`]; a stopped actor reports `MatchFinished`.
    pub async fn submit_choice(
        &self,
        session_id: SessionId,
        choice: Choice,
        round_number: Option<u32>,
    ) -> Result<(), MatchStateError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Submit {
            session_id,
            choice,
            round_number,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.gone())?
    }

    /// Tells the match that `session_id` left.
    ///
    /// # Errors
    /// `UnknownSession` if the session isn't seated here. Abandoning a
    /// finished match is not an error.
    pub async fn abandon(&self, session_id: SessionId) -> Result<(), MatchStateError> {
        let (reply, rx) = oneshot::channel();
        match self
            .send(MatchCommand::Abandon { session_id, reply })
            .await
        {
            Ok(()) => rx.await.unwrap_or(Ok(())),
            // The actor only stops once the match is over.
            Err(_) => Ok(()),
        }
    }

    /// Requests a snapshot of the match.
    ///
    /// # Errors
    /// `MatchFinished` if the actor has already stopped.
    pub async fn get_info(&self) -> Result<MatchInfo, MatchStateError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::GetInfo { reply }).await?;
        rx.await.map_err(|_| self.gone())
    }

    /// Stops the actor, telling both players the server is going away.
    ///
    /// Returns once the actor has flagged the match as finished. A match
    /// that already ended is left alone.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(MatchCommand::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn send(&self, cmd: MatchCommand) -> Result<(), MatchStateError> {
        self.sender.send(cmd).await.map_err(|_| self.gone())
    }

    fn gone(&self) -> MatchStateError {
        MatchStateError::MatchFinished(self.match_id)
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct MatchActor {
    state: MatchState,
    seats: [SeatKind; 2],
    finished: Arc<AtomicBool>,
    receiver: mpsc::Receiver<MatchCommand>,
    /// Weak so the actor's own sender doesn't keep its channel open.
    commands: mpsc::WeakSender<MatchCommand>,
}

impl MatchActor {
    async fn run(mut self) {
        let match_id = self.state.match_id();
        tracing::info!(%match_id, "match actor started");

        self.schedule_bots();

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                MatchCommand::Submit {
                    session_id,
                    choice,
                    round_number,
                    reply,
                } => {
                    let round = round_number.unwrap_or(self.state.current_round());
                    match self.state.submit_choice(&session_id, choice, round) {
                        Ok(out) => {
                            let resolved = !out.is_empty();
                            self.deliver(out);
                            let _ = reply.send(Ok(()));
                            if resolved {
                                self.schedule_bots();
                            }
                        }
                        Err(e) => {
                            tracing::debug!(
                                %match_id,
                                %session_id,
                                error = %e,
                                "choice rejected"
                            );
                            let _ = reply.send(Err(e));
                        }
                    }
                }
                MatchCommand::Abandon { session_id, reply } => {
                    let result = self.state.abandon(&session_id).map(|out| {
                        self.deliver(out);
                    });
                    let _ = reply.send(result);
                }
                MatchCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
                MatchCommand::Shutdown { reply } => {
                    tracing::info!(%match_id, "match shutting down");
                    self.finished.store(true, Ordering::Release);
                    for seat in &self.seats {
                        if let SeatKind::Human(tx) = seat {
                            let _ = tx.send(ServerMessage::error(SHUTDOWN_MESSAGE));
                        }
                    }
                    let _ = reply.send(());
                    break;
                }
            }

            if self.state.is_finished() {
                break;
            }
        }

        tracing::info!(%match_id, status = %self.state.status(), "match actor stopped");
    }

    /// Routes messages to human seats. Flags the handle as finished
    /// first if these are the match's last messages.
    fn deliver(&self, out: Vec<Outbound>) {
        if self.state.is_finished() {
            self.finished.store(true, Ordering::Release);
        }
        for (side, msg) in out {
            if let SeatKind::Human(tx) = &self.seats[side.index()] {
                // A closed receiver means that player already left; their
                // own leave will abandon the match.
                let _ = tx.send(msg);
            }
        }
    }

    /// Starts a think timer for every bot that hasn't chosen this round.
    fn schedule_bots(&self) {
        if self.state.is_finished() {
            return;
        }
        for side in Side::BOTH {
            let SeatKind::Bot(bot) = &self.seats[side.index()] else {
                continue;
            };
            if self.state.has_chosen(side) {
                continue;
            }
            let Some(commands) = self.commands.upgrade() else {
                return;
            };
            let session_id = self.state.participant(side).session_id.clone();
            let round = self.state.current_round();
            let choice = bot.choose();
            let delay = bot.think_time();

            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let (reply, _rx) = oneshot::channel();
                let _ = commands
                    .send(MatchCommand::Submit {
                        session_id,
                        choice,
                        round_number: Some(round),
                        reply,
                    })
                    .await;
            });
        }
    }

    fn info(&self) -> MatchInfo {
        MatchInfo {
            match_id: self.state.match_id(),
            status: self.state.status(),
            current_round: self.state.current_round(),
            total_rounds: self.state.total_rounds(),
            scores: [self.state.score(Side::A), self.state.score(Side::B)],
            rounds_played: self.state.history().len(),
            sessions: [
                self.state.participant(Side::A).session_id.clone(),
                self.state.participant(Side::B).session_id.clone(),
            ],
        }
    }
}

/// Announces the match to both seats, then spawns its actor.
///
/// `game_start` is queued on each player's channel before this returns,
/// so it always precedes any `round_result` for the same match.
pub(crate) fn spawn_match(
    state: MatchState,
    seats: [SeatKind; 2],
    channel_size: usize,
) -> MatchHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let finished = Arc::new(AtomicBool::new(false));
    let match_id = state.match_id();

    let actor = MatchActor {
        commands: tx.downgrade(),
        finished: Arc::clone(&finished),
        receiver: rx,
        seats,
        state,
    };
    actor.deliver(actor.state.start_messages());

    tokio::spawn(actor.run());

    MatchHandle {
        match_id,
        sender: tx,
        finished,
    }
}
