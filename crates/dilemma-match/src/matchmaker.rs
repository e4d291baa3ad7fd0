//! Matchmaker: pairs waiting sessions into matches and tracks which
//! session is in which match.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dilemma_protocol::{MatchId, ServerMessage, SessionId};
use dilemma_session::{PlayerSession, SessionSender};

use crate::actor::{SeatKind, spawn_match};
use crate::{
    BotPlayer, MatchConfig, MatchHandle, MatchState, MatchmakingError, Participant,
};

/// Counter for generating unique match IDs.
static NEXT_MATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for match actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// What happened when a session asked to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// No partner yet; the session was told to wait.
    Waiting,
    /// Paired immediately; both players have been sent `game_start`.
    Matched(MatchId),
}

/// What [`Matchmaker::leave`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The session was neither waiting nor playing.
    NotPresent,
    /// The session was removed from the waiting queue.
    LeftQueue,
    /// The session's match was abandoned; the opponent was notified.
    AbandonedMatch(MatchId),
}

#[derive(Debug)]
struct WaitingSession {
    session_id: SessionId,
    display_name: String,
    sender: SessionSender,
    since: Instant,
}

/// Pairs sessions FIFO and indexes the matches it created.
///
/// A session is in at most one of: the waiting queue, one active match.
/// Finished matches are reaped lazily, so a player who saw `game_end` can
/// join again straight away.
pub struct Matchmaker {
    config: MatchConfig,
    waiting: VecDeque<WaitingSession>,
    session_matches: HashMap<SessionId, MatchHandle>,
    matches: HashMap<MatchId, MatchHandle>,
}

impl Matchmaker {
    /// Creates an empty matchmaker.
    ///
    /// # Errors
    /// [`MatchmakingError::InvalidConfig`] if `config` doesn't validate.
    pub fn new(config: MatchConfig) -> Result<Self, MatchmakingError> {
        config.validate()?;
        Ok(Self {
            config,
            waiting: VecDeque::new(),
            session_matches: HashMap::new(),
            matches: HashMap::new(),
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Puts a session in the queue under `display_name` and pairs it if
    /// someone is waiting.
    ///
    /// The earlier waiter takes side A. Only an unpaired session is sent
    /// `waiting`.
    ///
    /// # Errors
    /// `AlreadyInMatch` or `AlreadyWaiting` if the session is already
    /// spoken for. Neither changes any state.
    pub fn enqueue(
        &mut self,
        session: &PlayerSession,
        display_name: &str,
    ) -> Result<EnqueueOutcome, MatchmakingError> {
        self.reap_finished();

        let session_id = &session.session_id;
        if let Some(handle) = self.session_matches.get(session_id) {
            return Err(MatchmakingError::AlreadyInMatch(
                session_id.clone(),
                handle.match_id(),
            ));
        }
        if self.waiting.iter().any(|w| &w.session_id == session_id) {
            return Err(MatchmakingError::AlreadyWaiting(session_id.clone()));
        }

        // Anyone whose connection task is gone can't be matched.
        self.waiting.retain(|w| !w.sender.is_closed());

        self.waiting.push_back(WaitingSession {
            session_id: session_id.clone(),
            display_name: display_name.to_string(),
            sender: session.sender.clone(),
            since: Instant::now(),
        });

        if self.waiting.len() >= 2 {
            let (Some(a), Some(b)) = (self.waiting.pop_front(), self.waiting.pop_front())
            else {
                return Ok(EnqueueOutcome::Waiting);
            };
            let match_id = self.start_match(a, b);
            return Ok(EnqueueOutcome::Matched(match_id));
        }

        session.send(ServerMessage::waiting());
        tracing::debug!(%session_id, "session waiting for opponent");
        Ok(EnqueueOutcome::Waiting)
    }

    /// Seats a bot opposite `session_id` if it has been waiting for at
    /// least `fill_after`.
    ///
    /// Returns `None` when bots are disabled, the session has already
    /// been paired or has left, or its current wait is younger than
    /// `fill_after`. A timer armed by an earlier join may fire during a
    /// later wait; the age check keeps it from seating a bot early.
    pub fn fill_with_bot(&mut self, session_id: &SessionId) -> Option<MatchId> {
        let bot_config = self.config.bot.clone()?;
        let index = self.waiting.iter().position(|w| &w.session_id == session_id)?;
        if self.waiting[index].since.elapsed() < bot_config.fill_after {
            tracing::debug!(%session_id, "bot fill skipped, wait too young");
            return None;
        }
        let human = self.waiting.remove(index)?;
        if human.sender.is_closed() {
            return None;
        }

        let waited = human.since.elapsed();
        let bot = BotPlayer::participant(&bot_config);
        let match_id = self.next_match_id();
        let state = MatchState::new(
            match_id,
            Participant {
                session_id: human.session_id.clone(),
                display_name: human.display_name,
            },
            bot,
            self.config.total_rounds,
        );
        let seats = [
            SeatKind::Human(human.sender),
            SeatKind::Bot(BotPlayer::new(&bot_config)),
        ];
        let handle = spawn_match(state, seats, DEFAULT_CHANNEL_SIZE);
        self.session_matches.insert(human.session_id.clone(), handle.clone());
        self.matches.insert(match_id, handle);

        tracing::info!(
            %match_id,
            session_id = %human.session_id,
            waited_ms = waited.as_millis() as u64,
            "waiting session paired with bot"
        );
        Some(match_id)
    }

    /// Removes a session from the queue or abandons its match.
    ///
    /// Idempotent: a second call reports `NotPresent`.
    pub async fn leave(&mut self, session_id: &SessionId) -> LeaveOutcome {
        if let Some(index) = self.waiting.iter().position(|w| &w.session_id == session_id) {
            self.waiting.remove(index);
            tracing::debug!(%session_id, "session left the queue");
            return LeaveOutcome::LeftQueue;
        }

        let Some(handle) = self.session_matches.remove(session_id) else {
            return LeaveOutcome::NotPresent;
        };
        let match_id = handle.match_id();

        // The opponent can't keep playing alone; drop its mapping too.
        self.session_matches
            .retain(|_, other| other.match_id() != match_id);
        self.matches.remove(&match_id);

        if handle.is_finished() {
            return LeaveOutcome::NotPresent;
        }
        if let Err(e) = handle.abandon(session_id.clone()).await {
            tracing::warn!(%match_id, %session_id, error = %e, "abandon failed");
        }
        tracing::info!(%match_id, %session_id, "match abandoned");
        LeaveOutcome::AbandonedMatch(match_id)
    }

    /// The active match a session is playing, if any.
    pub fn match_for(&self, session_id: &SessionId) -> Option<MatchHandle> {
        self.session_matches
            .get(session_id)
            .filter(|h| !h.is_finished())
            .cloned()
    }

    /// Number of matches still in play.
    pub fn active_match_count(&mut self) -> usize {
        self.reap_finished();
        self.matches.len()
    }

    /// Number of sessions waiting for an opponent.
    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Handles to every match still in play.
    pub fn match_handles(&self) -> Vec<MatchHandle> {
        self.matches.values().cloned().collect()
    }

    /// Stops every match still in play and clears the indexes.
    ///
    /// Players in a match are told the server is shutting down. Returns
    /// how many matches were stopped.
    pub async fn shutdown_all(&mut self) -> usize {
        self.reap_finished();
        let handles: Vec<MatchHandle> = self.matches.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.shutdown().await;
        }
        self.session_matches.clear();
        self.waiting.clear();
        tracing::info!(stopped = handles.len(), "all matches stopped");
        handles.len()
    }

    /// Drops every index entry for matches that have ended.
    pub fn reap_finished(&mut self) {
        let before = self.matches.len();
        self.matches.retain(|_, h| !h.is_finished());
        self.session_matches.retain(|_, h| !h.is_finished());
        let reaped = before - self.matches.len();
        if reaped > 0 {
            tracing::debug!(reaped, "finished matches reaped");
        }
    }

    fn start_match(&mut self, a: WaitingSession, b: WaitingSession) -> MatchId {
        let match_id = self.next_match_id();
        let state = MatchState::new(
            match_id,
            Participant {
                session_id: a.session_id.clone(),
                display_name: a.display_name,
            },
            Participant {
                session_id: b.session_id.clone(),
                display_name: b.display_name,
            },
            self.config.total_rounds,
        );
        let seats = [SeatKind::Human(a.sender), SeatKind::Human(b.sender)];
        let handle = spawn_match(state, seats, DEFAULT_CHANNEL_SIZE);

        self.session_matches.insert(a.session_id.clone(), handle.clone());
        self.session_matches.insert(b.session_id.clone(), handle.clone());
        self.matches.insert(match_id, handle);

        tracing::info!(
            %match_id,
            player_a = %a.session_id,
            player_b = %b.session_id,
            "match created"
        );
        match_id
    }

    fn next_match_id(&self) -> MatchId {
        MatchId(NEXT_MATCH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dilemma_transport::ConnectionId;
    use tokio::sync::{Mutex, mpsc};

    use super::*;

    fn session(n: u64, name: &str) -> (PlayerSession, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = PlayerSession {
            session_id: SessionId::new(format!("s{n}")),
            display_name: Some(name.to_string()),
            connection_id: ConnectionId::new(n),
            sender: tx,
            connected_at: Instant::now(),
        };
        (session, rx)
    }

    fn matchmaker() -> Matchmaker {
        Matchmaker::new(MatchConfig::default()).unwrap()
    }

    #[test]
    fn test_new_zero_rounds_rejected() {
        let config = MatchConfig {
            total_rounds: 0,
            bot: None,
        };
        assert!(matches!(
            Matchmaker::new(config),
            Err(MatchmakingError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_enqueue_first_session_waits() {
        let mut mm = matchmaker();
        let (alice, mut rx) = session(1, "alice");

        let outcome = mm.enqueue(&alice, "alice").unwrap();

        assert_eq!(outcome, EnqueueOutcome::Waiting);
        assert_eq!(mm.waiting_count(), 1);
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Waiting { .. })));
    }

    #[tokio::test]
    async fn test_enqueue_second_session_pairs_fifo() {
        let mut mm = matchmaker();
        let (alice, mut alice_rx) = session(1, "alice");
        let (bob, mut bob_rx) = session(2, "bob");

        mm.enqueue(&alice, "alice").unwrap();
        let outcome = mm.enqueue(&bob, "bob").unwrap();

        let EnqueueOutcome::Matched(match_id) = outcome else {
            panic!("expected a match, got {outcome:?}");
        };
        assert_eq!(mm.waiting_count(), 0);
        assert_eq!(mm.active_match_count(), 1);

        // Alice got `waiting` then `game_start`; Bob only `game_start`.
        assert!(matches!(alice_rx.try_recv(), Ok(ServerMessage::Waiting { .. })));
        match alice_rx.try_recv() {
            Ok(ServerMessage::GameStart { game_id, opponent, total_rounds }) => {
                assert_eq!(game_id, match_id);
                assert_eq!(opponent, "bob");
                assert_eq!(total_rounds, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
        match bob_rx.try_recv() {
            Ok(ServerMessage::GameStart { opponent, .. }) => assert_eq!(opponent, "alice"),
            other => panic!("unexpected {other:?}"),
        }

        let info = mm.match_for(&alice.session_id).unwrap().get_info().await.unwrap();
        assert_eq!(info.sessions, [alice.session_id.clone(), bob.session_id.clone()]);
    }

    #[tokio::test]
    async fn test_enqueue_three_sessions_leaves_third_waiting() {
        let mut mm = matchmaker();
        let (a, _ra) = session(1, "a");
        let (b, _rb) = session(2, "b");
        let (c, _rc) = session(3, "c");

        mm.enqueue(&a, "a").unwrap();
        mm.enqueue(&b, "b").unwrap();
        assert_eq!(mm.enqueue(&c, "c").unwrap(), EnqueueOutcome::Waiting);

        assert!(mm.match_for(&a.session_id).is_some());
        assert!(mm.match_for(&c.session_id).is_none());
        assert_eq!(mm.waiting_count(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_while_waiting_returns_already_waiting() {
        let mut mm = matchmaker();
        let (alice, _rx) = session(1, "alice");

        mm.enqueue(&alice, "alice").unwrap();
        let result = mm.enqueue(&alice, "alice");

        assert!(matches!(result, Err(MatchmakingError::AlreadyWaiting(_))));
        assert_eq!(mm.waiting_count(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_while_in_match_returns_already_in_match() {
        let mut mm = matchmaker();
        let (alice, _ra) = session(1, "alice");
        let (bob, _rb) = session(2, "bob");
        mm.enqueue(&alice, "alice").unwrap();
        mm.enqueue(&bob, "bob").unwrap();

        let result = mm.enqueue(&alice, "alice");

        assert!(matches!(result, Err(MatchmakingError::AlreadyInMatch(_, _))));
        assert_eq!(mm.waiting_count(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_skips_closed_waiting_session() {
        let mut mm = matchmaker();
        let (ghost, ghost_rx) = session(1, "ghost");
        let (alice, _ra) = session(2, "alice");

        mm.enqueue(&ghost, "ghost").unwrap();
        drop(ghost_rx);

        assert_eq!(mm.enqueue(&alice, "alice").unwrap(), EnqueueOutcome::Waiting);
        assert_eq!(mm.waiting_count(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_uses_given_display_name() {
        let mut mm = matchmaker();
        let (alice, _ra) = session(1, "old-name");
        let (bob, mut bob_rx) = session(2, "bob");

        mm.enqueue(&alice, "alice").unwrap();
        mm.enqueue(&bob, "bob").unwrap();

        match bob_rx.try_recv() {
            Ok(ServerMessage::GameStart { opponent, .. }) => assert_eq!(opponent, "alice"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_leave_waiting_session_leaves_queue() {
        let mut mm = matchmaker();
        let (alice, _rx) = session(1, "alice");
        mm.enqueue(&alice, "alice").unwrap();

        assert_eq!(mm.leave(&alice.session_id).await, LeaveOutcome::LeftQueue);
        assert_eq!(mm.waiting_count(), 0);
        assert_eq!(mm.leave(&alice.session_id).await, LeaveOutcome::NotPresent);
    }

    #[tokio::test]
    async fn test_leave_mid_match_notifies_opponent() {
        let mut mm = matchmaker();
        let (alice, _ra) = session(1, "alice");
        let (bob, mut bob_rx) = session(2, "bob");
        mm.enqueue(&alice, "alice").unwrap();
        let EnqueueOutcome::Matched(match_id) = mm.enqueue(&bob, "bob").unwrap() else {
            panic!("expected a match");
        };

        let outcome = mm.leave(&alice.session_id).await;

        assert_eq!(outcome, LeaveOutcome::AbandonedMatch(match_id));
        assert!(mm.match_for(&bob.session_id).is_none());
        assert_eq!(mm.active_match_count(), 0);

        assert!(matches!(bob_rx.recv().await, Some(ServerMessage::GameStart { .. })));
        match bob_rx.recv().await {
            Some(ServerMessage::Error { message }) => {
                assert_eq!(message, "Your opponent left the game");
            }
            other => panic!("unexpected {other:?}"),
        }

        // Bob is free to queue again.
        assert_eq!(mm.enqueue(&bob, "bob").unwrap(), EnqueueOutcome::Waiting);
    }

    #[tokio::test]
    async fn test_shutdown_all_stops_matches_and_notifies_players() {
        let mut mm = matchmaker();
        let (alice, mut alice_rx) = session(1, "alice");
        let (bob, _bob_rx) = session(2, "bob");
        let (carol, _carol_rx) = session(3, "carol");
        mm.enqueue(&alice, "alice").unwrap();
        mm.enqueue(&bob, "bob").unwrap();
        mm.enqueue(&carol, "carol").unwrap();
        let handle = mm.match_for(&alice.session_id).unwrap();

        assert_eq!(mm.shutdown_all().await, 1);

        assert!(handle.is_finished());
        assert_eq!(mm.active_match_count(), 0);
        assert_eq!(mm.waiting_count(), 0);
        assert!(matches!(alice_rx.recv().await, Some(ServerMessage::Waiting { .. })));
        assert!(matches!(alice_rx.recv().await, Some(ServerMessage::GameStart { .. })));
        match alice_rx.recv().await {
            Some(ServerMessage::Error { message }) => {
                assert_eq!(message, crate::SHUTDOWN_MESSAGE);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fill_with_bot_disabled_returns_none() {
        let mut mm = matchmaker();
        let (alice, _rx) = session(1, "alice");
        mm.enqueue(&alice, "alice").unwrap();

        assert!(mm.fill_with_bot(&alice.session_id).is_none());
        assert_eq!(mm.waiting_count(), 1);
    }

    #[tokio::test]
    async fn test_fill_with_bot_seats_bot_opponent() {
        let config = MatchConfig {
            total_rounds: 3,
            bot: Some(crate::BotConfig {
                fill_after: Duration::from_millis(10),
                think_min: Duration::from_millis(1),
                think_max: Duration::from_millis(2),
                name_prefix: "Bot".into(),
            }),
        };
        let mut mm = Matchmaker::new(config).unwrap();
        let (alice, mut rx) = session(1, "alice");
        mm.enqueue(&alice, "alice").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let match_id = mm.fill_with_bot(&alice.session_id).unwrap();

        assert_eq!(mm.waiting_count(), 0);
        assert_eq!(mm.match_for(&alice.session_id).unwrap().match_id(), match_id);
        assert!(matches!(rx.recv().await, Some(ServerMessage::Waiting { .. })));
        match rx.recv().await {
            Some(ServerMessage::GameStart { opponent, total_rounds, .. }) => {
                assert!(opponent.starts_with("Bot_"));
                assert_eq!(total_rounds, 3);
            }
            other => panic!("unexpected {other:?}"),
        }

        // A second fill for the same session is a no-op.
        assert!(mm.fill_with_bot(&alice.session_id).is_none());
    }

    #[tokio::test]
    async fn test_fill_with_bot_before_fill_after_returns_none() {
        let config = MatchConfig {
            total_rounds: 3,
            bot: Some(crate::BotConfig {
                fill_after: Duration::from_secs(60),
                ..crate::BotConfig::default()
            }),
        };
        let mut mm = Matchmaker::new(config).unwrap();
        let (alice, _rx) = session(1, "alice");
        mm.enqueue(&alice, "alice").unwrap();

        assert!(mm.fill_with_bot(&alice.session_id).is_none());
        assert_eq!(mm.waiting_count(), 1);
        assert!(mm.match_for(&alice.session_id).is_none());
    }

    #[tokio::test]
    async fn test_enqueue_concurrent_sessions_each_in_one_match() {
        let mm = Arc::new(Mutex::new(matchmaker()));
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();

        for n in 0..50 {
            let name = format!("p{n}");
            let (s, rx) = session(n, &name);
            receivers.push(rx);
            let mm = Arc::clone(&mm);
            tasks.push(tokio::spawn(async move {
                mm.lock().await.enqueue(&s, &name).unwrap();
                s.session_id
            }));
        }

        let mut ids = Vec::new();
        for t in tasks {
            ids.push(t.await.unwrap());
        }

        let mut mm = mm.lock().await;
        assert_eq!(mm.waiting_count(), 0);
        assert_eq!(mm.active_match_count(), 25);

        let mut seen = std::collections::HashSet::new();
        for handle in mm.match_handles() {
            let info = handle.get_info().await.unwrap();
            for sid in info.sessions {
                assert!(seen.insert(sid), "session seated twice");
            }
        }
        assert_eq!(seen.len(), ids.len());
    }
}
