//! Per-connection handler: session setup and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register a session → the connection now has a `SessionId`
//!   2. Loop: select between an inbound frame and an outbound message
//!      queued by the matchmaker or a match actor
//!   3. On exit, the guard leaves the queue or match and drops the session
//!
//! The select loop is the only writer to the socket, so messages reach the
//! client in the order they were queued.

use std::sync::Arc;
use std::time::Duration;

use dilemma_match::{EnqueueOutcome, MatchStateError};
use dilemma_protocol::{Choice, ClientMessage, Codec, ServerMessage, SessionId};
use dilemma_session::{SessionError, SessionSender};
use dilemma_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::DilemmaError;
use crate::server::ServerState;

/// Drop guard that tears down a session when the handler exits.
///
/// Leaving goes through the matchmaker, so an opponent mid-match is told
/// the match is over. `Drop` is synchronous, so the async part runs in a
/// spawned task.
struct SessionGuard {
    session_id: SessionId,
    state: Arc<ServerState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session_id = self.session_id.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let outcome = state.matchmaker.lock().await.leave(&session_id).await;
            let _ = state.sessions.lock().await.remove(&session_id);
            tracing::info!(%session_id, ?outcome, "session disconnected");
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), DilemmaError> {
    let conn_id = conn.id();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();

    // Register and arm the guard together; a failed registration needs
    // no cleanup.
    let session_id = {
        let mut sessions = state.sessions.lock().await;
        sessions.register(conn_id, outbound.clone())?.session_id.clone()
    };
    let _guard = SessionGuard {
        session_id: session_id.clone(),
        state: Arc::clone(&state),
    };

    tracing::info!(%conn_id, %session_id, "session connected");

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%session_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%session_id, error = %e, "recv error");
                        break;
                    }
                };
                handle_frame(&state, &session_id, &outbound, &data).await?;
            }
            Some(msg) = outbound_rx.recv() => {
                let bytes = state.codec.encode(&msg)?;
                conn.send(&bytes).await?;
            }
        }
    }

    // _guard drops here → leave + session removal fire.
    Ok(())
}

/// Decodes one frame and dispatches it.
///
/// A frame that doesn't decode gets an `error` reply; the connection
/// stays open.
async fn handle_frame(
    state: &Arc<ServerState>,
    session_id: &SessionId,
    outbound: &SessionSender,
    data: &[u8],
) -> Result<(), DilemmaError> {
    let msg = match state.codec.decode_client(data) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(%session_id, error = %e, "rejected client message");
            let _ = outbound.send(ServerMessage::error(e.to_string()));
            return Ok(());
        }
    };

    match msg {
        ClientMessage::JoinGame { username } => {
            join_game(state, session_id, outbound, &username).await
        }
        ClientMessage::MakeChoice {
            choice,
            round_number,
        } => {
            make_choice(state, session_id, outbound, choice, round_number).await;
            Ok(())
        }
    }
}

/// Queues the session under `username`.
///
/// The registry only records the name once the matchmaker accepts the
/// join, so a rejected join leaves the old name in place.
async fn join_game(
    state: &Arc<ServerState>,
    session_id: &SessionId,
    outbound: &SessionSender,
    username: &str,
) -> Result<(), DilemmaError> {
    let name = username.trim();
    let session = state
        .sessions
        .lock()
        .await
        .get(session_id)
        .cloned()
        .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;

    let outcome = state.matchmaker.lock().await.enqueue(&session, name);
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::debug!(%session_id, error = %e, "join rejected");
            let _ = outbound.send(ServerMessage::error(e.to_string()));
            return Ok(());
        }
    };

    state
        .sessions
        .lock()
        .await
        .set_display_name(session_id, name)?;

    match outcome {
        EnqueueOutcome::Waiting => {
            tracing::info!(%session_id, username = name, "session queued");
            if let Some(bot) = &state.config.bot {
                spawn_bot_fill(Arc::clone(state), session_id.clone(), bot.fill_after);
            }
        }
        EnqueueOutcome::Matched(match_id) => {
            tracing::info!(%session_id, %match_id, "session matched");
        }
    }
    Ok(())
}

async fn make_choice(
    state: &Arc<ServerState>,
    session_id: &SessionId,
    outbound: &SessionSender,
    choice: Choice,
    round_number: Option<u32>,
) {
    // Clone the handle out so the matchmaker lock isn't held while the
    // actor works.
    let handle = state.matchmaker.lock().await.match_for(session_id);

    let result = match handle {
        Some(handle) => {
            handle
                .submit_choice(session_id.clone(), choice, round_number)
                .await
        }
        None => Err(MatchStateError::UnknownSession(session_id.clone())),
    };

    if let Err(e) = result {
        tracing::debug!(%session_id, error = %e, "choice rejected");
        let _ = outbound.send(ServerMessage::error(e.to_string()));
    }
}

/// Seats a bot against `session_id` if it is still waiting after `after`.
///
/// The matchmaker checks the age of the current wait, so a timer left over
/// from an earlier join does nothing.
fn spawn_bot_fill(state: Arc<ServerState>, session_id: SessionId, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let filled = state.matchmaker.lock().await.fill_with_bot(&session_id);
        if let Some(match_id) = filled {
            tracing::info!(%session_id, %match_id, "bot seated");
        }
    });
}
