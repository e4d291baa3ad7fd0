//! GameConnection against a scripted WebSocket server.

use std::net::SocketAddr;

use dilemma_client::{ClientError, GameConnection, Phase};
use dilemma_protocol::Choice;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Scripted server
// =========================================================================

type ServerSocket = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

/// Accepts one connection and hands it to `script`.
async fn scripted_server<F, Fut>(script: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        script(ws).await;
    });
    (addr, task)
}

async fn send_json(ws: &mut ServerSocket, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

async fn recv_json(ws: &mut ServerSocket) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            _ => continue,
        }
    }
}

fn url(addr: SocketAddr) -> String {
    format!("ws://{addr}/ws")
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connection_plays_one_round_match() {
    let (addr, server) = scripted_server(|mut ws| async move {
        let join = recv_json(&mut ws).await;
        assert_eq!(join, json!({"type": "join_game", "username": "alice"}));

        send_json(&mut ws, json!({"type": "waiting", "message": "Waiting for opponent..."})).await;
        send_json(
            &mut ws,
            json!({"type": "game_start", "game_id": 1, "opponent": "bob", "total_rounds": 1}),
        )
        .await;

        let choice = recv_json(&mut ws).await;
        assert_eq!(
            choice,
            json!({"type": "make_choice", "choice": "defect", "round_number": 1})
        );

        send_json(
            &mut ws,
            json!({
                "type": "round_result",
                "game_id": 1,
                "round_number": 2,
                "player_choice": "defect",
                "opponent_choice": "cooperate",
                "points": 5,
                "opponent_round_points": 0,
                "total_points": 5,
                "opponent_points": 0
            }),
        )
        .await;
        send_json(
            &mut ws,
            json!({"type": "game_end", "game_id": 1, "final_score": {"player": 5, "opponent": 0}}),
        )
        .await;
        let _ = ws.close(None).await;
    })
    .await;

    let mut conn = GameConnection::connect(&url(addr), "alice").await.unwrap();
    assert_eq!(conn.view().phase, Phase::WaitingForMatch);

    let view = conn.next_update().await.unwrap().unwrap();
    assert_eq!(view.phase, Phase::WaitingForMatch);
    let view = conn.next_update().await.unwrap().unwrap();
    assert_eq!(view.phase, Phase::InRound);
    assert_eq!(view.opponent.as_deref(), Some("bob"));

    conn.submit(Choice::Defect).await.unwrap();
    assert!(matches!(
        conn.submit(Choice::Cooperate).await,
        Err(ClientError::AlreadySubmitted { round: 1 })
    ));

    let view = conn.next_update().await.unwrap().unwrap();
    assert_eq!(view.phase, Phase::RoundResolved);
    let view = conn.next_update().await.unwrap().unwrap();
    assert_eq!(view.phase, Phase::Finished);
    assert_eq!((view.own_score, view.opponent_score), (5, 0));

    assert!(conn.next_update().await.unwrap().is_none());
    assert_eq!(conn.view().phase, Phase::Finished);
    server.await.unwrap();
}

#[tokio::test]
async fn test_connection_malformed_frame_errors() {
    let (addr, server) = scripted_server(|mut ws| async move {
        let _join = recv_json(&mut ws).await;
        ws.send(Message::text("{not json".to_string())).await.unwrap();
        let _ = ws.next().await;
    })
    .await;

    let mut conn = GameConnection::connect(&url(addr), "alice").await.unwrap();
    let result = conn.next_update().await;

    assert!(matches!(result, Err(ClientError::Protocol(_))));
    assert_eq!(conn.view().phase, Phase::Errored);
    let _ = conn.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_connection_closed_mid_match_errors() {
    let (addr, server) = scripted_server(|mut ws| async move {
        let _join = recv_json(&mut ws).await;
        send_json(
            &mut ws,
            json!({"type": "game_start", "game_id": 3, "opponent": "bob", "total_rounds": 5}),
        )
        .await;
        let _ = ws.close(None).await;
    })
    .await;

    let mut conn = GameConnection::connect(&url(addr), "alice").await.unwrap();
    conn.next_update().await.unwrap();

    let result = conn.next_update().await;

    assert!(matches!(result, Err(ClientError::ConnectionClosed)));
    assert_eq!(conn.view().phase, Phase::Errored);
    server.await.unwrap();
}

#[tokio::test]
async fn test_connection_server_error_is_terminal() {
    let (addr, server) = scripted_server(|mut ws| async move {
        let _join = recv_json(&mut ws).await;
        send_json(
            &mut ws,
            json!({"type": "game_start", "game_id": 4, "opponent": "bob", "total_rounds": 5}),
        )
        .await;
        send_json(&mut ws, json!({"type": "error", "message": "Your opponent left the game"})).await;
        let _ = ws.next().await;
    })
    .await;

    let mut conn = GameConnection::connect(&url(addr), "alice").await.unwrap();
    conn.next_update().await.unwrap();

    let result = conn.next_update().await;

    assert!(matches!(result, Err(ClientError::Server(ref m)) if m == "Your opponent left the game"));
    assert!(conn.submit(Choice::Cooperate).await.is_err());
    let _ = conn.close().await;
    server.await.unwrap();
}
