//! A WebSocket connection to a dilemma server, driving a [`ClientMachine`].

use dilemma_protocol::{Choice, ClientMessage, Codec, JsonCodec, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::{ClientError, ClientMachine, ClientView, Phase};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One player's connection.
///
/// Every frame in either direction goes through the machine, so
/// [`view`](Self::view) is always the state implied by what was sent and
/// received so far.
pub struct GameConnection {
    socket: WsStream,
    machine: ClientMachine,
    codec: JsonCodec,
}

impl GameConnection {
    /// Connects to `url` (e.g. `ws://127.0.0.1:8000/ws`) and joins the
    /// matchmaking queue as `username`.
    ///
    /// # Errors
    /// `WebSocket` if the handshake fails; `Protocol` if the join can't be
    /// encoded.
    pub async fn connect(url: &str, username: impl Into<String>) -> Result<Self, ClientError> {
        let (socket, _response) = connect_async(url).await?;
        tracing::info!(%url, "connected");

        let mut conn = Self {
            socket,
            machine: ClientMachine::new(username),
            codec: JsonCodec,
        };
        let join = conn.machine.on_connected()?;
        conn.send(&join).await?;
        Ok(conn)
    }

    /// Submits a choice for the current round.
    ///
    /// # Errors
    /// Whatever the machine rejects (see
    /// [`ClientMachine::submit_choice`]), or a send failure.
    pub async fn submit(&mut self, choice: Choice) -> Result<(), ClientError> {
        let msg = self.machine.submit_choice(choice)?;
        self.send(&msg).await
    }

    /// Waits for the next server message and applies it.
    ///
    /// Returns `Ok(None)` once the server has closed the connection after
    /// the match finished.
    ///
    /// # Errors
    /// A decode failure, a server `error`, an out-of-place message, or
    /// the connection dropping early. All of these leave the view
    /// `Errored`.
    pub async fn next_update(&mut self) -> Result<Option<&ClientView>, ClientError> {
        loop {
            let frame = match self.socket.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.machine.on_transport_error(&e);
                    return Err(e.into());
                }
                None => return self.closed(false),
            };

            let msg: ServerMessage = match frame {
                Message::Text(text) => self.decode(text.as_bytes())?,
                Message::Binary(data) => self.decode(&data)?,
                Message::Close(_) => return self.closed(true),
                // Ping/pong are answered by tungstenite.
                _ => continue,
            };

            tracing::debug!(kind = msg.kind(), "server message");
            self.machine.handle_message(msg)?;
            return Ok(Some(self.machine.view()));
        }
    }

    pub fn view(&self) -> &ClientView {
        self.machine.view()
    }

    /// Closes the connection. Closing before the match finished counts as
    /// leaving it.
    ///
    /// # Errors
    /// `WebSocket` if the close frame can't be sent.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.machine.on_closed(true);
        self.socket.close(None).await?;
        Ok(())
    }

    async fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let bytes = self.codec.encode(msg)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if let Err(e) = self.socket.send(Message::text(text)).await {
            self.machine.on_transport_error(&e);
            return Err(e.into());
        }
        Ok(())
    }

    fn decode(&mut self, data: &[u8]) -> Result<ServerMessage, ClientError> {
        self.codec.decode(data).map_err(|e| {
            self.machine.on_protocol_error(&e);
            ClientError::from(e)
        })
    }

    fn closed(&mut self, clean: bool) -> Result<Option<&ClientView>, ClientError> {
        self.machine.on_closed(clean);
        if self.machine.phase() == Phase::Finished {
            Ok(None)
        } else {
            Err(ClientError::ConnectionClosed)
        }
    }
}
