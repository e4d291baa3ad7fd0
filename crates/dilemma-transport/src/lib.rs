//! Network layer of the dilemma server.
//!
//! A [`Transport`] hands out [`Connection`]s; a connection moves whole
//! JSON frames as `Vec<u8>`. WebSocket upgrades, text framing and
//! ping/pong replies never leave this crate.
//!
//! # Feature Flags
//!
//! - `websocket` (default): the `tokio-tungstenite` listener the browser
//!   client connects to

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Number the listener gives each accepted socket.
///
/// Only used for logs and the registry's one-session-per-socket check.
/// Players are addressed by their server-issued session id instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener the server's accept loop pulls players from.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves once the next client has finished its handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The bound address; with port 0 this is where the real port shows up.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// One player's socket for the whole session.
///
/// The connection handler polls `recv` and `send` from the same
/// `tokio::select!`, so a pending `recv` must not block a `send`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one JSON frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// The next JSON frame, or `Ok(None)` once the client closed cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
