//! `DilemmaServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → match.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use dilemma_match::{MatchConfig, Matchmaker};
use dilemma_protocol::JsonCodec;
use dilemma_session::SessionRegistry;
use dilemma_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{DilemmaError, StatsHandle};

/// Shared server state passed to each connection handler task.
///
/// The registry and the matchmaker are separate locks and no code path
/// holds both at once. Per-match state lives in match actors, not here.
pub(crate) struct ServerState {
    pub(crate) sessions: Mutex<SessionRegistry>,
    pub(crate) matchmaker: Mutex<Matchmaker>,
    pub(crate) codec: JsonCodec,
    pub(crate) config: MatchConfig,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,no_run
/// use dilemma::prelude::*;
///
/// # async fn run() -> Result<(), DilemmaError> {
/// let server = DilemmaServer::builder()
///     .bind("0.0.0.0:8000")
///     .match_config(MatchConfig { total_rounds: 10, ..MatchConfig::default() })
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct DilemmaServerBuilder {
    bind_addr: String,
    match_config: MatchConfig,
}

impl DilemmaServerBuilder {
    /// Creates a builder for `127.0.0.1:8000` with five-round matches.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            match_config: MatchConfig::default(),
        }
    }

    /// Sets the address to bind the server to. Port 0 picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every match is created with.
    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.match_config = config;
        self
    }

    /// Validates the config and binds the listener.
    ///
    /// # Errors
    /// `Matchmaking(InvalidConfig)` for an unplayable config, `Transport`
    /// if the address can't be bound.
    pub async fn build(self) -> Result<DilemmaServer, DilemmaError> {
        let matchmaker = Matchmaker::new(self.match_config.clone())?;
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionRegistry::new()),
            matchmaker: Mutex::new(matchmaker),
            codec: JsonCodec,
            config: self.match_config,
        });

        Ok(DilemmaServer { transport, state })
    }
}

impl Default for DilemmaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DilemmaServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl DilemmaServer {
    /// Creates a new builder.
    pub fn builder() -> DilemmaServerBuilder {
        DilemmaServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    ///
    /// # Errors
    /// `Transport` if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, DilemmaError> {
        Ok(self.transport.local_addr()?)
    }

    /// A handle for reading live counters. Stays valid after `run` starts.
    pub fn stats_handle(&self) -> StatsHandle {
        StatsHandle::new(Arc::clone(&self.state))
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted connection gets its own handler task. A failed
    /// accept is logged and the loop keeps going.
    pub async fn run(self) -> Result<(), DilemmaError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// On shutdown every match still in play is stopped and its players
    /// get an `error`. Connection tasks already running are left to
    /// finish on their own.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), DilemmaError> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, total_rounds = self.state.config.total_rounds, "dilemma server running");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting connections");
                    let stopped = self.state.matchmaker.lock().await.shutdown_all().await;
                    tracing::info!(stopped, "matches stopped");
                    return Ok(());
                }
            }
        }
    }
}
