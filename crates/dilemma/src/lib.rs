//! # Dilemma
//!
//! Server for two-player iterated Prisoner's Dilemma matches.
//!
//! Players connect over WebSocket, send `join_game`, and are paired
//! first-come first-served. Each match runs in its own actor task, which
//! collects both choices for a round, scores it, and reports the result
//! to both sides until the configured number of rounds is played.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dilemma::prelude::*;
//!
//! # async fn run() -> Result<(), DilemmaError> {
//! let server = DilemmaServer::builder().bind("0.0.0.0:8000").build().await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;
mod stats;

pub use error::DilemmaError;
pub use server::{DilemmaServer, DilemmaServerBuilder};
pub use stats::{ServerStats, StatsHandle};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{DilemmaError, DilemmaServer, DilemmaServerBuilder, ServerStats, StatsHandle};
    pub use dilemma_match::{BotConfig, MatchConfig};
    pub use dilemma_protocol::{Choice, ClientMessage, ServerMessage};
}
