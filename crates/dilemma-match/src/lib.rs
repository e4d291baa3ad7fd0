//! Match play and matchmaking for the dilemma server.
//!
//! ```text
//! Matchmaker ──pairs──→ MatchHandle ──commands──→ MatchActor (tokio task)
//!                                                    │ owns MatchState
//!                                                    └─→ SessionSender (per player)
//! ```
//!
//! [`MatchState`] is the pure, synchronous game: rounds, scoring, history.
//! Each match runs it inside its own actor task so that two submissions
//! for the same round are applied strictly one after the other. The
//! [`Matchmaker`] pairs waiting sessions FIFO and keeps the
//! session → match index.

mod actor;
mod bot;
mod config;
mod error;
mod matchmaker;
pub mod scoring;
mod state;

pub use actor::{MatchHandle, MatchInfo, SHUTDOWN_MESSAGE};
pub use bot::BotPlayer;
pub use config::{BotConfig, FinishReason, MatchConfig, MatchStatus};
pub use error::{MatchStateError, MatchmakingError};
pub use matchmaker::{EnqueueOutcome, LeaveOutcome, Matchmaker};
pub use scoring::score;
pub use state::{MatchState, Outbound, Participant, Round, Side};
