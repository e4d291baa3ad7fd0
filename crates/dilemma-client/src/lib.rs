//! Client side of the dilemma protocol.
//!
//! [`ClientMachine`] is the protocol interpreter: a pure state machine a
//! UI can drive directly. [`GameConnection`] wires it to a WebSocket.
//!
//! ```rust,no_run
//! use dilemma_client::{GameConnection, Phase};
//! use dilemma_protocol::Choice;
//!
//! # async fn run() -> Result<(), dilemma_client::ClientError> {
//! let mut conn = GameConnection::connect("ws://127.0.0.1:8000/ws", "alice").await?;
//! while let Some(view) = conn.next_update().await? {
//!     let phase = view.phase;
//!     match phase {
//!         Phase::InRound => conn.submit(Choice::Cooperate).await?,
//!         Phase::Finished => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod connection;
mod error;
mod machine;
mod view;

pub use connection::GameConnection;
pub use error::ClientError;
pub use machine::ClientMachine;
pub use view::{ClientView, Phase, RoundRecord};
