//! Player session management for the dilemma server.
//!
//! A session is one connected participant. It is created when a
//! connection is accepted, gets a display name on `join_game`, and is
//! destroyed when the connection ends. There is no reconnection: a dropped
//! connection is a finished session.
//!
//! ```text
//! Match layer (above)    ← refers to sessions by SessionId + SessionSender
//!     ↕
//! Session layer (this crate)  ← issues ids, tracks who is connected
//!     ↕
//! Transport / Protocol (below)  ← ConnectionId, SessionId, ServerMessage
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{PlayerSession, SessionSender};
