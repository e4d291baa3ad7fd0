//! Error types for the protocol layer.
//!
//! A `ProtocolError` is always connection-scoped: it means one peer sent
//! (or we tried to send) something that isn't a valid message. It never
//! says anything about matchmaking or match state.

/// Errors that can occur while encoding, decoding, or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `type` tag,
    /// a missing field, or a choice outside the fixed choice set.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded, but its content breaks a protocol rule
    /// (for example an empty username).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
