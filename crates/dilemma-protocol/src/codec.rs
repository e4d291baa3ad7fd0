//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The rest of the stack only sees [`Codec`]; the JSON implementation sits
//! behind the `json` feature. Inbound client messages go through
//! [`Codec::decode_client`], which also runs [`ClientMessage::validate`] so
//! a message is either fully accepted or rejected as a whole.

use serde::{Serialize, de::DeserializeOwned};

use crate::{ClientMessage, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes and validates one client → server message.
    ///
    /// # Errors
    /// Any decode error, or `ProtocolError::InvalidMessage` if the message
    /// decoded but failed validation.
    fn decode_client(&self, data: &[u8]) -> Result<ClientMessage, ProtocolError> {
        let msg: ClientMessage = self.decode(data)?;
        msg.validate()?;
        Ok(msg)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON is what the browser client speaks, so this is the codec the server
/// uses by default.
///
/// ## Example
///
/// ```rust
/// use dilemma_protocol::{Choice, ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let msg = codec
///     .decode_client(br#"{"type":"make_choice","choice":"defect"}"#)
///     .unwrap();
/// assert_eq!(
///     msg,
///     ClientMessage::MakeChoice { choice: Choice::Defect, round_number: None }
/// );
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
