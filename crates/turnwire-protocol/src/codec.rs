//! Codec trait and implementations for serializing messages.
//!
//! The envelope layer is format-agnostic: anything that implements
//! [`Codec`] can put an [`Envelope`](crate::Envelope) on the wire.
//! [`JsonCodec`] is the readable default; [`BincodeCodec`] is the
//! compact binary form whose field-ordered encoding the invoke wire
//! contract is written against.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust types to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because the hub shares one codec instance
/// across every connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be
    /// represented in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] on malformed, truncated, or
    /// mistyped input. A decode failure condemns only the message, not
    /// the connection it arrived on.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`. Human-readable; the default for
/// development and for the login handshake, where inspectability beats
/// density.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(|e| ProtocolError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::Decode(Box::new(e)))
    }
}

// ---------------------------------------------------------------------------
// BincodeCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `bincode`: fields in declaration order, no
/// self-description. This is the codec that makes the
/// base-envelope-first layout of
/// [`SpokeInvoke`](crate::SpokeInvoke) observable on the wire, so its
/// encoding stability is covered by tests in `types.rs`.
#[cfg(feature = "bincode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

#[cfg(feature = "bincode")]
impl Codec for BincodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(value).map_err(|e| ProtocolError::Encode(e))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Decode(e))
    }
}
