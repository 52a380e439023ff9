//! Error types for the protocol layer.

/// Source error boxed behind the codec seam, so JSON and bincode
/// failures surface uniformly.
type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] CodecError),

    /// Deserialization failed: malformed, truncated, or mistyped bytes.
    /// Terminates only the offending message — the connection stays up
    /// unless the stream itself is unreadable.
    #[error("decode failed: {0}")]
    Decode(#[source] CodecError),

    /// The message decoded cleanly but violates protocol rules — e.g. an
    /// invocation arriving before the login handshake finished.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_message_display() {
        let err = ProtocolError::InvalidMessage("invoke before login".into());
        assert_eq!(err.to_string(), "invalid message: invoke before login");
    }
}
