//! Error types for the transport layer.

/// Errors that can occur accepting, reading, or writing a connection.
///
/// Everything here is about moving bytes; whether those bytes meant
/// anything is the protocol layer's problem.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection (or it was closed under us).
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing a frame to the peer failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading the next frame from the peer failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down while the operation was in flight.
    #[error("transport shut down")]
    Shutdown,
}
