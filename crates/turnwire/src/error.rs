//! Unified error type for the Turnwire hub.

use turnwire_protocol::ProtocolError;
use turnwire_session::AuthError;
use turnwire_transport::TransportError;

use crate::registry::DispatchError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `turnwire` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
#[derive(Debug, thiserror::Error)]
pub enum TurnwireError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A login-validation error. The display text is the rejection
    /// message that was sent to the client.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A dispatch/registry error (unknown target, duplicate name).
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnwire_protocol::RemoteName;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let hub_err: TurnwireError = err.into();
        assert!(matches!(hub_err, TurnwireError::Transport(_)));
        assert!(hub_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_auth_error() {
        let err = AuthError::IncorrectPassword;
        let hub_err: TurnwireError = err.into();
        assert!(matches!(hub_err, TurnwireError::Auth(_)));
        assert_eq!(hub_err.to_string(), "Incorrect password");
    }

    #[test]
    fn test_from_dispatch_error() {
        let err = DispatchError::AlreadyRegistered(RemoteName::new("game.host"));
        let hub_err: TurnwireError = err.into();
        assert!(matches!(hub_err, TurnwireError::Dispatch(_)));
    }
}
