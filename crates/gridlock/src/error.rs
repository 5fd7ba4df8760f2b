//! Unified error type for the Gridlock server.

use gridlock_protocol::ProtocolError;
use gridlock_room::RoomError;
use gridlock_session::SessionError;
use gridlock_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// The `#[from]` attributes generate the conversions, so `?` moves
/// errors from any layer up to the server loop unchanged.
#[derive(Debug, thiserror::Error)]
pub enum GridlockError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (nickname, outbox).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (unknown room, dead actor, code exhaustion).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// I/O outside the transport abstraction (the HTTP listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let top: GridlockError = err.into();
        assert!(matches!(top, GridlockError::Transport(_)));
        assert!(top.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let top: GridlockError = err.into();
        assert!(matches!(top, GridlockError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::CodesExhausted;
        let top: GridlockError = err.into();
        assert!(matches!(top, GridlockError::Room(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::InvalidNick("x".into());
        let top: GridlockError = err.into();
        assert!(matches!(top, GridlockError::Session(_)));
    }
}
