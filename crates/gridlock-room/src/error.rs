//! Error types for the room layer.

use gridlock_protocol::RoomCode;

/// Errors that can occur during room directory and handle operations.
///
/// Command rejections inside a room are not errors at this level — they
/// flow back to the offending client as `ERR` messages and the room
/// continues unperturbed.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room's actor is gone or its command channel is full.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// Code allocation could not find a free code. Astronomically
    /// unlikely below millions of live rooms; surfaces as HTTP 503.
    #[error("room code space exhausted")]
    CodesExhausted,
}
