//! Session types: identity, broadcast cursor, and liveness bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use gridlock_protocol::{Role, SessionId, SessionInfo};
use rand::Rng;

use crate::{Outbox, SessionError};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing and capacity knobs for session handling.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between server-initiated WebSocket pings.
    pub ping_interval: Duration,
    /// Silence longer than this marks the session absent.
    pub liveness_timeout: Duration,
    /// How long a room stays paused waiting for an absent side.
    pub disconnect_grace: Duration,
    /// How long attach waits for the WebSocket handshake to complete.
    pub handshake_timeout: Duration,
    /// Outbox capacity in messages.
    pub outbox_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(15),
            disconnect_grace: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(5),
            outbox_capacity: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Nickname validation
// ---------------------------------------------------------------------------

/// Checks the handshake rule: 2–10 characters from `A-Z`, `0-9`, `_`,
/// `-`.
pub fn validate_nick(nick: &str) -> Result<(), SessionError> {
    let ok = (2..=10).contains(&nick.len())
        && nick
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(SessionError::InvalidNick(nick.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connected client inside a room.
///
/// Owned by exactly one room; the room holds at most one session per
/// role. A second attach for the same role displaces the first.
pub struct Session {
    pub id: SessionId,
    pub role: Role,
    pub nick: String,
    /// Sequence of the last `STATE` written to this session's outbox;
    /// `-1` before the first send. Strictly increasing afterwards.
    pub last_sent_seq: i64,
    /// Highest player-input sequence applied (players only).
    pub last_input_seq: Option<u64>,
    pub outbox: Arc<Outbox>,
    /// Room tick the client was last heard on (any inbound frame). The
    /// room marks the session absent after 15 s of silence; liveness
    /// probes (protocol pings carrying their send timestamp) are the
    /// connection layer's business.
    pub last_heard_at: u64,
}

impl Session {
    /// Creates a connected session with a fresh random id.
    pub fn new(role: Role, nick: String, outbox: Arc<Outbox>, now: u64) -> Self {
        Self {
            id: generate_session_id(),
            role,
            nick,
            last_sent_seq: -1,
            last_input_seq: None,
            outbox,
            last_heard_at: now,
        }
    }

    /// Records an inbound frame from the client.
    pub fn mark_heard(&mut self, now: u64) {
        self.last_heard_at = now;
    }

    /// The session as shown in snapshots.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            role: self.role,
            nick: self.nick.clone(),
        }
    }
}

/// Random 8-hex session id. Not a secret — reconnection is positional
/// (room + role + nick), the id only disambiguates log lines and the
/// snapshot's session list.
fn generate_session_id() -> SessionId {
    let mut rng = rand::rng();
    let bytes: [u8; 4] = rng.random();
    SessionId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

// =========================================================================
// Tests
// =========================================================================
