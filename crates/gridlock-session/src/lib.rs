//! Session layer for Gridlock.
//!
//! A session is the server's record of one connected client:
//!
//! 1. **Identity** — role (owner or player) and nickname, fixed at attach.
//! 2. **Broadcast cursor** — the last `STATE` sequence written to this
//!    client, which drives the full-vs-delta decision.
//! 3. **Outbox** — a bounded queue between the room actor (synchronous
//!    pushes) and the per-connection writer task (async drain). Overflow
//!    downgrades to a full snapshot instead of blocking the room.
//! 4. **Liveness** — when the client was last heard, in room-tick units.
//!    The room marks a session absent after 15 s of silence; the probes
//!    that keep a healthy connection talkative are sent by the
//!    connection's writer task and answered out of band.
//!
//! Reconnection is positional: a client that re-attaches with the same
//! room, role, and nickname takes the seat back (displacing any stale
//! session with a `takeover` close). There are no reconnect tokens.

mod error;
mod outbox;
mod session;

pub use error::SessionError;
pub use outbox::{Outbox, StateOverflow};
pub use session::{Session, SessionConfig, validate_nick};
