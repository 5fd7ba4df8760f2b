//! Room runtime for Gridlock.
//!
//! Each room is an isolated Tokio task (actor model) owning one game:
//! the phase clock, the simulation world, two session seats, and the
//! broadcast pipeline. The [`RoomDirectory`] is the only cross-room
//! state — a mutex-guarded code map with idle eviction.
//!
//! ```text
//! HTTP POST /rooms ──→ RoomDirectory::create_room ──→ RoomHandle
//! WS attach        ──→ RoomDirectory::get ──→ RoomHandle::attach
//! client frames    ──→ RoomHandle::message ──→ validator ──→ broadcast
//! 20 Hz tick       ──→ phase clock ──→ simulator ──→ broadcast
//! ```

mod broadcast;
mod config;
mod directory;
mod error;
mod phase;
mod room;
pub mod validator;

pub use broadcast::{StateBroadcaster, build_snapshot};
pub use config::RoomConfig;
pub use directory::RoomDirectory;
pub use error::RoomError;
pub use phase::{PhaseClock, PhaseEvent};
pub use room::{RoomHandle, RoomInfo};
