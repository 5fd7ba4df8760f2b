//! Wire protocol for Gridlock.
//!
//! This crate defines the "language" the server and the browser clients
//! speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`ErrorCode`],
//!   [`Role`], [`RoomCode`], ...) — the structures that travel on the
//!   wire, JSON-tagged by a `type` field.
//! - **State payloads** ([`Snapshot`], [`Delta`], [`StatePayload`]) —
//!   full and incremental `STATE` bodies.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages become
//!   bytes and back.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the room
//! layer (game rules). It doesn't know about sockets or rooms — it only
//! knows shapes.
//!
//! ```text
//! Transport (frames) → Protocol (messages) → Room (game semantics)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

// `mod` declares a submodule. Rust looks for the code in either:
//   - `src/types.rs` (file), or
//   - `src/types/mod.rs` (directory with mod.rs)
// We use the file approach since each module is a single file.

mod codec;
mod error;
mod snapshot;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

// `pub use` makes items from submodules available at the crate root.
// Users can write `use gridlock_protocol::Snapshot` instead of
// `use gridlock_protocol::snapshot::Snapshot`. This is a cleaner
// public API.

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use snapshot::{Delta, OwnerView, PauseReason, PlayerView, SessionInfo, Snapshot, StatePayload};
pub use types::{
    ClientMessage, CloseReason, EditAction, EditRequest, ErrorCode, ROOM_CODE_ALPHABET,
    ROOM_CODE_LEN, Role, RoomCode, ServerMessage, SessionId,
};
