//! # Gridlock
//!
//! Authoritative real-time server for an asymmetric two-player maze
//! game: an **owner** designs and edits the maze while a **player**
//! navigates it in first person. The server owns the maze, the physics,
//! the scoring, the timers, and the connection lifecycle; clients are
//! renderers that submit intents and consume `STATE` messages.
//!
//! This crate is the facade: it binds the WebSocket and HTTP listeners,
//! parses the attach handshake, and wires connections into rooms. The
//! interesting machinery lives in the layer crates:
//!
//! - `gridlock-maze` — grid model, connectivity, seeded generation
//! - `gridlock-sim` — the deterministic 20 Hz simulation
//! - `gridlock-protocol` — wire messages, snapshots, deltas
//! - `gridlock-session` — per-connection identity, outbox, liveness
//! - `gridlock-room` — the room actor, validator, broadcaster, directory
//! - `gridlock-tick` — the fixed-timestep scheduler

mod error;
mod handler;
mod http;
mod server;

pub use error::GridlockError;
pub use http::{CreateRoomResponse, router};
pub use server::{GridlockServer, GridlockServerBuilder};
