//! Maze model for Gridlock.
//!
//! This crate owns everything about the grid itself:
//!
//! - **Grid types** ([`MazeState`], [`MazeCell`], [`EdgeRef`], [`Cell`],
//!   [`Vector2`]) — the authoritative wall layout the server simulates
//!   against and ships to clients inside snapshots.
//! - **Connectivity** ([`reachable_cells`], [`connected`]) — the BFS the
//!   edit validator runs before letting the owner wall anything off.
//! - **Generation** ([`MazeFactory`] trait, [`KruskalFactory`]) — seeded,
//!   deterministic maze construction.
//!
//! The crate is deliberately free of networking and timing concerns: the
//! room layer mutates a `MazeState` through validated edits, and the
//! simulator reads it for collision. Both sides rely on the invariant that
//! interior edges are symmetric — the two cells sharing an edge always
//! agree on whether it is a wall.

mod connectivity;
mod error;
mod factory;
mod grid;

pub use connectivity::{connected, reachable_cells, reachable_count};
pub use error::MazeError;
pub use factory::{KruskalFactory, MazeFactory, seed_hash};
pub use grid::{Cell, EdgeRef, MazeCell, MazeState, Side, Vector2, Walls};
