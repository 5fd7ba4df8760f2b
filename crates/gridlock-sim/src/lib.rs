//! Deterministic game simulation for Gridlock.
//!
//! One [`World`] holds everything the rules touch: the maze, the player's
//! kinematic state, the owner's resources, and the remaining point
//! entities. [`step`] advances it by exactly one tick in the fixed order
//! the game defines — input sampling, turning, velocity, axis-separated
//! collision, trap trigger, prediction pickup, point pickup, goal check.
//!
//! Determinism is the contract of this crate: given the same initial
//! `World` and the same input stream, `step` produces the same state
//! tick-for-tick. There is no wall clock here, no `Instant`, and the only
//! randomness (the prediction bonus roll) is a `StdRng` seeded from
//! `(maze seed, tick, mark index)`. The room layer injects the tick
//! counter; tests drive the simulator stepwise with a plain loop.

mod collision;
pub mod constants;
mod rng;
mod state;
mod step;

pub use collision::{advance_with_collision, disc_collides};
pub use rng::{BonusAward, prediction_bonus};
pub use state::{
    InputState, OwnerState, Phase, PlayerState, PredictionMark, SimError, Trap, World,
};
pub use step::{SimEvent, StepOutcome, step};
