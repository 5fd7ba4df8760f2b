//! Game state: phases, the player, the owner, and the world aggregate.

use std::collections::BTreeSet;

use gridlock_maze::{Cell, MazeState, Vector2, reachable_cells, seed_hash};
use serde::{Deserialize, Serialize};

use crate::constants::{
    FORBIDDEN_DISTANCE, INITIAL_TRAP_CHARGES, PREDICTION_LIMIT, WALL_REMOVES_PER_GAME,
    goal_bonus_for, target_score_for, wall_stock_for,
};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The room's game phase. Movement only happens during `Explore`;
/// countdown and prep render the scene with the player frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Countdown,
    Prep,
    Explore,
    Result,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Lobby => write!(f, "lobby"),
            Phase::Countdown => write!(f, "countdown"),
            Phase::Prep => write!(f, "prep"),
            Phase::Explore => write!(f, "explore"),
            Phase::Result => write!(f, "result"),
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// The most recent movement intent received from the player client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    /// Forward/backward throttle in [-1, 1].
    pub forward: f64,
    /// Turn rate in [-1, 1].
    pub turn: f64,
    /// Client-side input sequence; replays of an old seq are dropped.
    pub seq: u64,
    /// Tick the input arrived on; stale input reads as zero.
    pub received_at: u64,
}

impl InputState {
    pub fn idle() -> Self {
        Self {
            forward: 0.0,
            turn: 0.0,
            seq: 0,
            received_at: 0,
        }
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Server-authoritative player state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub position: Vector2,
    pub velocity: Vector2,
    /// Heading in radians, wrapped to (-pi, pi].
    pub angle: f64,
    pub prediction_hits: u32,
    pub score: u32,
    /// Tick the trap slow wears off, if slowed.
    pub slow_until: Option<u64>,
    #[serde(skip)]
    pub input: InputState,
}

impl PlayerState {
    /// A player standing at `spawn`, facing right, with no velocity.
    pub fn spawn_at(spawn: Vector2) -> Self {
        Self {
            position: spawn,
            velocity: Vector2::ZERO,
            angle: 0.0,
            prediction_hits: 0,
            score: 0,
            slow_until: None,
            input: InputState::idle(),
        }
    }

    pub fn cell(&self) -> Cell {
        self.position.cell()
    }

    pub fn slow_active(&self, now: u64) -> bool {
        self.slow_until.is_some_and(|until| now < until)
    }
}

// ---------------------------------------------------------------------------
// Owner
// ---------------------------------------------------------------------------

/// An owner-placed trap. Survives until the player walks into its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trap {
    pub cell: Cell,
    pub placed_at_tick: u64,
    pub consumed: bool,
}

/// An owner-placed prediction mark. The player's first entry scores a hit
/// and deactivates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionMark {
    pub cell: Cell,
    pub active: bool,
}

/// Server-authoritative owner resources and placements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerState {
    pub wall_stock: u32,
    pub wall_remove_left: u32,
    pub trap_charges: u32,
    pub edit_cooldown_until: u64,
    pub prediction_limit: u32,
    pub prediction_marks: Vec<PredictionMark>,
    pub traps: Vec<Trap>,
    pub forbidden_distance: i32,
}

impl OwnerState {
    pub fn for_maze_size(size: u32) -> Self {
        Self {
            wall_stock: wall_stock_for(size),
            wall_remove_left: WALL_REMOVES_PER_GAME,
            trap_charges: INITIAL_TRAP_CHARGES,
            edit_cooldown_until: 0,
            prediction_limit: PREDICTION_LIMIT,
            prediction_marks: Vec::new(),
            traps: Vec::new(),
            forbidden_distance: FORBIDDEN_DISTANCE,
        }
    }

    pub fn active_predictions(&self) -> usize {
        self.prediction_marks.iter().filter(|m| m.active).count()
    }

    pub fn active_traps(&self) -> usize {
        self.traps.iter().filter(|t| !t.consumed).count()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Fatal simulation faults. These mean server state is corrupt for this
/// room — the room logs, forces `result`, and evicts itself.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("player position {x}, {y} left the maze")]
    PlayerOutsideMaze { x: f64, y: f64 },
}

/// Everything the game rules touch, materialised when the owner starts
/// the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    pub maze: MazeState,
    pub player: PlayerState,
    pub owner: OwnerState,
    /// Cells still carrying an uncollected point.
    pub points: BTreeSet<Cell>,
    pub target_score: u32,
    /// Stable hash of the maze seed, shared with the bonus RNG.
    pub seed_hash: u64,
}

impl World {
    /// Builds the world for a freshly generated maze: spawns the player at
    /// start, seeds one point on every reachable cell except start and
    /// goal, and derives the target score from the point count.
    pub fn new(maze: MazeState) -> Self {
        let start = maze.start_cell();
        let goal = maze.goal_cell();
        let reachable = reachable_cells(&maze, start);

        let mut points = BTreeSet::new();
        for cell in maze.cells.iter().map(|c| Cell::new(c.x, c.y)) {
            let idx = (cell.y as u32 * maze.size + cell.x as u32) as usize;
            if reachable[idx] && cell != start && cell != goal {
                points.insert(cell);
            }
        }

        let target_score = target_score_for(points.len());
        let hash = seed_hash(&maze.seed);
        let spawn = maze.start;
        let size = maze.size;

        Self {
            maze,
            player: PlayerState::spawn_at(spawn),
            owner: OwnerState::for_maze_size(size),
            points,
            target_score,
            seed_hash: hash,
        }
    }

    pub fn goal_bonus(&self) -> u32 {
        goal_bonus_for(self.target_score)
    }
}

// =========================================================================
// Tests
// =========================================================================
