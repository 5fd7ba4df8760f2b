//! Validation and application of client commands against room state.
//!
//! Every check runs synchronously inside the room actor against current
//! state; a command either mutates the world and bumps the room sequence,
//! or produces exactly one [`ErrorCode`] for the offending session. The
//! closed error set is the protocol's — nothing else leaks out.

use gridlock_maze::{Cell, EdgeRef, connected};
use gridlock_protocol::{EditAction, EditRequest, ErrorCode};
use gridlock_sim::constants::{MAX_ACTIVE_TRAPS, OWNER_EDIT_COOLDOWN_TICKS};
use gridlock_sim::{InputState, Phase, PredictionMark, Trap, World};
use tracing::debug;

/// Validates `O_START`. The caller materialises the world on success.
pub fn validate_start(phase: Phase, both_present: bool, maze_size: u32) -> Result<(), ErrorCode> {
    if phase != Phase::Lobby {
        return Err(ErrorCode::InvalidPhase);
    }
    if !both_present {
        return Err(ErrorCode::InvalidPhase);
    }
    if maze_size != 20 && maze_size != 40 {
        return Err(ErrorCode::InvalidArg);
    }
    Ok(())
}

/// Validates and applies an `O_EDIT`. On success the world is mutated and
/// the owner's edit cooldown is armed.
pub fn apply_edit(
    world: &mut World,
    phase: Phase,
    paused: bool,
    now: u64,
    edit: &EditRequest,
) -> Result<(), ErrorCode> {
    if paused {
        return Err(ErrorCode::InvalidPhase);
    }
    let phase_ok = match edit.action {
        // Wall placement stays legal mid-run; everything else is
        // prep-time only.
        EditAction::PlaceWall => matches!(phase, Phase::Prep | Phase::Explore),
        EditAction::RemoveWall | EditAction::PlaceTrap => phase == Phase::Prep,
    };
    if !phase_ok {
        return Err(ErrorCode::InvalidPhase);
    }
    if now < world.owner.edit_cooldown_until {
        return Err(ErrorCode::Cooldown);
    }

    match edit.action {
        EditAction::PlaceWall => {
            let edge = edit.edge.ok_or(ErrorCode::InvalidArg)?;
            place_wall(world, edge)?;
        }
        EditAction::RemoveWall => {
            let edge = edit.edge.ok_or(ErrorCode::InvalidArg)?;
            remove_wall(world, edge)?;
        }
        EditAction::PlaceTrap => {
            let cell = edit.cell.ok_or(ErrorCode::InvalidArg)?;
            place_trap(world, cell, now)?;
        }
    }

    world.owner.edit_cooldown_until = now + OWNER_EDIT_COOLDOWN_TICKS;
    Ok(())
}

fn place_wall(world: &mut World, edge: EdgeRef) -> Result<(), ErrorCode> {
    if world.owner.wall_stock == 0 {
        return Err(ErrorCode::NoResource);
    }
    if !world.maze.in_bounds(edge.cell()) || world.maze.is_border(edge) {
        return Err(ErrorCode::OutOfBounds);
    }
    if world.maze.is_wall(edge) {
        return Err(ErrorCode::InvalidArg);
    }
    if edge_in_forbidden_radius(world, edge) {
        return Err(ErrorCode::ForbiddenArea);
    }

    // Apply tentatively, then verify the goal is still reachable.
    world
        .maze
        .set_wall(edge, true)
        .map_err(|_| ErrorCode::InvalidArg)?;
    if !connected(&world.maze, world.maze.start_cell(), world.maze.goal_cell()) {
        world
            .maze
            .set_wall(edge, false)
            .expect("reverting a wall just placed");
        return Err(ErrorCode::DisconnectsMaze);
    }

    world.owner.wall_stock -= 1;
    debug!(%edge, stock = world.owner.wall_stock, "wall placed");
    Ok(())
}

fn remove_wall(world: &mut World, edge: EdgeRef) -> Result<(), ErrorCode> {
    if world.owner.wall_remove_left == 0 {
        return Err(ErrorCode::NoResource);
    }
    if !world.maze.in_bounds(edge.cell()) || world.maze.is_border(edge) {
        return Err(ErrorCode::OutOfBounds);
    }
    if !world.maze.is_wall(edge) {
        return Err(ErrorCode::InvalidArg);
    }

    world
        .maze
        .set_wall(edge, false)
        .map_err(|_| ErrorCode::InvalidArg)?;
    world.owner.wall_remove_left -= 1;
    // The removed wall goes back into stock.
    world.owner.wall_stock += 1;
    debug!(%edge, "wall removed");
    Ok(())
}

fn place_trap(world: &mut World, cell: Cell, now: u64) -> Result<(), ErrorCode> {
    if world.owner.trap_charges == 0 {
        return Err(ErrorCode::NoResource);
    }
    if world.owner.active_traps() >= MAX_ACTIVE_TRAPS {
        return Err(ErrorCode::NoResource);
    }
    if !world.maze.in_bounds(cell) {
        return Err(ErrorCode::OutOfBounds);
    }
    if !cell_is_trappable(world, cell) {
        return Err(ErrorCode::InvalidArg);
    }
    if cell_in_forbidden_radius(world, cell) {
        return Err(ErrorCode::ForbiddenArea);
    }

    world.owner.trap_charges -= 1;
    world.owner.traps.push(Trap {
        cell,
        placed_at_tick: now,
        consumed: false,
    });
    debug!(%cell, charges = world.owner.trap_charges, "trap placed");
    Ok(())
}

/// Validates and applies an `O_MRK`. Marks have no cooldown.
pub fn apply_mark(
    world: &mut World,
    phase: Phase,
    paused: bool,
    cell: Cell,
    active: bool,
) -> Result<(), ErrorCode> {
    if paused || phase != Phase::Prep {
        return Err(ErrorCode::InvalidPhase);
    }

    if active {
        if world.owner.active_predictions() >= world.owner.prediction_limit as usize {
            return Err(ErrorCode::NoResource);
        }
        if !world.maze.in_bounds(cell) {
            return Err(ErrorCode::OutOfBounds);
        }
        if world.owner.prediction_marks.iter().any(|m| m.cell == cell) {
            return Err(ErrorCode::InvalidArg);
        }
        if cell == world.maze.start_cell() || cell == world.maze.goal_cell() {
            return Err(ErrorCode::InvalidArg);
        }
        if cell_in_forbidden_radius(world, cell) {
            return Err(ErrorCode::ForbiddenArea);
        }
        world.owner.prediction_marks.push(PredictionMark { cell, active: true });
        debug!(%cell, "prediction mark placed");
    } else {
        let index = world
            .owner
            .prediction_marks
            .iter()
            .position(|m| m.cell == cell)
            .ok_or(ErrorCode::InvalidArg)?;
        world.owner.prediction_marks.remove(index);
        debug!(%cell, "prediction mark cleared");
    }
    Ok(())
}

/// Validates a `P_INPUT` and updates the player's intent.
///
/// Returns `Ok(false)` for a replayed sequence: already-processed input
/// is dropped without an error, so a retrying client isn't spammed.
pub fn apply_input(
    world: &mut World,
    phase: Phase,
    paused: bool,
    now: u64,
    last_input_seq: &mut Option<u64>,
    forward: f64,
    turn: f64,
    seq: u64,
) -> Result<bool, ErrorCode> {
    if paused || phase != Phase::Explore {
        return Err(ErrorCode::InvalidPhase);
    }
    if !forward.is_finite() || !turn.is_finite() {
        return Err(ErrorCode::InvalidArg);
    }
    if !(-1.0..=1.0).contains(&forward) || !(-1.0..=1.0).contains(&turn) {
        return Err(ErrorCode::InvalidArg);
    }
    if last_input_seq.is_some_and(|last| seq <= last) {
        return Ok(false);
    }

    *last_input_seq = Some(seq);
    world.player.input = InputState {
        forward,
        turn,
        seq,
        received_at: now,
    };
    Ok(true)
}

// ---------------------------------------------------------------------------
// Forbidden radius
// ---------------------------------------------------------------------------

/// A cell is refused when its Chebyshev distance to the player's cell is
/// within the forbidden radius (inclusive).
fn cell_in_forbidden_radius(world: &World, cell: Cell) -> bool {
    world.player.cell().chebyshev(cell) <= world.owner.forbidden_distance
}

/// An edge is refused when either incident cell is within the radius.
fn edge_in_forbidden_radius(world: &World, edge: EdgeRef) -> bool {
    if cell_in_forbidden_radius(world, edge.cell()) {
        return true;
    }
    world
        .maze
        .neighbor(edge.cell(), edge.side)
        .is_some_and(|n| cell_in_forbidden_radius(world, n))
}

/// Traps sit on plain floor: not start, not goal, not stacked on a live
/// trap.
fn cell_is_trappable(world: &World, cell: Cell) -> bool {
    cell != world.maze.start_cell()
        && cell != world.maze.goal_cell()
        && !world
            .owner
            .traps
            .iter()
            .any(|t| !t.consumed && t.cell == cell)
}

// =========================================================================
// Tests
// =========================================================================
