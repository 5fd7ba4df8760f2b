//! Disc-vs-wall collision with axis-separated advancement.
//!
//! The player is a disc of radius 0.35 cells; walls are unit segments on
//! cell borders. Movement advances X first, then Y; a blocked axis is
//! binary-searched to the largest collision-free offset and its velocity
//! zeroed, which is what produces wall sliding.

use gridlock_maze::{Cell, EdgeRef, MazeState, Side, Vector2};

use crate::constants::PLAYER_RADIUS;

/// Squared distance from point `p` to the segment `a`-`b`.
fn dist_sq_point_segment(p: Vector2, a: Vector2, b: Vector2) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let apx = p.x - a.x;
    let apy = p.y - a.y;
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq > 0.0 {
        ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = a.x + t * abx - p.x;
    let cy = a.y + t * aby - p.y;
    cx * cx + cy * cy
}

/// Endpoints of a cell's wall segment on the given side.
fn wall_segment(cell: Cell, side: Side) -> (Vector2, Vector2) {
    let x = cell.x as f64;
    let y = cell.y as f64;
    match side {
        Side::Top => (Vector2::new(x, y), Vector2::new(x + 1.0, y)),
        Side::Right => (Vector2::new(x + 1.0, y), Vector2::new(x + 1.0, y + 1.0)),
        Side::Bottom => (Vector2::new(x, y + 1.0), Vector2::new(x + 1.0, y + 1.0)),
        Side::Left => (Vector2::new(x, y), Vector2::new(x, y + 1.0)),
    }
}

/// Whether a disc of [`PLAYER_RADIUS`] at `pos` intersects any solid edge.
///
/// Only the 3x3 cell neighborhood around `pos` is scanned — the radius is
/// well under a cell, so farther walls cannot touch the disc. Shared edges
/// get tested twice through both incident cells; harmless.
pub fn disc_collides(maze: &MazeState, pos: Vector2) -> bool {
    let center = pos.cell();
    let r_sq = PLAYER_RADIUS * PLAYER_RADIUS;

    for dy in -1..=1 {
        for dx in -1..=1 {
            let cell = Cell::new(center.x + dx, center.y + dy);
            // Out-of-bounds cells read every edge as solid, but each real
            // border segment is already carried by an in-bounds cell.
            if !maze.in_bounds(cell) {
                continue;
            }
            for side in [Side::Top, Side::Right, Side::Bottom, Side::Left] {
                if !maze.is_wall(EdgeRef::new(cell.x, cell.y, side)) {
                    continue;
                }
                let (a, b) = wall_segment(cell, side);
                if dist_sq_point_segment(pos, a, b) < r_sq {
                    return true;
                }
            }
        }
    }
    false
}

/// Number of binary-search refinements per blocked axis. Twelve halvings
/// of a sub-cell offset land well under a millimeter of cell space.
const SLIDE_ITERATIONS: u32 = 12;

/// Advances `pos` by `(dx, 0)` then `(0, dy)`, stopping each axis at the
/// largest collision-free offset. Returns `(blocked_x, blocked_y)` so the
/// caller can zero the corresponding velocity components.
pub fn advance_with_collision(maze: &MazeState, pos: &mut Vector2, dx: f64, dy: f64) -> (bool, bool) {
    let blocked_x = advance_axis(maze, pos, dx, true);
    let blocked_y = advance_axis(maze, pos, dy, false);
    (blocked_x, blocked_y)
}

fn advance_axis(maze: &MazeState, pos: &mut Vector2, delta: f64, is_x: bool) -> bool {
    if delta == 0.0 {
        return false;
    }

    let moved = |p: &Vector2, d: f64| {
        if is_x {
            Vector2::new(p.x + d, p.y)
        } else {
            Vector2::new(p.x, p.y + d)
        }
    };

    let target = moved(pos, delta);
    if !disc_collides(maze, target) {
        *pos = target;
        return false;
    }

    // Blocked: binary-search the fraction of `delta` that still fits.
    let mut lo = 0.0f64;
    let mut hi = 1.0f64;
    for _ in 0..SLIDE_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        if disc_collides(maze, moved(pos, delta * mid)) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    *pos = moved(pos, delta * lo);
    true
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gridlock_maze::MazeState;

    #[test]
    fn test_disc_clear_of_walls_does_not_collide() {
        let maze = MazeState::open_grid(4, "t");
        assert!(!disc_collides(&maze, Vector2::new(1.5, 1.5)));
        assert!(!disc_collides(&maze, Vector2::new(2.0, 1.5)));
    }

    #[test]
    fn test_disc_against_border_collides() {
        let maze = MazeState::open_grid(4, "t");
        // 0.2 from the left border, radius 0.35.
        assert!(disc_collides(&maze, Vector2::new(0.2, 1.5)));
        assert!(disc_collides(&maze, Vector2::new(1.5, 3.9)));
    }

    #[test]
    fn test_disc_against_interior_wall_collides() {
        let mut maze = MazeState::open_grid(4, "t");
        maze.set_wall(EdgeRef::new(1, 1, Side::Right), true).unwrap();
        // Wall segment at x = 2 between y = 1 and y = 2.
        assert!(disc_collides(&maze, Vector2::new(1.8, 1.5)));
        assert!(!disc_collides(&maze, Vector2::new(1.5, 1.5)));
    }

    #[test]
    fn test_advance_unobstructed_moves_fully() {
        let maze = MazeState::open_grid(4, "t");
        let mut pos = Vector2::new(1.5, 1.5);
        let (bx, by) = advance_with_collision(&maze, &mut pos, 0.3, -0.2);
        assert!(!bx);
        assert!(!by);
        assert!((pos.x - 1.8).abs() < 1e-9);
        assert!((pos.y - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_advance_into_wall_stops_at_radius() {
        let maze = MazeState::open_grid(4, "t");
        let mut pos = Vector2::new(1.0, 1.5);
        // Push hard into the left border at x = 0.
        let (bx, _) = advance_with_collision(&maze, &mut pos, -2.0, 0.0);
        assert!(bx);
        // Stopped just outside the radius, not inside the wall.
        assert!(pos.x >= PLAYER_RADIUS - 1e-6, "pos.x = {}", pos.x);
        assert!(pos.x < 0.45, "should have advanced close to the wall");
        assert!(!disc_collides(&maze, pos));
    }

    #[test]
    fn test_advance_slides_along_wall() {
        let maze = MazeState::open_grid(4, "t");
        // Hug the top border while moving diagonally up-right: X advances,
        // Y is blocked.
        let mut pos = Vector2::new(1.5, 0.5);
        let (bx, by) = advance_with_collision(&maze, &mut pos, 0.3, -0.5);
        assert!(!bx);
        assert!(by);
        assert!((pos.x - 1.8).abs() < 1e-9, "x axis must slide freely");
        assert!(pos.y >= PLAYER_RADIUS - 1e-6);
        assert!(!disc_collides(&maze, pos));
    }

    #[test]
    fn test_advance_never_tunnels_through_interior_wall() {
        let mut maze = MazeState::open_grid(4, "t");
        maze.set_wall(EdgeRef::new(1, 1, Side::Right), true).unwrap();
        let mut pos = Vector2::new(1.5, 1.5);
        advance_with_collision(&maze, &mut pos, 1.0, 0.0);
        assert!(pos.x < 2.0 - PLAYER_RADIUS + 1e-6, "must stop before x = 2");
        assert!(!disc_collides(&maze, pos));
    }
}
