//! Reachability over the open-edge graph.
//!
//! The edit validator calls [`connected`] on a hypothetical mutation before
//! committing it: a wall placement that would cut the goal off from the
//! start is rejected. BFS over a flat visited vector — a 40x40 maze is
//! 1600 cells, so one scan per edit is cheap.

use std::collections::VecDeque;

use crate::{Cell, MazeState};

/// Flat visited map of every cell reachable from `from` through open edges.
/// Indexed row-major like `MazeState::cells`.
pub fn reachable_cells(maze: &MazeState, from: Cell) -> Vec<bool> {
    let mut visited = vec![false; (maze.size * maze.size) as usize];
    if !maze.in_bounds(from) {
        return visited;
    }

    let idx = |c: Cell| (c.y as u32 * maze.size + c.x as u32) as usize;
    let mut queue = VecDeque::new();
    visited[idx(from)] = true;
    queue.push_back(from);

    while let Some(cell) = queue.pop_front() {
        for next in maze.open_neighbors(cell) {
            let i = idx(next);
            if !visited[i] {
                visited[i] = true;
                queue.push_back(next);
            }
        }
    }

    visited
}

/// Whether `to` is reachable from `from`.
pub fn connected(maze: &MazeState, from: Cell, to: Cell) -> bool {
    if !maze.in_bounds(to) {
        return false;
    }
    reachable_cells(maze, from)[(to.y as u32 * maze.size + to.x as u32) as usize]
}

/// Number of cells reachable from `from`, including `from` itself.
pub fn reachable_count(maze: &MazeState, from: Cell) -> usize {
    reachable_cells(maze, from).iter().filter(|v| **v).count()
}
