//! Grid types: cells, walls, edges, and the authoritative maze state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::MazeError;

// ---------------------------------------------------------------------------
// Vector2
// ---------------------------------------------------------------------------

/// A position in maze-cell units. Origin is the top-left corner of cell
/// (0, 0); `x` grows rightward, `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Center of the given cell.
    pub fn cell_center(cell: Cell) -> Self {
        Self {
            x: cell.x as f64 + 0.5,
            y: cell.y as f64 + 0.5,
        }
    }

    /// The cell this position falls in (`floor` on both axes).
    pub fn cell(&self) -> Cell {
        Cell {
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
        }
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// Integer cell coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (chessboard) distance to another cell.
    pub fn chebyshev(&self, other: Cell) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Walls and edges
// ---------------------------------------------------------------------------

/// One side of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    /// The side the neighboring cell sees this edge from.
    pub fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
        }
    }

    /// Offset to the neighbor across this side.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Side::Top => (0, -1),
            Side::Right => (1, 0),
            Side::Bottom => (0, 1),
            Side::Left => (-1, 0),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Top => write!(f, "top"),
            Side::Right => write!(f, "right"),
            Side::Bottom => write!(f, "bottom"),
            Side::Left => write!(f, "left"),
        }
    }
}

/// The four wall flags of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Walls {
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
    pub left: bool,
}

impl Walls {
    pub const CLOSED: Walls = Walls {
        top: true,
        right: true,
        bottom: true,
        left: true,
    };

    pub fn get(&self, side: Side) -> bool {
        match side {
            Side::Top => self.top,
            Side::Right => self.right,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
        }
    }

    pub fn set(&mut self, side: Side, solid: bool) {
        match side {
            Side::Top => self.top = solid,
            Side::Right => self.right = solid,
            Side::Bottom => self.bottom = solid,
            Side::Left => self.left = solid,
        }
    }
}

/// One cell of the maze with its wall flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeCell {
    pub x: i32,
    pub y: i32,
    pub walls: Walls,
}

/// Reference to one edge of the grid, named from the cell that carries it.
///
/// `(x, y, side)` and `(neighbor, side.opposite())` name the same physical
/// edge; [`MazeState`] keeps both wall flags in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRef {
    pub x: i32,
    pub y: i32,
    pub side: Side,
}

impl EdgeRef {
    pub fn new(x: i32, y: i32, side: Side) -> Self {
        Self { x, y, side }
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }
}

impl fmt::Display for EdgeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}", self.x, self.y, self.side)
    }
}

// ---------------------------------------------------------------------------
// MazeState
// ---------------------------------------------------------------------------

/// The authoritative maze: a `size x size` grid of wall flags plus the
/// start and goal positions.
///
/// Invariants (upheld by every constructor and mutator here):
/// - `cells.len() == size * size`, row-major order.
/// - Interior edges are symmetric: both incident cells agree.
/// - The outer border is always walled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MazeState {
    pub size: u32,
    pub seed: String,
    pub cells: Vec<MazeCell>,
    pub start: Vector2,
    pub goal: Vector2,
}

impl MazeState {
    /// A maze with every interior edge open (border still walled), start
    /// at the top-left cell and goal at the bottom-right. Degenerate as a
    /// puzzle, useful as a fixture for simulation and validation tests.
    pub fn open_grid(size: u32, seed: &str) -> Self {
        let n = size as i32;
        let mut cells = Vec::with_capacity((size * size) as usize);
        for y in 0..n {
            for x in 0..n {
                cells.push(MazeCell {
                    x,
                    y,
                    walls: Walls {
                        top: y == 0,
                        right: x == n - 1,
                        bottom: y == n - 1,
                        left: x == 0,
                    },
                });
            }
        }
        Self {
            size,
            seed: seed.to_string(),
            cells,
            start: Vector2::cell_center(Cell::new(0, 0)),
            goal: Vector2::cell_center(Cell::new(n - 1, n - 1)),
        }
    }

    /// A maze with every edge (including interior) walled. Starting point
    /// for generators that carve passages.
    pub(crate) fn fully_walled(size: u32, seed: &str) -> Self {
        let n = size as i32;
        let mut cells = Vec::with_capacity((size * size) as usize);
        for y in 0..n {
            for x in 0..n {
                cells.push(MazeCell {
                    x,
                    y,
                    walls: Walls::CLOSED,
                });
            }
        }
        Self {
            size,
            seed: seed.to_string(),
            cells,
            start: Vector2::cell_center(Cell::new(0, 0)),
            goal: Vector2::cell_center(Cell::new(n - 1, n - 1)),
        }
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        let n = self.size as i32;
        cell.x >= 0 && cell.x < n && cell.y >= 0 && cell.y < n
    }

    fn index(&self, cell: Cell) -> usize {
        (cell.y as u32 * self.size + cell.x as u32) as usize
    }

    pub fn cell(&self, cell: Cell) -> Option<&MazeCell> {
        if self.in_bounds(cell) {
            Some(&self.cells[self.index(cell)])
        } else {
            None
        }
    }

    /// The neighbor across `side`, if it is inside the grid.
    pub fn neighbor(&self, cell: Cell, side: Side) -> Option<Cell> {
        let (dx, dy) = side.delta();
        let next = Cell::new(cell.x + dx, cell.y + dy);
        self.in_bounds(next).then_some(next)
    }

    /// Whether the named edge is solid. Out-of-bounds references count as
    /// solid — the world outside the grid is wall.
    pub fn is_wall(&self, edge: EdgeRef) -> bool {
        match self.cell(edge.cell()) {
            Some(c) => c.walls.get(edge.side),
            None => true,
        }
    }

    /// Whether `edge` lies on the outer border of the grid.
    pub fn is_border(&self, edge: EdgeRef) -> bool {
        self.in_bounds(edge.cell()) && self.neighbor(edge.cell(), edge.side).is_none()
    }

    /// Sets the named edge (and its mirror on the neighboring cell) to
    /// `solid`. Border edges are rejected: the outer ring must stay walled.
    pub fn set_wall(&mut self, edge: EdgeRef, solid: bool) -> Result<(), MazeError> {
        let cell = edge.cell();
        if !self.in_bounds(cell) {
            return Err(MazeError::OutOfBounds {
                x: cell.x,
                y: cell.y,
                size: self.size,
            });
        }
        let Some(neighbor) = self.neighbor(cell, edge.side) else {
            return Err(MazeError::BorderEdge {
                x: cell.x,
                y: cell.y,
                side: edge.side,
            });
        };
        if self.is_wall(edge) == solid {
            return Err(MazeError::EdgeUnchanged);
        }

        let idx = self.index(cell);
        self.cells[idx].walls.set(edge.side, solid);
        let nidx = self.index(neighbor);
        self.cells[nidx].walls.set(edge.side.opposite(), solid);
        Ok(())
    }

    /// Interior wall-carving used by generators; panics on border edges,
    /// which generators never touch.
    pub(crate) fn carve(&mut self, a: Cell, b: Cell) {
        let side = match (b.x - a.x, b.y - a.y) {
            (0, -1) => Side::Top,
            (1, 0) => Side::Right,
            (0, 1) => Side::Bottom,
            (-1, 0) => Side::Left,
            _ => unreachable!("carve called on non-adjacent cells"),
        };
        let idx = self.index(a);
        self.cells[idx].walls.set(side, false);
        let nidx = self.index(b);
        self.cells[nidx].walls.set(side.opposite(), false);
    }

    /// Neighbors reachable through open edges.
    pub fn open_neighbors(&self, cell: Cell) -> Vec<Cell> {
        [Side::Top, Side::Right, Side::Bottom, Side::Left]
            .into_iter()
            .filter(|side| !self.is_wall(EdgeRef::new(cell.x, cell.y, *side)))
            .filter_map(|side| self.neighbor(cell, side))
            .collect()
    }

    pub fn start_cell(&self) -> Cell {
        self.start.cell()
    }

    pub fn goal_cell(&self) -> Cell {
        self.goal.cell()
    }

    /// Checks the interior-edge symmetry invariant over the whole grid.
    pub fn edges_symmetric(&self) -> bool {
        let n = self.size as i32;
        for y in 0..n {
            for x in 0..n {
                let cell = Cell::new(x, y);
                for side in [Side::Right, Side::Bottom] {
                    if let Some(neighbor) = self.neighbor(cell, side) {
                        let here = self.is_wall(EdgeRef::new(x, y, side));
                        let there = self.is_wall(EdgeRef::new(
                            neighbor.x,
                            neighbor.y,
                            side.opposite(),
                        ));
                        if here != there {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }
}

// =========================================================================
// Tests
// =========================================================================
