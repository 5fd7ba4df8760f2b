//! Seeded maze generation.
//!
//! The room layer only depends on the [`MazeFactory`] trait; the default
//! [`KruskalFactory`] builds a uniform spanning tree over the grid with a
//! union-find, which guarantees the §3 invariants: every cell reachable,
//! interior edges symmetric, start distinct from goal. Generation is
//! deterministic per `(size, seed)` — the RNG is seeded from a stable hash
//! of the seed string, never from entropy.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::{Cell, MazeError, MazeState};

/// Produces a fully-connected maze for a given size and seed.
///
/// Implementations must be deterministic: the same `(size, seed)` pair
/// yields the same `MazeState`, byte for byte.
pub trait MazeFactory: Send + Sync + 'static {
    fn generate(&self, size: u32, seed: &str) -> Result<MazeState, MazeError>;
}

/// Stable 64-bit FNV-1a hash of a seed string.
///
/// Used both here and by the simulator's bonus RNG, so it must never
/// change: replays and cross-implementation tests depend on it.
pub fn seed_hash(seed: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in seed.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

// ---------------------------------------------------------------------------
// Union-find
// ---------------------------------------------------------------------------

/// Flat union-find over cell indices, with path halving.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Merges the sets containing `a` and `b`. Returns `false` if they
    /// were already one set.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        self.parent[ra] = rb;
        true
    }
}

// ---------------------------------------------------------------------------
// KruskalFactory
// ---------------------------------------------------------------------------

/// Randomized Kruskal generator: shuffle all interior edges, open each one
/// that still joins two components. The result is a perfect maze (exactly
/// one path between any two cells) before the owner starts editing.
#[derive(Debug, Clone, Copy, Default)]
pub struct KruskalFactory;

impl MazeFactory for KruskalFactory {
    fn generate(&self, size: u32, seed: &str) -> Result<MazeState, MazeError> {
        if size != 20 && size != 40 {
            return Err(MazeError::UnsupportedSize(size));
        }

        let mut maze = MazeState::fully_walled(size, seed);
        let n = size as i32;

        // Every interior edge once, as an ordered cell pair.
        let mut edges: Vec<(Cell, Cell)> = Vec::with_capacity((2 * size * size) as usize);
        for y in 0..n {
            for x in 0..n {
                if x + 1 < n {
                    edges.push((Cell::new(x, y), Cell::new(x + 1, y)));
                }
                if y + 1 < n {
                    edges.push((Cell::new(x, y), Cell::new(x, y + 1)));
                }
            }
        }

        let mut rng = StdRng::seed_from_u64(seed_hash(seed) ^ u64::from(size));
        edges.shuffle(&mut rng);

        let idx = |c: Cell| (c.y as u32 * size + c.x as u32) as usize;
        let mut sets = DisjointSets::new((size * size) as usize);
        let mut opened = 0usize;
        let spanning = (size * size - 1) as usize;

        for (a, b) in edges {
            if sets.union(idx(a), idx(b)) {
                maze.carve(a, b);
                opened += 1;
                if opened == spanning {
                    break;
                }
            }
        }

        Ok(maze)
    }
}

// =========================================================================
// Tests
// =========================================================================
