//! Error types for the maze layer.

/// Errors that can occur while building or mutating a maze.
#[derive(Debug, thiserror::Error)]
pub enum MazeError {
    /// The requested maze size is not one the game supports.
    #[error("unsupported maze size {0} (expected 20 or 40)")]
    UnsupportedSize(u32),

    /// A cell or edge reference points outside the grid.
    #[error("coordinates ({x}, {y}) outside a {size}x{size} maze")]
    OutOfBounds { x: i32, y: i32, size: u32 },

    /// The edge sits on the outer border, which must stay walled.
    #[error("edge at ({x}, {y}) {side} is on the maze border")]
    BorderEdge { x: i32, y: i32, side: crate::Side },

    /// Attempted to place a wall where one already exists, or remove an
    /// open edge.
    #[error("edge already in requested state")]
    EdgeUnchanged,
}
