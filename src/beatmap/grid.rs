//! Grid geometry
//!
//! Maps are authored on a 4x3 grid (`lineIndex` 0..=3, `lineLayer` 0..=2)
//! but played on a 4x4 grid where only eight cells are used: two on the
//! bottom row, one at each end of the two middle rows, and two on top.
//!
//! ```text
//!   y=3   .  T  T  .
//!   y=2   M  .  .  M
//!   y=1   M  .  .  M
//!   y=0   .  B  B  .
//!        x=0 1  2  3
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{AUTHORING_COLUMNS, AUTHORING_ROWS, CELL_X, CELL_Y, GRID_COLUMNS, GRID_ROWS};
use crate::error::{GameError, Result};

/// A cell on the 4x4 play grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: u8,
    pub y: u8,
}

/// The eight cells notes can land on
pub const ACTIVE_CELLS: [GridCell; 8] = [
    GridCell { x: 1, y: 0 },
    GridCell { x: 2, y: 0 },
    GridCell { x: 0, y: 1 },
    GridCell { x: 3, y: 1 },
    GridCell { x: 0, y: 2 },
    GridCell { x: 3, y: 2 },
    GridCell { x: 1, y: 3 },
    GridCell { x: 2, y: 3 },
];

impl GridCell {
    /// Create a cell, rejecting coordinates outside the play grid
    pub fn new(x: u8, y: u8) -> Result<Self> {
        if x >= GRID_COLUMNS || y >= GRID_ROWS {
            return Err(GameError::Configuration(format!(
                "grid cell ({x}, {y}) outside {GRID_COLUMNS}x{GRID_ROWS} play grid"
            )));
        }
        Ok(Self { x, y })
    }

    /// Whether any note can ever land here
    pub fn is_active(&self) -> bool {
        ACTIVE_CELLS.contains(self)
    }

    /// Cell centre in world units (x across, y up)
    #[inline]
    pub fn world_position(&self) -> Vec2 {
        Vec2::new(CELL_X[self.x as usize], CELL_Y[self.y as usize])
    }
}

impl std::fmt::Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Map an authoring coordinate onto the play grid.
///
/// Total over the 4x3 authoring grid. Top layer goes to the top row and
/// bottom layer to the bottom row, each squeezed onto the two inner
/// columns. The middle layer fans out to the side cells: the outer columns
/// keep their side and sit one row higher than the inner ones.
pub fn remap(line_index: i32, line_layer: i32) -> Result<GridCell> {
    let (x, y) = match (line_layer, line_index) {
        (2, 0 | 1) => (1, 3),
        (2, 2 | 3) => (2, 3),
        (1, 0) => (0, 2),
        (1, 1) => (0, 1),
        (1, 2) => (3, 1),
        (1, 3) => (3, 2),
        (0, 0 | 1) => (1, 0),
        (0, 2 | 3) => (2, 0),
        _ => {
            return Err(GameError::Configuration(format!(
                "authoring position ({line_index}, {line_layer}) outside \
                 {AUTHORING_COLUMNS}x{AUTHORING_ROWS} grid"
            )));
        }
    };
    Ok(GridCell { x, y })
}
