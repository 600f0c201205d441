//! Sequential cell midpoints
//!
//! The unit interval is split into `total_cells` equal cells. A rank owns a contiguous
//! run of them and walks their midpoints in order, wrapping back to its first cell
//! when the run is exhausted.

use crate::distribution::Distribution;

/// Midpoints of a contiguous run of cells
#[derive(Debug)]
pub struct SequentialDistribution {
    first_cell: u64,
    cells: u64,
    total_cells: u64,
    /// Offset of the next cell within the run
    current: u64,
}

impl SequentialDistribution {
    /// Walk cells `first_cell .. first_cell + cells` out of `total_cells`
    pub fn new(first_cell: u64, cells: u64, total_cells: u64) -> Self {
        Self {
            first_cell,
            cells,
            total_cells: total_cells.max(1),
            current: 0,
        }
    }

    /// Width of one cell in unit-interval coordinates
    pub fn cell_width(&self) -> f64 {
        1.0 / self.total_cells as f64
    }
}

impl Distribution for SequentialDistribution {
    fn next_unit(&mut self) -> f64 {
        if self.cells == 0 {
            return 0.0;
        }

        let cell = self.first_cell + self.current;

        self.current += 1;
        if self.current >= self.cells {
            self.current = 0;
        }

        (cell as f64 + 0.5) / self.total_cells as f64
    }
}
