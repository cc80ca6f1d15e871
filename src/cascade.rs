//! Cascade resolution: clear matched cells, settle survivors, refill.

use rand::Rng;

use crate::cluster::Cluster;
use crate::grid::{COLS, Grid, ROWS, random_symbol};

/// Remove every cluster cell, let the surviving symbols in each column fall
/// toward the bottom (high row indices) keeping their relative order, and
/// fill the vacated top rows with fresh uniform draws.
///
/// Columns are independent; the input grid is not mutated. Cleared values are
/// never reused — every vacated cell gets a fresh draw.
pub fn apply_cascade(grid: &Grid, clusters: &[Cluster], rng: &mut impl Rng) -> Grid {
    // Transient removal mask: marked cells are "empty" pending refill.
    let mut removed = [[false; ROWS]; COLS];
    for cluster in clusters {
        for cell in &cluster.cells {
            removed[cell.col][cell.row] = true;
        }
    }

    let cols = std::array::from_fn(|c| {
        let survivors: Vec<_> = (0..ROWS)
            .filter(|&r| !removed[c][r])
            .map(|r| grid.symbol_at(c, r))
            .collect();
        let missing = ROWS - survivors.len();
        let mut column = [grid.symbol_at(c, 0); ROWS];
        for slot in column.iter_mut().take(missing) {
            *slot = random_symbol(rng);
        }
        column[missing..].copy_from_slice(&survivors);
        column
    });
    Grid::from_columns(cols)
}
