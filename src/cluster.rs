//! Cluster detection: maximal 4-connected same-symbol regions of size ≥ 3.

use crate::grid::{COLS, Coord, Grid, ROWS, Symbol};

/// Minimum component size that counts as a match.
pub const MIN_CLUSTER: usize = 3;

/// A maximal 4-connected group of cells sharing one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub symbol: Symbol,
    pub cells: Vec<Coord>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, coord: Coord) -> bool {
        self.cells.contains(&coord)
    }
}

/// Connected-component labelling over the grid, 4-directional adjacency,
/// symbol equality as the connectivity predicate.
///
/// Iterative flood fill with an explicit worklist and a visited mask, so
/// every cell is visited exactly once and a 49-cell component costs no
/// recursion depth. Components smaller than [`MIN_CLUSTER`] are dropped;
/// emitted clusters are pairwise disjoint.
pub fn find_clusters(grid: &Grid) -> Vec<Cluster> {
    let mut visited = [[false; ROWS]; COLS];
    let mut clusters = Vec::new();

    for col in 0..COLS {
        for row in 0..ROWS {
            if visited[col][row] {
                continue;
            }
            let symbol = grid.symbol_at(col, row);
            let mut cells = Vec::new();
            let mut stack = vec![Coord::new(col, row)];
            visited[col][row] = true;

            while let Some(coord) = stack.pop() {
                cells.push(coord);
                for (nc, nr) in neighbours(coord) {
                    if !visited[nc][nr] && grid.symbol_at(nc, nr) == symbol {
                        visited[nc][nr] = true;
                        stack.push(Coord::new(nc, nr));
                    }
                }
            }

            if cells.len() >= MIN_CLUSTER {
                clusters.push(Cluster { symbol, cells });
            }
        }
    }
    clusters
}

/// In-bounds 4-neighbours of a cell.
fn neighbours(coord: Coord) -> impl Iterator<Item = (usize, usize)> {
    let (c, r) = (coord.col as isize, coord.row as isize);
    [(c + 1, r), (c - 1, r), (c, r + 1), (c, r - 1)]
        .into_iter()
        .filter(|&(nc, nr)| nc >= 0 && nc < COLS as isize && nr >= 0 && nr < ROWS as isize)
        .map(|(nc, nr)| (nc as usize, nr as usize))
}
