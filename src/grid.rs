//! Grid data model and random generation with win/no-win guarantees.

use rand::Rng;

/// Grid width in columns.
pub const COLS: usize = 7;
/// Grid height in rows. Row 0 is the top; symbols settle toward high rows.
pub const ROWS: usize = 7;

/// Reel symbols (fixed alphabet of 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Cherry,
    Lemon,
    Grape,
    Bell,
    Star,
    Gem,
    Seven,
}

impl Symbol {
    pub const ALL: [Self; 7] = [
        Self::Cherry,
        Self::Lemon,
        Self::Grape,
        Self::Bell,
        Self::Star,
        Self::Gem,
        Self::Seven,
    ];

    /// Colour index 0..7 for theme.symbol_color().
    pub fn color_index(self) -> u8 {
        match self {
            Self::Cherry => 0,
            Self::Lemon => 1,
            Self::Grape => 2,
            Self::Bell => 3,
            Self::Star => 4,
            Self::Gem => 5,
            Self::Seven => 6,
        }
    }

    /// Single-glyph label drawn in the cell centre.
    pub fn glyph(self) -> char {
        match self {
            Self::Cherry => '●',
            Self::Lemon => '◆',
            Self::Grape => '✿',
            Self::Bell => '♠',
            Self::Star => '★',
            Self::Gem => '◈',
            Self::Seven => '7',
        }
    }
}

/// A (column, row) cell address. Valid iff col < COLS and row < ROWS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub col: usize,
    pub row: usize,
}

impl Coord {
    pub fn new(col: usize, row: usize) -> Self {
        debug_assert!(col < COLS && row < ROWS);
        Self { col, row }
    }
}

/// 7×7 symbol grid, column-major: `cols[c][r]`, row 0 at the top.
///
/// The fixed-size array makes malformed grids (wrong dimensions, missing
/// cells) unrepresentable, so construction never needs a runtime check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    cols: [[Symbol; ROWS]; COLS],
}

impl Grid {
    pub fn from_columns(cols: [[Symbol; ROWS]; COLS]) -> Self {
        Self { cols }
    }

    /// Build a grid cell by cell from `f(col, row)`.
    pub fn from_fn(mut f: impl FnMut(usize, usize) -> Symbol) -> Self {
        let cols = std::array::from_fn(|c| std::array::from_fn(|r| f(c, r)));
        Self { cols }
    }

    /// Grid filled with a single symbol.
    pub fn filled(symbol: Symbol) -> Self {
        Self {
            cols: [[symbol; ROWS]; COLS],
        }
    }

    #[inline]
    pub fn get(&self, coord: Coord) -> Symbol {
        self.cols[coord.col][coord.row]
    }

    #[inline]
    pub fn symbol_at(&self, col: usize, row: usize) -> Symbol {
        self.cols[col][row]
    }

    /// Column `col` top to bottom.
    #[inline]
    pub fn column(&self, col: usize) -> &[Symbol; ROWS] {
        &self.cols[col]
    }
}

/// One uniform draw from the symbol alphabet. This is the per-cell
/// distribution shared by generation and cascade refill.
pub fn random_symbol(rng: &mut impl Rng) -> Symbol {
    Symbol::ALL[rng.gen_range(0..Symbol::ALL.len())]
}

/// Fill every cell with an independent uniform symbol. No match guarantee.
pub fn random_grid(rng: &mut impl Rng) -> Grid {
    Grid::from_fn(|_, _| random_symbol(rng))
}

/// Rejection-sample random grids until one has no clusters.
///
/// Unbounded retry by design: for a 7×7 grid over 7 symbols a matchless grid
/// comes up within a handful of attempts, and terminating with probability 1
/// is enough — a retry cap would skew the accepted distribution.
pub fn no_match_grid(rng: &mut impl Rng) -> Grid {
    loop {
        let grid = random_grid(rng);
        if crate::cluster::find_clusters(&grid).is_empty() {
            return grid;
        }
    }
}

/// Rejection-sample random grids until one has at least one cluster.
pub fn guaranteed_match_grid(rng: &mut impl Rng) -> Grid {
    loop {
        let grid = random_grid(rng);
        if !crate::cluster::find_clusters(&grid).is_empty() {
            return grid;
        }
    }
}
