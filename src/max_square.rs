//! Largest fully-covered square of leaf tiles
//!
//! Dynamic-programming formulation anchored at the top-left corner:
//! `s(x, y) = 1 + min(s(x+1, y), s(x, y+1), s(x+1, y+1))`, where a missing
//! neighbour counts as 0. Cells are visited in decreasing `(y, x)` order so
//! all three neighbours are known before a cell is evaluated. `s(x, y)` is
//! exactly the size reached by growing a square from `(x, y)` until a cell
//! is missing, and every anchor reaching the global maximum is reported.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{Error, Result};

/// Square block of covered leaf tiles, `bottom_right` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MaxSquare {
    pub top_left: (u32, u32),
    pub size: u32,
}

impl MaxSquare {
    pub fn new(x: u32, y: u32, size: u32) -> Self {
        Self {
            top_left: (x, y),
            size,
        }
    }

    /// Exclusive bottom-right corner
    pub fn bottom_right(&self) -> (u32, u32) {
        (self.top_left.0 + self.size, self.top_left.1 + self.size)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (right, bottom) = self.bottom_right();
        (self.top_left.0..right).contains(&x) && (self.top_left.1..bottom).contains(&y)
    }

    /// All cells of the square, row by row
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let (x0, y0) = self.top_left;
        (y0..y0 + self.size).flat_map(move |y| (x0..x0 + self.size).map(move |x| (x, y)))
    }
}

/// Find every maximal covered square in a set of leaf coordinates.
///
/// All returned squares share the same size; the list is sorted by
/// top-left `(y, x)`. Fails with `EmptyCoverage` on an empty set.
pub fn max_squares(covered: &HashSet<(u32, u32)>) -> Result<Vec<MaxSquare>> {
    if covered.is_empty() {
        return Err(Error::EmptyCoverage);
    }

    let mut order: Vec<(u32, u32)> = covered.iter().copied().collect();
    order.sort_unstable_by(|a, b| (b.1, b.0).cmp(&(a.1, a.0)));

    let mut sizes: HashMap<(u32, u32), u32> = HashMap::with_capacity(order.len());
    let mut best = 0;
    for &(x, y) in &order {
        let size_at = |cell: (u32, u32)| sizes.get(&cell).copied().unwrap_or(0);
        let right = size_at((x + 1, y));
        let below = size_at((x, y + 1));
        let diagonal = size_at((x + 1, y + 1));
        let size = 1 + right.min(below).min(diagonal);
        best = best.max(size);
        sizes.insert((x, y), size);
    }

    let mut squares: Vec<MaxSquare> = sizes
        .into_iter()
        .filter(|&(_, size)| size == best)
        .map(|((x, y), size)| MaxSquare::new(x, y, size))
        .collect();
    squares.sort_unstable_by_key(|s| (s.top_left.1, s.top_left.0));
    Ok(squares)
}

/// Union of the cells of all squares
pub fn square_cells(squares: &[MaxSquare]) -> HashSet<(u32, u32)> {
    squares.iter().flat_map(MaxSquare::cells).collect()
}
