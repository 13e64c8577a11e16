//! Coverage records and the per-user cache hierarchy

use std::collections::BTreeMap;

use bitvec::prelude::*;

use crate::tile::TileCoordinate;

/// Bit vector over an ancestor's descendant leaf tiles
pub type Bitmask = BitVec<u8, Lsb0>;

/// Coverage of one ancestor tile at one leaf zoom.
///
/// Both masks hold `side * side` bits, indexed row-major. Invariant:
/// every bit set in `max_square` is also set in `tiles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRecord {
    side: u32,
    tiles: Bitmask,
    max_square: Bitmask,
}

impl CoverageRecord {
    /// Empty record over a `side × side` grid of leaf tiles
    pub fn new(side: u32) -> Self {
        let bits = side as usize * side as usize;
        Self {
            side,
            tiles: bitvec![u8, Lsb0; 0; bits],
            max_square: bitvec![u8, Lsb0; 0; bits],
        }
    }

    /// Rebuild a record from raw masks; `None` if the shapes disagree or
    /// `max_square` is not a subset of `tiles`
    pub fn from_parts(side: u32, tiles: Bitmask, max_square: Bitmask) -> Option<Self> {
        let bits = side as usize * side as usize;
        let record = Self {
            side,
            tiles,
            max_square,
        };
        (record.tiles.len() == bits && record.max_square.len() == bits && record.is_consistent())
            .then_some(record)
    }

    /// Leaf tiles per axis under this ancestor
    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn tiles(&self) -> &BitSlice<u8, Lsb0> {
        &self.tiles
    }

    pub fn max_square(&self) -> &BitSlice<u8, Lsb0> {
        &self.max_square
    }

    /// Mark leaf `idx` as covered, and as part of a maximal square if requested
    pub fn mark(&mut self, idx: usize, in_max_square: bool) {
        self.tiles.set(idx, true);
        if in_max_square {
            self.max_square.set(idx, true);
        }
    }

    pub fn is_covered(&self, idx: usize) -> bool {
        self.tiles.get(idx).is_some_and(|bit| *bit)
    }

    pub fn in_max_square(&self, idx: usize) -> bool {
        self.max_square.get(idx).is_some_and(|bit| *bit)
    }

    pub fn covered_count(&self) -> usize {
        self.tiles.count_ones()
    }

    /// `max_square ⊆ tiles`
    pub fn is_consistent(&self) -> bool {
        self.max_square.iter_ones().all(|idx| self.is_covered(idx))
    }
}

/// Coverage records of every ancestor tile for one leaf zoom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCache {
    leaf_zoom: u8,
    records: BTreeMap<TileCoordinate, CoverageRecord>,
}

impl LevelCache {
    pub fn new(leaf_zoom: u8) -> Self {
        Self {
            leaf_zoom,
            records: BTreeMap::new(),
        }
    }

    pub fn leaf_zoom(&self) -> u8 {
        self.leaf_zoom
    }

    /// Record for an ancestor tile; `None` means fully uncovered
    pub fn get(&self, tile: &TileCoordinate) -> Option<&CoverageRecord> {
        self.records.get(tile)
    }

    /// Record for `tile`, created empty on first access
    pub fn record_mut(&mut self, tile: TileCoordinate, side: u32) -> &mut CoverageRecord {
        self.records
            .entry(tile)
            .or_insert_with(|| CoverageRecord::new(side))
    }

    pub fn insert(&mut self, tile: TileCoordinate, record: CoverageRecord) {
        self.records.insert(tile, record);
    }

    /// Records in ascending tile order
    pub fn records(&self) -> impl Iterator<Item = (&TileCoordinate, &CoverageRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// All leaf zoom levels of one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserCache {
    levels: BTreeMap<u8, LevelCache>,
}

impl UserCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, level: LevelCache) {
        self.levels.insert(level.leaf_zoom(), level);
    }

    pub fn level(&self, leaf_zoom: u8) -> Option<&LevelCache> {
        self.levels.get(&leaf_zoom)
    }

    /// Configured leaf zooms, ascending
    pub fn leaf_zooms(&self) -> Vec<u8> {
        self.levels.keys().copied().collect()
    }

    pub fn levels(&self) -> impl Iterator<Item = &LevelCache> {
        self.levels.values()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
