use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Address of a tile in a [`TileGrid`](super::TileGrid).
///
/// `x` grows to the right and `y` grows downwards from the origin of the level. Both can be negative or point
/// outside of the grid extent: tiles of neighbouring worlds are addressed with `x` values beyond the grid range.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level.
    pub z: u32,
    /// Column.
    pub x: i64,
    /// Row.
    pub y: i64,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    pub const fn new(z: u32, x: i64, y: i64) -> Self {
        Self { z, x, y }
    }
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Inclusive range of tile columns and rows on one zoom level.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct TileRange {
    /// First column.
    pub min_x: i64,
    /// Last column.
    pub max_x: i64,
    /// First row.
    pub min_y: i64,
    /// Last row.
    pub max_y: i64,
}

impl TileRange {
    /// Creates a new range. Bounds are inclusive.
    pub const fn new(min_x: i64, max_x: i64, min_y: i64, max_y: i64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Returns true if the range contains the tile column and row.
    pub fn contains_xy(&self, x: i64, y: i64) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }

    /// Returns true if the range contains the tile. The zoom level is not checked.
    pub fn contains(&self, tile_coord: &TileCoord) -> bool {
        self.contains_xy(tile_coord.x, tile_coord.y)
    }

    /// Returns true if `other` lies completely inside the range.
    pub fn contains_range(&self, other: &TileRange) -> bool {
        self.min_x <= other.min_x
            && other.max_x <= self.max_x
            && self.min_y <= other.min_y
            && other.max_y <= self.max_y
    }

    /// Returns true if the ranges have at least one common tile.
    pub fn intersects(&self, other: &TileRange) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Grows the range to include `other`.
    pub fn extend(&mut self, other: &TileRange) {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Number of columns.
    pub fn width(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    /// Number of rows.
    pub fn height(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    /// Returns true if the range contains no tiles.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Iterates over the tiles of the range on the level `z`, column by column.
    pub fn iter_coords(&self, z: u32) -> impl Iterator<Item = TileCoord> {
        let TileRange {
            min_x,
            max_x,
            min_y,
            max_y,
        } = *self;
        (min_x..=max_x).flat_map(move |x| (min_y..=max_y).map(move |y| TileCoord::new(z, x, y)))
    }
}
