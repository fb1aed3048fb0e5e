//! [`TileGrid`] maps map coordinates to tile addresses on a set of zoom levels and back.

use meridian_types::cartesian::{Corner, Point2, Rect, Size};
use serde::{Deserialize, Serialize};

use crate::error::MeridianError;
use crate::projection::Projection;

mod factory;
mod ogc;
mod pyramid;
mod tile_coord;

pub use factory::{
    create_for_extent, create_for_projection, create_xyz, resolutions_from_extent, XyzOptions,
    DEFAULT_MAX_ZOOM, DEFAULT_TILE_SIZE,
};
pub use ogc::{CornerOfOrigin, TileMatrix, TileMatrixSet};
pub use pyramid::{combine_pyramids, CombinedPyramid, ImagePyramid, PyramidLevel};
pub use tile_coord::{TileCoord, TileRange};

/// Tile indices are rounded to this number of decimals before flooring to absorb floating point noise.
const DECIMALS: i32 = 5;

/// Which zoom level to pick when a resolution falls between two levels of a grid.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZDirection {
    /// The level with the closest resolution.
    #[default]
    Nearest,
    /// The level with the smaller resolution (more detailed).
    Finer,
    /// The level with the larger resolution (less detailed).
    Coarser,
}

impl ZDirection {
    /// Converts a signed direction: negative values mean [`ZDirection::Finer`], positive values mean
    /// [`ZDirection::Coarser`].
    pub fn from_sign(direction: i32) -> Self {
        match direction {
            d if d < 0 => Self::Finer,
            d if d > 0 => Self::Coarser,
            _ => Self::Nearest,
        }
    }
}

/// Parameters of a [`TileGrid`].
///
/// Exactly one of `origin` and `origins` must be set, unless `extent` is given, in which case the top left corner of
/// the extent is used as the origin. `tile_size` and `tile_sizes` are mutually exclusive too; tiles are
/// [`DEFAULT_TILE_SIZE`] pixels square if neither is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileGridOptions {
    /// Area covered by the grid.
    pub extent: Option<Rect>,
    /// Lowest zoom level that can be used.
    pub min_zoom: u32,
    /// Origin shared by all levels.
    pub origin: Option<Point2>,
    /// Origin of every level.
    pub origins: Option<Vec<Point2>>,
    /// Resolutions of the levels, strictly decreasing.
    pub resolutions: Vec<f64>,
    /// Number of tile columns and rows of every level. Negative row count means that rows grow upwards.
    pub sizes: Option<Vec<[i64; 2]>>,
    /// Tile size shared by all levels, in pixels.
    pub tile_size: Option<Size>,
    /// Tile size of every level, in pixels.
    pub tile_sizes: Option<Vec<Size>>,
}

impl TileGridOptions {
    /// Options with the given resolutions and everything else unset.
    pub fn new(resolutions: Vec<f64>) -> Self {
        Self {
            resolutions,
            ..Default::default()
        }
    }

    /// Sets the grid extent.
    pub fn with_extent(mut self, extent: Rect) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Sets the minimum zoom level.
    pub fn with_min_zoom(mut self, min_zoom: u32) -> Self {
        self.min_zoom = min_zoom;
        self
    }

    /// Sets the origin shared by all levels.
    pub fn with_origin(mut self, origin: Point2) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Sets an origin per level.
    pub fn with_origins(mut self, origins: Vec<Point2>) -> Self {
        self.origins = Some(origins);
        self
    }

    /// Sets the number of columns and rows per level.
    pub fn with_sizes(mut self, sizes: Vec<[i64; 2]>) -> Self {
        self.sizes = Some(sizes);
        self
    }

    /// Sets the tile size shared by all levels.
    pub fn with_tile_size(mut self, tile_size: Size) -> Self {
        self.tile_size = Some(tile_size);
        self
    }

    /// Sets a tile size per level.
    pub fn with_tile_sizes(mut self, tile_sizes: Vec<Size>) -> Self {
        self.tile_sizes = Some(tile_sizes);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PerLevel<T> {
    Shared(T),
    Levels(Vec<T>),
}

impl<T: Copy> PerLevel<T> {
    fn get(&self, z: u32) -> Option<T> {
        match self {
            PerLevel::Shared(value) => Some(*value),
            PerLevel::Levels(values) => values.get(z as usize).copied(),
        }
    }

    fn last(&self) -> Option<T> {
        match self {
            PerLevel::Shared(value) => Some(*value),
            PerLevel::Levels(values) => values.last().copied(),
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct Level {
    origin: Point2,
    tile_size: Size,
    resolution: f64,
}

impl Level {
    fn tile_width(&self) -> f64 {
        self.tile_size.width() * self.resolution
    }

    fn tile_height(&self) -> f64 {
        self.tile_size.height() * self.resolution
    }
}

/// Discrete, multi-resolution tile addressing scheme.
///
/// Level `z` has resolution `resolutions[z]` (map units per pixel). Together with the origin and the tile size of
/// the level it partitions the plane into a regular grid of tiles. Tile `(z, x, y)` spans
/// `[origin.x + x * w, origin.y - (y + 1) * h, origin.x + (x + 1) * w, origin.y - y * h]`, where `w` and `h` are the
/// tile width and height in map units. Left and top edges belong to the tile, right and bottom edges belong to the
/// neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    min_zoom: u32,
    max_zoom: u32,
    resolutions: Vec<f64>,
    zoom_factor: Option<f64>,
    origins: PerLevel<Point2>,
    tile_sizes: PerLevel<Size>,
    extent: Option<Rect>,
    full_tile_ranges: Option<Vec<TileRange>>,
}

impl TileGrid {
    /// Creates a new grid, validating the options.
    pub fn new(options: TileGridOptions) -> Result<Self, MeridianError> {
        let TileGridOptions {
            extent,
            min_zoom,
            origin,
            origins,
            resolutions,
            sizes,
            tile_size,
            tile_sizes,
        } = options;

        if resolutions.is_empty() {
            return Err(config_error("tile grid must have at least one resolution"));
        }
        if resolutions.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(config_error("tile grid resolutions must be positive numbers"));
        }
        if resolutions.windows(2).any(|pair| pair[0] <= pair[1]) {
            return Err(config_error(
                "tile grid resolutions must be sorted in descending order",
            ));
        }

        let max_zoom = (resolutions.len() - 1) as u32;
        if min_zoom > max_zoom {
            return Err(config_error(format!(
                "minimum zoom {min_zoom} is larger than the maximum zoom {max_zoom}"
            )));
        }

        let zoom_factor = if origins.is_none() {
            common_ratio(&resolutions)
        } else {
            None
        };

        let levels = resolutions.len();
        let origins = match (origin, origins, extent) {
            (Some(_), Some(_), _) => {
                return Err(config_error(
                    "either origin or origins must be configured, never both",
                ))
            }
            (None, Some(origins), _) if origins.len() != levels => {
                return Err(config_error(format!(
                    "got {} origins for {levels} resolutions",
                    origins.len()
                )))
            }
            (None, Some(origins), _) => PerLevel::Levels(origins),
            (Some(origin), None, _) => PerLevel::Shared(origin),
            (None, None, Some(extent)) => PerLevel::Shared(extent.corner(Corner::TopLeft)),
            (None, None, None) => {
                return Err(config_error("tile grid needs an origin or an extent"));
            }
        };

        let tile_sizes = match (tile_size, tile_sizes) {
            (Some(_), Some(_)) => {
                return Err(config_error(
                    "either tile size or tile sizes must be configured, never both",
                ))
            }
            (None, Some(sizes)) if sizes.len() != levels => {
                return Err(config_error(format!(
                    "got {} tile sizes for {levels} resolutions",
                    sizes.len()
                )))
            }
            (None, Some(sizes)) => PerLevel::Levels(sizes),
            (Some(size), None) => PerLevel::Shared(size),
            (None, None) => PerLevel::Shared(Size::square(DEFAULT_TILE_SIZE)),
        };

        if let Some(sizes) = &sizes {
            if sizes.len() != levels {
                return Err(config_error(format!(
                    "got {} level sizes for {levels} resolutions",
                    sizes.len()
                )));
            }
        }

        let mut grid = Self {
            min_zoom,
            max_zoom,
            resolutions,
            zoom_factor,
            origins,
            tile_sizes,
            extent,
            full_tile_ranges: None,
        };

        grid.full_tile_ranges = match (sizes, extent) {
            (Some(sizes), _) => Some(grid.ranges_from_sizes(&sizes, extent.as_ref())),
            (None, Some(extent)) => Some(grid.ranges_from_extent(&extent)),
            (None, None) => None,
        };

        Ok(grid)
    }

    fn ranges_from_sizes(&self, sizes: &[[i64; 2]], extent: Option<&Rect>) -> Vec<TileRange> {
        sizes
            .iter()
            .enumerate()
            .map(|(z, [columns, rows])| {
                let mut range = TileRange::new(
                    (*columns).min(0),
                    (columns - 1).max(-1),
                    (*rows).min(0),
                    (rows - 1).max(-1),
                );

                let restricted = extent.and_then(|extent| {
                    let level = self.level_unchecked(z as u32)?;
                    Some(range_for_extent(&level, extent))
                });
                if let Some(restricted) = restricted {
                    range.min_x = range.min_x.max(restricted.min_x);
                    range.max_x = range.max_x.min(restricted.max_x);
                    range.min_y = range.min_y.max(restricted.min_y);
                    range.max_y = range.max_y.min(restricted.max_y);
                }

                range
            })
            .collect()
    }

    fn ranges_from_extent(&self, extent: &Rect) -> Vec<TileRange> {
        (0..=self.max_zoom)
            .filter_map(|z| self.level_unchecked(z))
            .map(|level| range_for_extent(&level, extent))
            .collect()
    }

    /// Grows the grid extent to include `extent` and recomputes the full tile ranges of all levels.
    pub fn extend(&mut self, extent: &Rect) {
        let extent = match self.extent {
            Some(current) => current.merge(*extent),
            None => *extent,
        };

        self.extent = Some(extent);
        self.full_tile_ranges = Some(self.ranges_from_extent(&extent));
    }

    /// Lowest zoom level.
    pub fn get_min_zoom(&self) -> u32 {
        self.min_zoom
    }

    /// Highest zoom level.
    pub fn get_max_zoom(&self) -> u32 {
        self.max_zoom
    }

    /// Resolutions of all levels, starting with level 0.
    pub fn get_resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    /// Ratio between resolutions of consecutive levels, if it is the same for all levels and the grid has a single
    /// origin.
    pub fn zoom_factor(&self) -> Option<f64> {
        self.zoom_factor
    }

    /// Area covered by the grid.
    pub fn get_extent(&self) -> Option<Rect> {
        self.extent
    }

    /// Resolution of the level `z`.
    pub fn get_resolution(&self, z: u32) -> Result<f64, MeridianError> {
        Ok(self.level(z)?.resolution)
    }

    /// Origin of the level `z`.
    pub fn get_origin(&self, z: u32) -> Result<Point2, MeridianError> {
        Ok(self.level(z)?.origin)
    }

    /// Tile size of the level `z`, in pixels.
    pub fn get_tile_size(&self, z: u32) -> Result<Size, MeridianError> {
        Ok(self.level(z)?.tile_size)
    }

    /// Grid with the same levels, continued down to `max_zoom` by halving the resolution of the last level.
    ///
    /// All levels of the new grid, including the ones below the minimum zoom of this grid, are addressable. Levels
    /// keep their own origins and tile sizes, new levels repeat the ones of the last level.
    pub fn extended_to_zoom(&self, max_zoom: u32) -> Result<TileGrid, MeridianError> {
        let mut resolutions = self.resolutions.clone();
        let mut origins = vec![];
        let mut tile_sizes = vec![];
        for z in 0..resolutions.len() as u32 {
            let level = self
                .level_unchecked(z)
                .ok_or_else(|| config_error(format!("level {z} is not configured")))?;
            origins.push(level.origin);
            tile_sizes.push(level.tile_size);
        }

        let (Some(origin), Some(tile_size)) = (self.origins.last(), self.tile_sizes.last()) else {
            return Err(config_error("tile grid has no levels"));
        };
        while resolutions.len() <= max_zoom as usize {
            let Some(last) = resolutions.last().copied() else {
                break;
            };
            resolutions.push(last / 2.0);
            origins.push(origin);
            tile_sizes.push(tile_size);
        }

        let mut options = TileGridOptions::new(resolutions)
            .with_origins(origins)
            .with_tile_sizes(tile_sizes);
        options.extent = self.extent;
        TileGrid::new(options)
    }

    /// Returns the level whose resolution is the closest to `resolution`, clamped to the zoom range of the grid.
    ///
    /// If `resolution` matches one of the levels exactly, that level is returned regardless of the direction.
    pub fn get_z_for_resolution(&self, resolution: f64, direction: ZDirection) -> u32 {
        let z = linear_find_nearest(&self.resolutions, resolution, direction) as u32;
        z.clamp(self.min_zoom, self.max_zoom)
    }

    /// Address of the tile containing the coordinate on the level `z`.
    pub fn get_tile_coord_for_coord_and_z(
        &self,
        coordinate: &Point2,
        z: u32,
    ) -> Result<TileCoord, MeridianError> {
        let level = self.level(z)?;
        let (x, y) = tile_xy(&level, coordinate.x, coordinate.y, false);
        Ok(TileCoord::new(z, x, y))
    }

    /// Address of the tile containing the coordinate on the level closest to `resolution`.
    pub fn get_tile_coord_for_coord_and_resolution(
        &self,
        coordinate: &Point2,
        resolution: f64,
    ) -> Result<TileCoord, MeridianError> {
        let z = self.get_z_for_resolution(resolution, ZDirection::Nearest);
        self.get_tile_coord_for_coord_and_z(coordinate, z)
    }

    /// Area covered by the tile.
    pub fn get_tile_coord_extent(&self, tile_coord: &TileCoord) -> Result<Rect, MeridianError> {
        let level = self.level(tile_coord.z)?;
        let x_min = level.origin.x + tile_coord.x as f64 * level.tile_width();
        let y_min = level.origin.y - (tile_coord.y + 1) as f64 * level.tile_height();
        let x_max = x_min + level.tile_width();
        let y_max = y_min + level.tile_height();

        Ok(Rect::new(
            x_min.min(x_max),
            y_min.min(y_max),
            x_min.max(x_max),
            y_min.max(y_max),
        ))
    }

    /// Center of the tile.
    pub fn get_tile_coord_center(&self, tile_coord: &TileCoord) -> Result<Point2, MeridianError> {
        let level = self.level(tile_coord.z)?;
        Ok(Point2::new(
            level.origin.x + (tile_coord.x as f64 + 0.5) * level.tile_width(),
            level.origin.y - (tile_coord.y as f64 + 0.5) * level.tile_height(),
        ))
    }

    /// Tiles of the level `z` covering the extent.
    ///
    /// An extent ending exactly on a tile edge does not include the tiles beyond that edge.
    pub fn get_tile_range_for_extent_and_z(
        &self,
        extent: &Rect,
        z: u32,
    ) -> Result<TileRange, MeridianError> {
        Ok(range_for_extent(&self.level(z)?, extent))
    }

    /// Area covered by the range of tiles of the level `z`.
    pub fn get_tile_range_extent(
        &self,
        z: u32,
        tile_range: &TileRange,
    ) -> Result<Rect, MeridianError> {
        let level = self.level(z)?;
        let x_min = level.origin.x + tile_range.min_x as f64 * level.tile_width();
        let x_max = level.origin.x + (tile_range.max_x + 1) as f64 * level.tile_width();
        let y_min = level.origin.y - (tile_range.max_y + 1) as f64 * level.tile_height();
        let y_max = level.origin.y - tile_range.min_y as f64 * level.tile_height();

        Ok(Rect::new(
            x_min.min(x_max),
            y_min.min(y_max),
            x_min.max(x_max),
            y_min.max(y_max),
        ))
    }

    /// All tiles of the level `z`, if the grid knows its extent or the level sizes.
    pub fn get_full_tile_range(&self, z: u32) -> Option<TileRange> {
        self.full_tile_ranges.as_ref()?.get(z as usize).copied()
    }

    /// Iterates over tiles of the level `z` covering the extent.
    pub fn tile_coords_for_extent(
        &self,
        extent: &Rect,
        z: u32,
    ) -> Result<impl Iterator<Item = TileCoord>, MeridianError> {
        Ok(self.get_tile_range_for_extent_and_z(extent, z)?.iter_coords(z))
    }

    /// Ranges of tiles on the lower levels covering the tile, starting with the level `z - 1` and ending with the
    /// minimum zoom level.
    pub fn parent_tile_ranges(&self, tile_coord: &TileCoord) -> Vec<(u32, TileRange)> {
        let mut ranges = vec![];
        if tile_coord.z <= self.min_zoom {
            return ranges;
        }

        if self.zoom_factor == Some(2.0) {
            let (mut x, mut y) = (tile_coord.x, tile_coord.y);
            for z in (self.min_zoom..tile_coord.z).rev() {
                x = x.div_euclid(2);
                y = y.div_euclid(2);
                ranges.push((z, TileRange::new(x, x, y, y)));
            }
        } else if let Ok(extent) = self.get_tile_coord_extent(tile_coord) {
            for z in (self.min_zoom..tile_coord.z).rev() {
                if let Ok(range) = self.get_tile_range_for_extent_and_z(&extent, z) {
                    ranges.push((z, range));
                }
            }
        }

        ranges
    }

    /// Tiles of the level `z + 1` covering the tile. `None` for the tiles of the last level.
    pub fn child_tile_range(&self, tile_coord: &TileCoord) -> Option<TileRange> {
        if tile_coord.z >= self.max_zoom {
            return None;
        }

        if self.zoom_factor == Some(2.0) {
            let x = tile_coord.x * 2;
            let y = tile_coord.y * 2;
            return Some(TileRange::new(x, x + 1, y, y + 1));
        }

        let extent = self.get_tile_coord_extent(tile_coord).ok()?;
        self.get_tile_range_for_extent_and_z(&extent, tile_coord.z + 1)
            .ok()
    }

    /// Returns true if the tile level is in the zoom range of the grid and the tile is inside the full tile range of
    /// the level (if the grid has one).
    pub fn tile_coord_within_grid(&self, tile_coord: &TileCoord) -> bool {
        if tile_coord.z < self.min_zoom || tile_coord.z > self.max_zoom {
            return false;
        }

        match self.get_full_tile_range(tile_coord.z) {
            Some(range) => range.contains(tile_coord),
            None => true,
        }
    }

    /// Folds a tile of a neighbouring world onto the world of the projection extent.
    ///
    /// Tiles whose center is inside the projection extent are returned unchanged.
    pub fn wrap_tile_coord_x(
        &self,
        tile_coord: &TileCoord,
        projection: &Projection,
    ) -> Result<TileCoord, MeridianError> {
        let mut center = self.get_tile_coord_center(tile_coord)?;
        let world = projection.extent_or_default();
        if world.contains(&center) {
            return Ok(*tile_coord);
        }

        let world_width = world.width();
        let worlds_away = ((world.x_min() - center.x) / world_width).ceil();
        center.x += world_width * worlds_away;
        self.get_tile_coord_for_coord_and_z(&center, tile_coord.z)
    }

    fn level(&self, z: u32) -> Result<Level, MeridianError> {
        if z < self.min_zoom || z > self.max_zoom {
            return Err(MeridianError::OutOfRange {
                z,
                min_zoom: self.min_zoom,
                max_zoom: self.max_zoom,
            });
        }

        self.level_unchecked(z).ok_or(MeridianError::OutOfRange {
            z,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
        })
    }

    fn level_unchecked(&self, z: u32) -> Option<Level> {
        Some(Level {
            origin: self.origins.get(z)?,
            tile_size: self.tile_sizes.get(z)?,
            resolution: *self.resolutions.get(z as usize)?,
        })
    }
}

fn config_error(message: impl Into<String>) -> MeridianError {
    MeridianError::Configuration(message.into())
}

fn common_ratio(resolutions: &[f64]) -> Option<f64> {
    let mut ratios = resolutions.windows(2).map(|pair| pair[0] / pair[1]);
    let first = ratios.next()?;
    ratios.all(|ratio| ratio == first).then_some(first)
}

fn round_to_decimals(value: f64) -> f64 {
    let factor = 10f64.powi(DECIMALS);
    (value * factor).round() / factor
}

/// With `reverse` set, points on the right or bottom edge of a tile belong to that tile instead of its neighbour.
fn tile_xy(level: &Level, x: f64, y: f64, reverse: bool) -> (i64, i64) {
    let tile_x = round_to_decimals((x - level.origin.x) / level.tile_width());
    let tile_y = round_to_decimals((level.origin.y - y) / level.tile_height());

    if reverse {
        (tile_x.ceil() as i64 - 1, tile_y.ceil() as i64 - 1)
    } else {
        (tile_x.floor() as i64, tile_y.floor() as i64)
    }
}

fn range_for_extent(level: &Level, extent: &Rect) -> TileRange {
    let (min_x, min_y) = tile_xy(level, extent.x_min(), extent.y_max(), false);
    let (max_x, max_y) = tile_xy(level, extent.x_max(), extent.y_min(), true);
    TileRange::new(min_x, max_x, min_y, max_y)
}

/// Index of the value closest to `target` in a strictly decreasing slice.
fn linear_find_nearest(values: &[f64], target: f64, direction: ZDirection) -> usize {
    let n = values.len();
    if n == 0 || values[0] <= target {
        return 0;
    }
    if target <= values[n - 1] {
        return n - 1;
    }

    match direction {
        ZDirection::Coarser => (1..n).find(|&i| values[i] < target).map_or(n - 1, |i| i - 1),
        ZDirection::Finer => (1..n).find(|&i| values[i] <= target).unwrap_or(n - 1),
        ZDirection::Nearest => {
            for i in 1..n {
                if values[i] == target {
                    return i;
                }
                if values[i] < target {
                    // Compare by ratio: 3 is as far from 2 as 1.5 is from 1.
                    return if values[i - 1] / target < target / values[i] {
                        i - 1
                    } else {
                        i
                    };
                }
            }

            n - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    use super::*;

    fn simple_grid() -> TileGrid {
        TileGrid::new(
            TileGridOptions::new(vec![8.0, 4.0, 2.0, 1.0])
                .with_extent(Rect::new(0.0, 0.0, 2048.0, 2048.0)),
        )
        .expect("valid grid")
    }

    #[test]
    fn rejects_invalid_options() {
        let unsorted = TileGridOptions::new(vec![1.0, 2.0]).with_origin(Point2::origin());
        assert_matches!(
            TileGrid::new(unsorted),
            Err(MeridianError::Configuration(_))
        );

        let equal = TileGridOptions::new(vec![2.0, 2.0]).with_origin(Point2::origin());
        assert_matches!(TileGrid::new(equal), Err(MeridianError::Configuration(_)));

        let no_origin = TileGridOptions::new(vec![2.0, 1.0]);
        assert_matches!(
            TileGrid::new(no_origin),
            Err(MeridianError::Configuration(_))
        );

        let both_origins = TileGridOptions::new(vec![2.0, 1.0])
            .with_origin(Point2::origin())
            .with_origins(vec![Point2::origin(), Point2::origin()]);
        assert_matches!(
            TileGrid::new(both_origins),
            Err(MeridianError::Configuration(_))
        );

        let wrong_origins = TileGridOptions::new(vec![2.0, 1.0]).with_origins(vec![Point2::origin()]);
        assert_matches!(
            TileGrid::new(wrong_origins),
            Err(MeridianError::Configuration(_))
        );

        let both_sizes = TileGridOptions::new(vec![2.0, 1.0])
            .with_origin(Point2::origin())
            .with_tile_size(Size::square(256.0))
            .with_tile_sizes(vec![Size::square(256.0), Size::square(512.0)]);
        assert_matches!(
            TileGrid::new(both_sizes),
            Err(MeridianError::Configuration(_))
        );

        let min_zoom = TileGridOptions::new(vec![2.0, 1.0])
            .with_origin(Point2::origin())
            .with_min_zoom(2);
        assert_matches!(TileGrid::new(min_zoom), Err(MeridianError::Configuration(_)));
    }

    #[test]
    fn resolution_out_of_range() {
        let grid = TileGrid::new(
            TileGridOptions::new(vec![8.0, 4.0, 2.0])
                .with_origin(Point2::origin())
                .with_min_zoom(1),
        )
        .expect("valid grid");

        assert_eq!(grid.get_resolution(1), Ok(4.0));
        assert_matches!(
            grid.get_resolution(0),
            Err(MeridianError::OutOfRange {
                z: 0,
                min_zoom: 1,
                max_zoom: 2
            })
        );
        assert_matches!(
            grid.get_resolution(3),
            Err(MeridianError::OutOfRange { z: 3, .. })
        );
    }

    #[test]
    fn zoom_factor() {
        assert_eq!(simple_grid().zoom_factor(), Some(2.0));

        let uneven = TileGrid::new(
            TileGridOptions::new(vec![9.0, 3.0, 2.0]).with_origin(Point2::origin()),
        )
        .expect("valid grid");
        assert_eq!(uneven.zoom_factor(), None);

        let with_origins = TileGrid::new(
            TileGridOptions::new(vec![4.0, 2.0]).with_origins(vec![Point2::origin(); 2]),
        )
        .expect("valid grid");
        assert_eq!(with_origins.zoom_factor(), None);
    }

    #[test]
    fn z_for_resolution() {
        let grid = simple_grid();
        for direction in [ZDirection::Nearest, ZDirection::Finer, ZDirection::Coarser] {
            assert_eq!(grid.get_z_for_resolution(16.0, direction), 0);
            assert_eq!(grid.get_z_for_resolution(8.0, direction), 0);
            assert_eq!(grid.get_z_for_resolution(4.0, direction), 1);
            assert_eq!(grid.get_z_for_resolution(2.0, direction), 2);
            assert_eq!(grid.get_z_for_resolution(0.5, direction), 3);
        }

        assert_eq!(grid.get_z_for_resolution(3.0, ZDirection::Nearest), 1);
        assert_eq!(grid.get_z_for_resolution(2.5, ZDirection::Nearest), 2);
        assert_eq!(grid.get_z_for_resolution(3.0, ZDirection::Finer), 2);
        assert_eq!(grid.get_z_for_resolution(2.1, ZDirection::Coarser), 1);
        assert_eq!(grid.get_z_for_resolution(3.9, ZDirection::Finer), 2);
    }

    #[test]
    fn z_for_resolution_is_clamped_to_min_zoom() {
        let grid = TileGrid::new(
            TileGridOptions::new(vec![8.0, 4.0, 2.0])
                .with_origin(Point2::origin())
                .with_min_zoom(1),
        )
        .expect("valid grid");

        assert_eq!(grid.get_z_for_resolution(100.0, ZDirection::Nearest), 1);
    }

    #[test]
    fn tile_coord_round_trip() {
        let grid = simple_grid();
        for z in 0..=grid.get_max_zoom() {
            let range = grid.get_full_tile_range(z).expect("grid has extent");
            for tile_coord in range.iter_coords(z) {
                let extent = grid.get_tile_coord_extent(&tile_coord).expect("valid level");
                let found = grid
                    .get_tile_coord_for_coord_and_z(&extent.center(), z)
                    .expect("valid level");
                assert_eq!(found, tile_coord);
            }
        }
    }

    #[test]
    fn resolutions_are_decreasing() {
        let grid = create_xyz(XyzOptions::default()).expect("valid grid");
        for pair in grid.get_resolutions().windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn right_and_bottom_edges_belong_to_neighbours() {
        let grid = simple_grid();
        let tile = TileCoord::new(2, 1, 1);
        let extent = grid.get_tile_coord_extent(&tile).expect("valid level");
        assert_eq!(extent, Rect::new(512.0, 1024.0, 1024.0, 1536.0));

        let right = Point2::new(extent.x_max(), extent.center().y);
        assert_eq!(
            grid.get_tile_coord_for_coord_and_z(&right, 2),
            Ok(TileCoord::new(2, 2, 1))
        );

        let bottom = Point2::new(extent.center().x, extent.y_min());
        assert_eq!(
            grid.get_tile_coord_for_coord_and_z(&bottom, 2),
            Ok(TileCoord::new(2, 1, 2))
        );

        let top_left = Point2::new(extent.x_min(), extent.y_max());
        assert_eq!(grid.get_tile_coord_for_coord_and_z(&top_left, 2), Ok(tile));
    }

    #[test]
    fn tile_index_absorbs_floating_point_noise() {
        let grid = simple_grid();
        let almost_edge = Point2::new(512.0 - 1e-9, 1500.0);
        assert_eq!(
            grid.get_tile_coord_for_coord_and_z(&almost_edge, 2),
            Ok(TileCoord::new(2, 1, 1))
        );
    }

    #[test]
    fn tile_range_for_extent() {
        let grid = simple_grid();
        let range = grid
            .get_tile_range_for_extent_and_z(&Rect::new(0.0, 1024.0, 1024.0, 2048.0), 2)
            .expect("valid level");
        assert_eq!(range, TileRange::new(0, 1, 0, 1));

        let extent = grid.get_tile_range_extent(2, &range).expect("valid level");
        assert_eq!(extent, Rect::new(0.0, 1024.0, 1024.0, 2048.0));

        assert_eq!(grid.get_full_tile_range(0), Some(TileRange::new(0, 0, 0, 0)));
        assert_eq!(grid.get_full_tile_range(3), Some(TileRange::new(0, 7, 0, 7)));
        assert_eq!(grid.get_full_tile_range(4), None);

        let coords: Vec<_> = grid
            .tile_coords_for_extent(&Rect::new(100.0, 1100.0, 600.0, 1200.0), 2)
            .expect("valid level")
            .collect();
        assert_eq!(
            coords,
            vec![TileCoord::new(2, 0, 1), TileCoord::new(2, 1, 1)]
        );
    }

    #[test]
    fn full_tile_range_from_sizes() {
        let grid = TileGrid::new(
            TileGridOptions::new(vec![2.0, 1.0])
                .with_origin(Point2::new(0.0, 0.0))
                .with_tile_size(Size::square(1.0))
                .with_sizes(vec![[2, -2], [4, -4]]),
        )
        .expect("valid grid");

        assert_eq!(grid.get_full_tile_range(0), Some(TileRange::new(0, 1, -2, -1)));
        assert_eq!(grid.get_full_tile_range(1), Some(TileRange::new(0, 3, -4, -1)));
        assert!(grid.tile_coord_within_grid(&TileCoord::new(1, 3, -4)));
        assert!(!grid.tile_coord_within_grid(&TileCoord::new(1, 3, 0)));
        assert!(!grid.tile_coord_within_grid(&TileCoord::new(2, 0, -1)));
    }

    #[test]
    fn parent_and_child_ranges() {
        let grid = simple_grid();
        let tile = TileCoord::new(3, 5, 2);
        assert_eq!(
            grid.parent_tile_ranges(&tile),
            vec![
                (2, TileRange::new(2, 2, 1, 1)),
                (1, TileRange::new(1, 1, 0, 0)),
                (0, TileRange::new(0, 0, 0, 0)),
            ]
        );
        assert_eq!(
            grid.child_tile_range(&TileCoord::new(1, 1, 0)),
            Some(TileRange::new(2, 3, 0, 1))
        );
        assert_eq!(grid.child_tile_range(&tile), None);
    }

    #[test]
    fn parent_and_child_ranges_without_zoom_factor() {
        let grid = TileGrid::new(
            TileGridOptions::new(vec![9.0, 3.0, 1.0]).with_origins(vec![Point2::new(0.0, 0.0); 3]),
        )
        .expect("valid grid");
        assert_eq!(grid.zoom_factor(), None);

        let tile = TileCoord::new(2, 4, 4);
        assert_eq!(
            grid.parent_tile_ranges(&tile),
            vec![(1, TileRange::new(1, 1, 1, 1)), (0, TileRange::new(0, 0, 0, 0)),]
        );
        assert_eq!(
            grid.child_tile_range(&TileCoord::new(0, 0, 0)),
            Some(TileRange::new(0, 2, 0, 2))
        );
    }

    #[test]
    fn extend_grows_full_ranges() {
        let mut grid = simple_grid();
        grid.extend(&Rect::new(-256.0, 0.0, 2048.0, 2048.0));
        assert_eq!(grid.get_extent(), Some(Rect::new(-256.0, 0.0, 2048.0, 2048.0)));
        assert_eq!(grid.get_full_tile_range(3), Some(TileRange::new(-1, 7, 0, 7)));
    }

    #[test]
    fn wrap_x_is_idempotent() {
        let grid = create_xyz(XyzOptions::default().with_max_zoom(4)).expect("valid grid");
        let projection = Projection::epsg_3857();

        for x in -20..20 {
            let tile = TileCoord::new(2, x, 1);
            let wrapped = grid.wrap_tile_coord_x(&tile, &projection).expect("valid level");
            assert!((0..4).contains(&wrapped.x), "{tile} wrapped to {wrapped}");
            assert_eq!(wrapped.x, x.rem_euclid(4));
            assert_eq!(wrapped.y, 1);
            assert_eq!(
                grid.wrap_tile_coord_x(&wrapped, &projection),
                Ok(wrapped)
            );
        }
    }

    #[test]
    fn default_xyz_grid() {
        let grid = create_xyz(XyzOptions::default()).expect("valid grid");
        let resolution = grid.get_resolution(0).expect("valid level");
        assert_abs_diff_eq!(resolution, 156543.03392804097, epsilon = 1e-6);

        let tile = grid
            .get_tile_coord_for_coord_and_resolution(&Point2::new(0.0, 0.0), resolution)
            .expect("valid level");
        assert_eq!(tile, TileCoord::new(0, 0, 0));

        let extent = grid.get_tile_coord_extent(&tile).expect("valid level");
        let world = Projection::epsg_3857().extent_or_default();
        assert_abs_diff_eq!(extent.x_min(), world.x_min(), epsilon = 1e-6);
        assert_abs_diff_eq!(extent.y_min(), world.y_min(), epsilon = 1e-6);
        assert_abs_diff_eq!(extent.x_max(), world.x_max(), epsilon = 1e-6);
        assert_abs_diff_eq!(extent.y_max(), world.y_max(), epsilon = 1e-6);
    }

    #[test]
    fn options_from_json() {
        let options: TileGridOptions = serde_json::from_str(
            r#"{"resolutions": [4.0, 2.0], "origin": [10.0, 20.0], "tile_size": {"width": 512.0, "height": 512.0}}"#,
        )
        .expect("valid json");
        let grid = TileGrid::new(options).expect("valid grid");
        assert_eq!(grid.get_origin(1), Ok(Point2::new(10.0, 20.0)));
        assert_eq!(grid.get_tile_size(0), Ok(Size::square(512.0)));
        assert_eq!(grid.get_full_tile_range(0), None);
    }

    #[test]
    fn extended_grid_keeps_levels_and_halves_resolution() {
        let grid = TileGrid::new(
            TileGridOptions::new(vec![8.0, 4.0, 2.0])
                .with_extent(Rect::new(0.0, 0.0, 2048.0, 2048.0))
                .with_min_zoom(1),
        )
        .expect("valid grid");

        let extended = grid.extended_to_zoom(5).expect("valid grid");
        assert_eq!(extended.get_min_zoom(), 0);
        assert_eq!(extended.get_max_zoom(), 5);
        assert_eq!(extended.get_resolutions(), &[8.0, 4.0, 2.0, 1.0, 0.5, 0.25]);
        assert_eq!(extended.get_origin(0), Ok(Point2::new(0.0, 2048.0)));
        assert_eq!(extended.get_origin(5), Ok(Point2::new(0.0, 2048.0)));
        assert_eq!(extended.get_extent(), grid.get_extent());
        assert_eq!(
            extended.child_tile_range(&TileCoord::new(3, 1, 1)),
            Some(TileRange::new(2, 3, 2, 3))
        );
    }
}
