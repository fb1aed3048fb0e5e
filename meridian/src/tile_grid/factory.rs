//! Constructors of commonly used grids.

use meridian_types::cartesian::{Corner, Rect, Size};
use serde::{Deserialize, Serialize};

use super::{TileGrid, TileGridOptions};
use crate::error::MeridianError;
use crate::projection::Projection;

/// Maximum zoom level of generated grids, unless specified otherwise.
pub const DEFAULT_MAX_ZOOM: u32 = 42;
/// Side of a square tile in pixels, unless specified otherwise.
pub const DEFAULT_TILE_SIZE: f64 = 256.0;

/// Creates `max_zoom + 1` resolutions, each half of the previous one.
///
/// Resolution of the level 0 is `max_resolution` or, if it is not given, the resolution at which the whole extent
/// fits into one tile.
pub fn resolutions_from_extent(
    extent: &Rect,
    max_zoom: Option<u32>,
    tile_size: Option<Size>,
    max_resolution: Option<f64>,
) -> Result<Vec<f64>, MeridianError> {
    let max_zoom = max_zoom.unwrap_or(DEFAULT_MAX_ZOOM);
    let tile_size = tile_size.unwrap_or(Size::square(DEFAULT_TILE_SIZE));

    let max_resolution = match max_resolution {
        Some(resolution) if resolution > 0.0 => resolution,
        _ => (extent.width() / tile_size.width()).max(extent.height() / tile_size.height()),
    };

    if !max_resolution.is_finite() || max_resolution <= 0.0 {
        return Err(MeridianError::Configuration(format!(
            "cannot derive resolutions from extent {extent:?} and tile size {tile_size:?}"
        )));
    }

    Ok((0..=max_zoom)
        .map(|z| max_resolution / 2f64.powi(z as i32))
        .collect())
}

/// Creates a grid covering the extent with the origin at the given corner of the extent.
pub fn create_for_extent(
    extent: &Rect,
    max_zoom: Option<u32>,
    tile_size: Option<Size>,
    corner: Corner,
) -> Result<TileGrid, MeridianError> {
    let resolutions = resolutions_from_extent(extent, max_zoom, tile_size, None)?;
    let mut options = TileGridOptions::new(resolutions)
        .with_extent(*extent)
        .with_origin(extent.corner(corner));
    options.tile_size = tile_size;

    TileGrid::new(options)
}

/// Creates a grid covering the extent of the projection (see [`Projection::extent_or_default`]).
pub fn create_for_projection(
    projection: &Projection,
    max_zoom: Option<u32>,
    tile_size: Option<Size>,
    corner: Corner,
) -> Result<TileGrid, MeridianError> {
    create_for_extent(&projection.extent_or_default(), max_zoom, tile_size, corner)
}

/// Parameters of a standard XYZ grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XyzOptions {
    /// Extent of the grid. Web Mercator extent if not set.
    pub extent: Option<Rect>,
    /// Resolution of the level 0.
    pub max_resolution: Option<f64>,
    /// Maximum zoom level, [`DEFAULT_MAX_ZOOM`] if not set.
    pub max_zoom: Option<u32>,
    /// Minimum zoom level.
    pub min_zoom: u32,
    /// Tile size in pixels.
    pub tile_size: Option<Size>,
}

impl XyzOptions {
    /// Sets the extent.
    pub fn with_extent(mut self, extent: Rect) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Sets the resolution of the level 0.
    pub fn with_max_resolution(mut self, max_resolution: f64) -> Self {
        self.max_resolution = Some(max_resolution);
        self
    }

    /// Sets the maximum zoom level.
    pub fn with_max_zoom(mut self, max_zoom: u32) -> Self {
        self.max_zoom = Some(max_zoom);
        self
    }

    /// Sets the minimum zoom level.
    pub fn with_min_zoom(mut self, min_zoom: u32) -> Self {
        self.min_zoom = min_zoom;
        self
    }

    /// Sets the tile size.
    pub fn with_tile_size(mut self, tile_size: Size) -> Self {
        self.tile_size = Some(tile_size);
        self
    }
}

/// Creates a grid with the standard XYZ tiling scheme: origin at the top left corner of the extent, every level
/// twice as detailed as the previous one.
///
/// Minimum zoom is clamped to the maximum zoom.
pub fn create_xyz(options: XyzOptions) -> Result<TileGrid, MeridianError> {
    let extent = options
        .extent
        .unwrap_or_else(|| Projection::epsg_3857().extent_or_default());
    let max_zoom = options.max_zoom.unwrap_or(DEFAULT_MAX_ZOOM);
    let resolutions = resolutions_from_extent(
        &extent,
        Some(max_zoom),
        options.tile_size,
        options.max_resolution,
    )?;

    let mut grid_options = TileGridOptions::new(resolutions)
        .with_extent(extent)
        .with_min_zoom(options.min_zoom.min(max_zoom));
    grid_options.tile_size = options.tile_size;

    TileGrid::new(grid_options)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use meridian_types::cartesian::Point2;

    use super::*;
    use crate::projection::Units;
    use crate::tile_grid::TileCoord;

    #[test]
    fn resolutions() {
        let extent = Rect::new(0.0, 0.0, 1024.0, 512.0);
        let resolutions =
            resolutions_from_extent(&extent, Some(3), None, None).expect("valid extent");
        assert_eq!(resolutions, vec![4.0, 2.0, 1.0, 0.5]);

        let resolutions = resolutions_from_extent(&extent, Some(1), None, Some(10.0))
            .expect("valid extent");
        assert_eq!(resolutions, vec![10.0, 5.0]);

        assert_eq!(
            resolutions_from_extent(&extent, None, None, None)
                .expect("valid extent")
                .len(),
            43
        );
    }

    #[test]
    fn degenerate_extent() {
        let extent = Rect::new(1.0, 1.0, 1.0, 1.0);
        assert_matches!(
            resolutions_from_extent(&extent, None, None, None),
            Err(MeridianError::Configuration(_))
        );
    }

    #[test]
    fn grid_for_extent_with_bottom_left_origin() {
        let extent = Rect::new(0.0, 0.0, 512.0, 512.0);
        let grid = create_for_extent(&extent, Some(2), None, Corner::BottomLeft)
            .expect("valid grid");
        assert_eq!(grid.get_origin(0), Ok(Point2::new(0.0, 0.0)));
        assert_eq!(
            grid.get_tile_coord_for_coord_and_z(&Point2::new(10.0, 10.0), 1),
            Ok(TileCoord::new(1, 0, -1))
        );
    }

    #[test]
    fn xyz_clamps_min_zoom() {
        let grid = create_xyz(XyzOptions::default().with_max_zoom(5).with_min_zoom(10))
            .expect("valid grid");
        assert_eq!(grid.get_min_zoom(), 5);
        assert_eq!(grid.get_max_zoom(), 5);
    }

    #[test]
    fn xyz_with_custom_tile_size() {
        let grid = create_xyz(
            XyzOptions::default()
                .with_max_zoom(2)
                .with_tile_size(Size::square(512.0)),
        )
        .expect("valid grid");
        let extent = Projection::epsg_3857().extent_or_default();
        assert_abs_diff_eq!(
            grid.get_resolution(0).expect("valid level"),
            extent.width() / 512.0
        );
    }

    #[test]
    fn grid_for_projection_without_extent() {
        let projection = Projection::new("EPSG:4326", Units::Degrees);
        let grid = create_for_projection(&projection, Some(0), None, Corner::TopLeft)
            .expect("valid grid");
        let extent = grid.get_extent().expect("grid has extent");
        assert_abs_diff_eq!(extent.x_min(), -180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(extent.y_max(), 180.0, epsilon = 1e-9);
    }
}
