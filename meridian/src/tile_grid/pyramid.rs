//! Combination of several image pyramids into one tile grid.
//!
//! Multi-band raster sources read every band from its own file. All files must describe the same pyramid: the same
//! origin, the same tile sizes and resolutions that differ only by a constant factor. Files may have fewer overview
//! levels than the others, in which case the combined grid starts at a higher zoom level.

use log::error;
use meridian_types::cartesian::{Point2, Rect, Size};

use super::{TileGrid, TileGridOptions};
use crate::error::MeridianError;

const RESOLUTION_TOLERANCE: f64 = 0.02;
const RENDER_TILE_SIZE_TOLERANCE: f64 = 0.01;

/// One level of an image pyramid.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PyramidLevel {
    /// Map units per pixel along X.
    pub resolution: f64,
    /// Map units per pixel along Y. Can be negative for images stored bottom-up.
    pub y_resolution: f64,
    /// Size of the tiles of the image in pixels.
    pub tile_size: Size,
}

impl PyramidLevel {
    /// Level with square pixels.
    pub fn new(resolution: f64, tile_size: Size) -> Self {
        Self {
            resolution,
            y_resolution: resolution,
            tile_size,
        }
    }

    /// Sets a different resolution along Y.
    pub fn with_y_resolution(mut self, y_resolution: f64) -> Self {
        self.y_resolution = y_resolution;
        self
    }

    /// Size of the tile when rendered with square pixels.
    pub fn render_tile_size(&self) -> Size {
        let aspect_ratio = self.resolution / self.y_resolution.abs();
        Size::new(
            self.tile_size.width(),
            self.tile_size.height() / aspect_ratio,
        )
    }
}

/// Description of one raster file with its overviews.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePyramid {
    /// Area covered by the image.
    pub extent: Rect,
    /// Position of the top left pixel of the image.
    pub origin: Point2,
    /// Levels of the pyramid, starting with the least detailed one.
    pub levels: Vec<PyramidLevel>,
}

/// Result of [`combine_pyramids`].
#[derive(Debug, Clone)]
pub struct CombinedPyramid {
    /// Grid shared by all pyramids.
    pub tile_grid: TileGrid,
    /// For every pyramid, the factor to multiply its pixel coordinates by to get the pixel coordinates of the grid.
    pub resolution_factors: Vec<f64>,
    /// Tile sizes of the source images, per level of the grid.
    pub source_tile_sizes: Vec<Size>,
}

/// Builds a tile grid shared by all pyramids.
///
/// The first pyramid defines the grid. Every other pyramid must have the same origin, its resolutions scaled to
/// the finest level of the grid must match the grid resolutions within 2%, render tile sizes must match within 1%
/// and source tile sizes must match exactly. The grid extent is the intersection of all pyramid extents.
pub fn combine_pyramids(pyramids: &[ImagePyramid]) -> Result<CombinedPyramid, MeridianError> {
    let Some((first, rest)) = pyramids.split_first() else {
        return Err(mismatch("no image pyramids to combine".to_string()));
    };
    if first.levels.is_empty() {
        return Err(mismatch("source 0 has no levels".to_string()));
    }

    let mut extent = first.extent;
    let origin = first.origin;
    let resolutions: Vec<f64> = first.levels.iter().map(|l| l.resolution).collect();
    let render_tile_sizes: Vec<Size> = first
        .levels
        .iter()
        .map(PyramidLevel::render_tile_size)
        .collect();
    let source_tile_sizes: Vec<Size> = first.levels.iter().map(|l| l.tile_size).collect();

    let mut min_zoom = 0;
    let mut resolution_factors = vec![1.0];

    for (index, pyramid) in rest.iter().enumerate() {
        let index = index + 1;
        let (Some(source_last), Some(grid_last)) = (pyramid.levels.last(), resolutions.last())
        else {
            return Err(mismatch(format!("source {index} has no levels")));
        };

        extent = extent.intersection(&pyramid.extent).ok_or_else(|| {
            mismatch(format!("source {index} does not overlap the other sources"))
        })?;

        if pyramid.origin != origin {
            return Err(mismatch(format!(
                "origin mismatch for source {index}, got {:?} but expected {:?}",
                pyramid.origin, origin
            )));
        }

        if resolutions.len() > pyramid.levels.len() + min_zoom {
            min_zoom = resolutions.len() - pyramid.levels.len();
        }

        let factor = grid_last / source_last.resolution;
        let scaled: Vec<f64> = pyramid
            .levels
            .iter()
            .map(|l| l.resolution * factor)
            .collect();
        if !all_close(&resolutions[min_zoom..], &scaled, RESOLUTION_TOLERANCE) {
            return Err(mismatch(format!(
                "resolution mismatch for source {index}, got {scaled:?} but expected {resolutions:?}"
            )));
        }

        let render_sizes: Vec<Size> = pyramid
            .levels
            .iter()
            .map(PyramidLevel::render_tile_size)
            .collect();
        if !sizes_close(
            &render_tile_sizes[min_zoom..],
            &render_sizes,
            RENDER_TILE_SIZE_TOLERANCE,
        ) {
            return Err(mismatch(format!("tile size mismatch for source {index}")));
        }

        let tile_sizes: Vec<Size> = pyramid.levels.iter().map(|l| l.tile_size).collect();
        if !sizes_close(&source_tile_sizes[min_zoom..], &tile_sizes, 0.0) {
            return Err(mismatch(format!("tile size mismatch for source {index}")));
        }

        resolution_factors.push(factor);
    }

    let tile_grid = TileGrid::new(
        TileGridOptions::new(resolutions)
            .with_extent(extent)
            .with_min_zoom(min_zoom as u32)
            .with_origin(origin)
            .with_tile_sizes(render_tile_sizes),
    )?;

    Ok(CombinedPyramid {
        tile_grid,
        resolution_factors,
        source_tile_sizes,
    })
}

fn mismatch(message: String) -> MeridianError {
    error!("Cannot combine image pyramids: {message}");
    MeridianError::Configuration(message)
}

fn all_close(expected: &[f64], got: &[f64], tolerance: f64) -> bool {
    expected.len() == got.len()
        && expected
            .iter()
            .zip(got)
            .all(|(e, g)| (e - g).abs() <= tolerance * e.abs())
}

fn sizes_close(expected: &[Size], got: &[Size], tolerance: f64) -> bool {
    expected.len() == got.len()
        && expected
            .iter()
            .zip(got)
            .all(|(e, g)| e.approx_eq(g, tolerance))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    use super::*;

    fn pyramid(resolutions: &[f64]) -> ImagePyramid {
        ImagePyramid {
            extent: Rect::new(0.0, 0.0, 1024.0, 1024.0),
            origin: Point2::new(0.0, 1024.0),
            levels: resolutions
                .iter()
                .map(|r| PyramidLevel::new(*r, Size::square(256.0)))
                .collect(),
        }
    }

    #[test]
    fn single_pyramid() {
        let combined = combine_pyramids(&[pyramid(&[4.0, 2.0, 1.0])]).expect("valid pyramid");
        assert_eq!(combined.tile_grid.get_resolutions(), &[4.0, 2.0, 1.0]);
        assert_eq!(combined.resolution_factors, vec![1.0]);
        assert_eq!(combined.tile_grid.get_min_zoom(), 0);
    }

    #[test]
    fn resolution_mismatch_is_an_error() {
        let result = combine_pyramids(&[pyramid(&[4.0, 2.0, 1.0]), pyramid(&[4.2, 2.0, 1.0])]);
        assert_matches!(result, Err(MeridianError::Configuration(_)));
    }

    #[test]
    fn small_difference_is_accepted() {
        let combined =
            combine_pyramids(&[pyramid(&[4.0, 2.0, 1.0]), pyramid(&[4.04, 2.01, 1.0])])
                .expect("within tolerance");
        assert_eq!(combined.resolution_factors, vec![1.0, 1.0]);
    }

    #[test]
    fn fewer_levels_raise_min_zoom() {
        let combined = combine_pyramids(&[pyramid(&[4.0, 2.0, 1.0]), pyramid(&[4.0, 2.0])])
            .expect("scaled resolutions match");
        assert_eq!(combined.tile_grid.get_min_zoom(), 1);
        assert_abs_diff_eq!(combined.resolution_factors[1], 0.5);
    }

    #[test]
    fn origin_mismatch_is_an_error() {
        let mut other = pyramid(&[4.0, 2.0, 1.0]);
        other.origin = Point2::new(1.0, 1024.0);
        assert_matches!(
            combine_pyramids(&[pyramid(&[4.0, 2.0, 1.0]), other]),
            Err(MeridianError::Configuration(_))
        );
    }

    #[test]
    fn tile_size_mismatch_is_an_error() {
        let mut other = pyramid(&[4.0, 2.0, 1.0]);
        other.levels[0].tile_size = Size::square(512.0);
        assert_matches!(
            combine_pyramids(&[pyramid(&[4.0, 2.0, 1.0]), other]),
            Err(MeridianError::Configuration(_))
        );
    }

    #[test]
    fn extent_is_intersection() {
        let mut other = pyramid(&[4.0, 2.0, 1.0]);
        other.extent = Rect::new(512.0, 0.0, 2048.0, 1024.0);
        let combined =
            combine_pyramids(&[pyramid(&[4.0, 2.0, 1.0]), other]).expect("valid pyramids");
        assert_eq!(
            combined.tile_grid.get_extent(),
            Some(Rect::new(512.0, 0.0, 1024.0, 1024.0))
        );
    }

    #[test]
    fn render_tile_size_accounts_for_aspect_ratio() {
        let level = PyramidLevel::new(2.0, Size::square(256.0)).with_y_resolution(-1.0);
        assert_eq!(level.render_tile_size(), Size::new(256.0, 128.0));
    }
}
