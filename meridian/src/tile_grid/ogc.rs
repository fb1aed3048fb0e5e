//! Reader of OGC two dimensional tile matrix sets (the JSON encoding used by OGC API - Tiles).

use meridian_types::cartesian::{Point2, Size};
use serde::{Deserialize, Serialize};

use super::{TileGrid, TileGridOptions};
use crate::error::MeridianError;

/// Axis names that denote the northing axis when listed first in `orderedAxes`.
const NORTHING_AXES: [&str; 5] = ["lat", "latitude", "y", "n", "northing"];

/// Corner of the tile matrix the tile indices count from.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CornerOfOrigin {
    /// Rows grow downwards.
    #[default]
    TopLeft,
    /// Rows grow upwards.
    BottomLeft,
}

/// One zoom level of a tile matrix set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrix {
    /// Identifier of the level.
    pub id: String,
    /// Size of a pixel in CRS units.
    pub cell_size: f64,
    /// Corner the indices count from.
    #[serde(default)]
    pub corner_of_origin: CornerOfOrigin,
    /// Position of the corner of origin, in the order of the CRS axes.
    pub point_of_origin: [f64; 2],
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Number of tile columns.
    pub matrix_width: i64,
    /// Number of tile rows.
    pub matrix_height: i64,
}

/// Tile matrix set definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrixSet {
    /// Identifier of the set.
    #[serde(default)]
    pub id: Option<String>,
    /// Axis names in the order the CRS defines them.
    #[serde(default)]
    pub ordered_axes: Vec<String>,
    /// Levels, from the least detailed to the most detailed.
    pub tile_matrices: Vec<TileMatrix>,
}

impl TileMatrixSet {
    /// Parses the JSON encoding of a tile matrix set.
    pub fn from_json(json: &str) -> Result<Self, MeridianError> {
        serde_json::from_str(json).map_err(|err| {
            MeridianError::Configuration(format!("invalid tile matrix set: {err}"))
        })
    }

    /// Returns true if the CRS lists the northing axis first.
    pub fn is_northing_first(&self) -> bool {
        self.ordered_axes
            .first()
            .is_some_and(|axis| NORTHING_AXES.contains(&axis.to_lowercase().as_str()))
    }

    /// Creates a tile grid with the origin, resolution, tile size and matrix size of every level.
    pub fn tile_grid(&self) -> Result<TileGrid, MeridianError> {
        let northing_first = self.is_northing_first();
        let levels = self.tile_matrices.len();

        let mut origins = Vec::with_capacity(levels);
        let mut resolutions = Vec::with_capacity(levels);
        let mut tile_sizes = Vec::with_capacity(levels);
        let mut sizes = Vec::with_capacity(levels);

        for matrix in &self.tile_matrices {
            let [first, second] = matrix.point_of_origin;
            origins.push(if northing_first {
                Point2::new(second, first)
            } else {
                Point2::new(first, second)
            });
            resolutions.push(matrix.cell_size);
            tile_sizes.push(Size::new(
                matrix.tile_width as f64,
                matrix.tile_height as f64,
            ));
            sizes.push(match matrix.corner_of_origin {
                CornerOfOrigin::TopLeft => [matrix.matrix_width, matrix.matrix_height],
                CornerOfOrigin::BottomLeft => [matrix.matrix_width, -matrix.matrix_height],
            });
        }

        TileGrid::new(
            TileGridOptions::new(resolutions)
                .with_origins(origins)
                .with_tile_sizes(tile_sizes)
                .with_sizes(sizes),
        )
    }
}
