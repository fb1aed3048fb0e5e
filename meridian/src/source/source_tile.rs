use std::cmp::Ordering;
use std::sync::Arc;

use maybe_sync::{MaybeSend, MaybeSync};

use super::TileState;
use crate::error::MeridianError;
use crate::feature::Feature;
use crate::tile_grid::TileCoord;

/// Loads and decodes the features of one source tile.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait SourceTileLoader: MaybeSend + MaybeSync {
    /// Loads the features of the tile, in map coordinates.
    async fn load(&self, tile_coord: TileCoord) -> Result<Vec<Feature>, MeridianError>;
}

/// Tile of the source grid with its features.
#[derive(Debug)]
pub struct SourceTile {
    tile_coord: TileCoord,
    state: TileState,
    features: Vec<Arc<Feature>>,
}

impl SourceTile {
    /// Creates an idle tile.
    pub fn new(tile_coord: TileCoord) -> Self {
        Self {
            tile_coord,
            state: TileState::Idle,
            features: vec![],
        }
    }

    /// Creates a tile with already available features.
    pub fn loaded(tile_coord: TileCoord, features: Vec<Feature>) -> Self {
        let mut tile = Self::new(tile_coord);
        tile.set_loaded(features);
        tile
    }

    /// Coordinate of the tile in the source grid.
    pub fn tile_coord(&self) -> TileCoord {
        self.tile_coord
    }

    /// Load state.
    pub fn state(&self) -> TileState {
        self.state
    }

    /// Features of the tile. Empty unless the tile is loaded.
    pub fn features(&self) -> &[Arc<Feature>] {
        &self.features
    }

    /// Sorts the features with the comparator.
    pub fn sort_features(&mut self, compare: impl Fn(&Feature, &Feature) -> Ordering) {
        self.features.sort_by(|a, b| compare(a, b));
    }

    pub(crate) fn set_loading(&mut self) {
        self.state = TileState::Loading;
    }

    pub(crate) fn set_loaded(&mut self, features: Vec<Feature>) {
        self.features = features.into_iter().map(Arc::new).collect();
        self.state = TileState::Loaded;
    }

    pub(crate) fn set_error(&mut self) {
        self.features.clear();
        self.state = TileState::Error;
    }
}
