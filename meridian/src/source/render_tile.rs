use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{SourceTile, TileState};
use crate::layer::{LayerId, RenderOrderId};
use crate::render::{DrawingSurface, ExecutorGroup, Transform};
use crate::tile_grid::TileCoord;

/// What the renderer has built into a tile for one layer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BuilderState {
    /// A style resource used while building was not loaded yet.
    pub dirty: bool,
    /// Layer revision the executor groups were built for.
    pub rendered_revision: Option<u64>,
    /// Resolution the executor groups were built at.
    pub rendered_resolution: Option<f64>,
    /// Render order the features were sorted with.
    pub rendered_render_order: Option<RenderOrderId>,
    /// Layer revision the tile image was rendered for.
    pub rendered_tile_revision: Option<u64>,
    /// Resolution the tile image was rendered for.
    pub rendered_tile_resolution: Option<f64>,
}

/// Build phase of a tile for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderPhase {
    /// Nothing was built yet.
    Unbuilt,
    /// Executor groups are up to date.
    Built,
    /// Executor groups must be rebuilt.
    Stale,
}

impl BuilderState {
    /// Phase of the executor groups relative to the current layer parameters.
    pub fn phase(
        &self,
        revision: u64,
        resolution: f64,
        render_order: Option<RenderOrderId>,
    ) -> BuilderPhase {
        if self.rendered_revision.is_none() {
            return BuilderPhase::Unbuilt;
        }

        if self.dirty
            || self.rendered_revision != Some(revision)
            || self.rendered_resolution != Some(resolution)
            || self.rendered_render_order != render_order
        {
            BuilderPhase::Stale
        } else {
            BuilderPhase::Built
        }
    }
}

/// Pre-rendered raster of the tile.
pub struct TileImage {
    /// Surface the tile was rendered into.
    pub surface: Box<dyn DrawingSurface>,
    /// Transform from map coordinates of the wrapped tile to the pixels of the surface.
    pub transform: Transform,
}

impl Debug for TileImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileImage")
            .field("size", &self.surface.size())
            .field("transform", &self.transform)
            .finish()
    }
}

/// Tile of the render grid.
///
/// Owns the executor groups and tile images built for it by layer renderers, keyed by the layer id.
#[derive(Debug)]
pub struct VectorRenderTile {
    tile_coord: TileCoord,
    wrapped_tile_coord: Option<TileCoord>,
    source_tiles: Vec<Arc<RwLock<SourceTile>>>,
    source_tiles_requested: bool,
    wanted_resolution: Option<f64>,
    builder_states: HashMap<LayerId, BuilderState>,
    executor_groups: HashMap<LayerId, Vec<ExecutorGroup>>,
    declutter_executor_groups: HashMap<LayerId, Vec<ExecutorGroup>>,
    images: HashMap<LayerId, TileImage>,
}

impl VectorRenderTile {
    /// Creates a tile. A tile without a wrapped coordinate has no data.
    pub fn new(tile_coord: TileCoord, wrapped_tile_coord: Option<TileCoord>) -> Self {
        Self {
            tile_coord,
            wrapped_tile_coord,
            source_tiles: vec![],
            source_tiles_requested: false,
            wanted_resolution: None,
            builder_states: HashMap::new(),
            executor_groups: HashMap::new(),
            declutter_executor_groups: HashMap::new(),
            images: HashMap::new(),
        }
    }

    /// Coordinate the tile is displayed at.
    pub fn tile_coord(&self) -> TileCoord {
        self.tile_coord
    }

    /// Coordinate of the tile folded onto the main world. Data is loaded for this coordinate.
    pub fn wrapped_tile_coord(&self) -> Option<TileCoord> {
        self.wrapped_tile_coord
    }

    /// Load state, derived from the states of the source tiles.
    ///
    /// A tile is loaded when all its source tiles are, and is in error state if any of them failed.
    pub fn state(&self) -> TileState {
        if self.wrapped_tile_coord.is_none() {
            return TileState::Empty;
        }
        if !self.source_tiles_requested {
            return TileState::Idle;
        }
        if self.source_tiles.is_empty() {
            return TileState::Empty;
        }
        if self.loading_source_tiles() > 0 {
            return TileState::Loading;
        }

        let failed = self
            .source_tiles
            .iter()
            .any(|tile| tile.read().state() == TileState::Error);
        if failed {
            TileState::Error
        } else {
            TileState::Loaded
        }
    }

    /// Number of source tiles that are not settled yet.
    pub fn loading_source_tiles(&self) -> usize {
        self.source_tiles
            .iter()
            .filter(|tile| matches!(tile.read().state(), TileState::Idle | TileState::Loading))
            .count()
    }

    /// Source tiles covering the tile.
    pub fn source_tiles(&self) -> &[Arc<RwLock<SourceTile>>] {
        &self.source_tiles
    }

    pub(crate) fn source_tiles_requested(&self) -> bool {
        self.source_tiles_requested
    }

    pub(crate) fn set_source_tiles(&mut self, source_tiles: Vec<Arc<RwLock<SourceTile>>>) {
        self.source_tiles = source_tiles;
        self.source_tiles_requested = true;
    }

    /// Resolution the tile image should be rendered for.
    pub fn wanted_resolution(&self) -> Option<f64> {
        self.wanted_resolution
    }

    /// Sets the resolution the tile image should be rendered for.
    pub fn set_wanted_resolution(&mut self, resolution: f64) {
        self.wanted_resolution = Some(resolution);
    }

    /// Builder state of the layer.
    pub fn builder_state(&self, layer_id: LayerId) -> BuilderState {
        self.builder_states
            .get(&layer_id)
            .copied()
            .unwrap_or_default()
    }

    /// Mutable builder state of the layer.
    pub fn builder_state_mut(&mut self, layer_id: LayerId) -> &mut BuilderState {
        self.builder_states.entry(layer_id).or_default()
    }

    /// Executor groups of the layer, one per source tile.
    pub fn executor_groups(&self, layer_id: LayerId) -> &[ExecutorGroup] {
        self.executor_groups
            .get(&layer_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Executor groups with the decluttered symbols of the layer.
    pub fn declutter_executor_groups(&self, layer_id: LayerId) -> &[ExecutorGroup] {
        self.declutter_executor_groups
            .get(&layer_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Returns true if executor groups were built for the layer.
    pub fn has_executor_groups(&self, layer_id: LayerId) -> bool {
        self.executor_groups.contains_key(&layer_id)
    }

    /// Replaces the executor groups of the layer.
    pub fn set_executor_groups(
        &mut self,
        layer_id: LayerId,
        executor_groups: Vec<ExecutorGroup>,
        declutter_executor_groups: Vec<ExecutorGroup>,
    ) {
        self.executor_groups.insert(layer_id, executor_groups);
        self.declutter_executor_groups
            .insert(layer_id, declutter_executor_groups);
    }

    /// Tile image of the layer.
    pub fn image(&self, layer_id: LayerId) -> Option<&TileImage> {
        self.images.get(&layer_id)
    }

    /// Sets the tile image of the layer.
    pub fn set_image(&mut self, layer_id: LayerId, image: TileImage) {
        self.images.insert(layer_id, image);
    }

    /// Removes the tile image of the layer.
    pub fn remove_image(&mut self, layer_id: LayerId) -> Option<TileImage> {
        self.images.remove(&layer_id)
    }

    /// Drops everything built for the layer.
    pub fn release(&mut self, layer_id: LayerId) {
        self.builder_states.remove(&layer_id);
        self.executor_groups.remove(&layer_id);
        self.declutter_executor_groups.remove(&layer_id);
        self.images.remove(&layer_id);
    }
}
