use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;
use quick_cache::sync::Cache;

use super::{SourceTile, SourceTileLoader, TileState, VectorRenderTile};
use crate::async_runtime;
use crate::error::MeridianError;
use crate::feature::Feature;
use crate::messenger::Messenger;
use crate::projection::Projection;
use crate::tile_grid::{TileCoord, TileGrid, ZDirection, DEFAULT_MAX_ZOOM};

const DEFAULT_CACHE_SIZE: usize = 512;

type RenderTileKey = (String, TileCoord);

/// Source of vector tiles.
///
/// Loads [source tiles](SourceTile) of its own grid through the [`SourceTileLoader`] and hands out
/// [render tiles](VectorRenderTile) of the render grid of a projection. Both kinds of tiles are kept in bounded
/// caches. Evicted render tiles lose everything the renderers built for them.
pub struct VectorTileSource {
    tile_grid: TileGrid,
    loader: Arc<dyn SourceTileLoader>,
    source_tiles: Cache<TileCoord, Arc<RwLock<SourceTile>>>,
    render_tiles: Cache<RenderTileKey, Arc<RwLock<VectorRenderTile>>>,
    render_grids: RwLock<HashMap<String, Arc<TileGrid>>>,
    wrap_x: bool,
    z_direction: ZDirection,
    overlaps: bool,
    messenger: Option<Arc<dyn Messenger>>,
}

impl Debug for VectorTileSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorTileSource")
            .field("tile_grid", &self.tile_grid)
            .field("wrap_x", &self.wrap_x)
            .field("z_direction", &self.z_direction)
            .field("overlaps", &self.overlaps)
            .finish()
    }
}

impl VectorTileSource {
    /// Creates a new source with the given grid of source tiles.
    pub fn new(tile_grid: TileGrid, loader: Arc<dyn SourceTileLoader>) -> Self {
        Self {
            tile_grid,
            loader,
            source_tiles: Cache::new(DEFAULT_CACHE_SIZE),
            render_tiles: Cache::new(DEFAULT_CACHE_SIZE),
            render_grids: RwLock::new(HashMap::new()),
            wrap_x: true,
            z_direction: ZDirection::Nearest,
            overlaps: true,
            messenger: None,
        }
    }

    /// Sets whether tiles of neighbouring worlds show the data of the main world. Enabled by default.
    pub fn with_wrap_x(mut self, wrap_x: bool) -> Self {
        self.wrap_x = wrap_x;
        self
    }

    /// Sets how the source zoom level is chosen for a render resolution between two source levels.
    pub fn with_z_direction(mut self, z_direction: ZDirection) -> Self {
        self.z_direction = z_direction;
        self
    }

    /// Sets whether features of the source may overlap. If not, consecutive fills are batched.
    pub fn with_overlaps(mut self, overlaps: bool) -> Self {
        self.overlaps = overlaps;
        self
    }

    /// Sets the maximum number of source and render tiles kept in memory.
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.source_tiles = Cache::new(cache_size);
        self.render_tiles = Cache::new(cache_size);
        self
    }

    /// Sets the messenger notified when a source tile load settles.
    pub fn with_messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Grid of the source tiles.
    pub fn tile_grid(&self) -> &TileGrid {
        &self.tile_grid
    }

    /// Whether the data is repeated in the neighbouring worlds.
    pub fn wrap_x(&self) -> bool {
        self.wrap_x
    }

    /// How the source zoom level is chosen for a render resolution.
    pub fn z_direction(&self) -> ZDirection {
        self.z_direction
    }

    /// Whether features of the source may overlap.
    pub fn overlaps(&self) -> bool {
        self.overlaps
    }

    /// Grid of the render tiles for the projection.
    ///
    /// It has the levels of the source grid, continued by halving the resolution to zoom level 42.
    pub fn tile_grid_for_projection(
        &self,
        projection: &Projection,
    ) -> Result<Arc<TileGrid>, MeridianError> {
        if let Some(grid) = self.render_grids.read().get(projection.code()) {
            return Ok(grid.clone());
        }

        let grid = Arc::new(self.tile_grid.extended_to_zoom(DEFAULT_MAX_ZOOM)?);
        self.render_grids
            .write()
            .insert(projection.code().to_string(), grid.clone());
        Ok(grid)
    }

    /// Returns the render tile, creating it if it is not in the cache.
    ///
    /// Tiles outside of the source data get no wrapped coordinate and stay empty.
    pub fn get_tile(
        &self,
        tile_coord: TileCoord,
        projection: &Projection,
    ) -> Result<Arc<RwLock<VectorRenderTile>>, MeridianError> {
        let key = (projection.code().to_string(), tile_coord);
        if let Some(tile) = self.render_tiles.get(&key) {
            return Ok(tile);
        }

        let grid = self.tile_grid_for_projection(projection)?;
        let wrapped = self.wrapped_tile_coord(&grid, &tile_coord, projection)?;
        let tile = Arc::new(RwLock::new(VectorRenderTile::new(tile_coord, wrapped)));
        self.render_tiles.insert(key, tile.clone());

        Ok(tile)
    }

    /// Render tile from the cache, if it was created before and not evicted since.
    pub fn cached_tile(
        &self,
        tile_coord: TileCoord,
        projection: &Projection,
    ) -> Option<Arc<RwLock<VectorRenderTile>>> {
        self.render_tiles
            .get(&(projection.code().to_string(), tile_coord))
    }

    /// Requests the source tiles of the render tile. Does nothing if they were requested before.
    pub fn load_tile(
        &self,
        tile: &mut VectorRenderTile,
        projection: &Projection,
    ) -> Result<(), MeridianError> {
        if tile.source_tiles_requested() {
            return Ok(());
        }

        let grid = self.tile_grid_for_projection(projection)?;
        let source_tiles = self.get_source_tiles(&grid, tile)?;
        tile.set_source_tiles(source_tiles);
        Ok(())
    }

    /// Adds an already loaded source tile to the cache, replacing a cached one.
    pub fn insert_loaded_tile(&self, tile_coord: TileCoord, features: Vec<Feature>) {
        self.source_tiles.insert(
            tile_coord,
            Arc::new(RwLock::new(SourceTile::loaded(tile_coord, features))),
        );
    }

    fn wrapped_tile_coord(
        &self,
        grid: &TileGrid,
        tile_coord: &TileCoord,
        projection: &Projection,
    ) -> Result<Option<TileCoord>, MeridianError> {
        let wrapped = if self.wrap_x && projection.can_wrap_x() {
            grid.wrap_tile_coord_x(tile_coord, projection)?
        } else {
            *tile_coord
        };

        if !grid.tile_coord_within_grid(&wrapped) {
            return Ok(None);
        }

        if let Some(source_extent) = self.tile_grid.get_extent() {
            let resolution = grid.get_resolution(wrapped.z)?;
            let tile_extent = grid.get_tile_coord_extent(&wrapped)?.shrink(resolution);
            if !source_extent.intersects(&tile_extent) {
                return Ok(None);
            }
        }

        Ok(Some(wrapped))
    }

    fn get_source_tiles(
        &self,
        grid: &TileGrid,
        tile: &VectorRenderTile,
    ) -> Result<Vec<Arc<RwLock<SourceTile>>>, MeridianError> {
        let Some(wrapped) = tile.wrapped_tile_coord() else {
            return Ok(vec![]);
        };

        let resolution = grid.get_resolution(wrapped.z)?;
        let mut extent = grid.get_tile_coord_extent(&wrapped)?.shrink(resolution);
        if let Some(source_extent) = self.tile_grid.get_extent() {
            match extent.intersection(&source_extent) {
                Some(intersection) => extent = intersection,
                None => return Ok(vec![]),
            }
        }

        let source_z = self
            .tile_grid
            .get_z_for_resolution(resolution, self.z_direction);
        let source_tiles = self
            .tile_grid
            .tile_coords_for_extent(&extent, source_z)?
            .filter(|coord| self.tile_grid.tile_coord_within_grid(coord))
            .map(|coord| self.source_tile(coord))
            .collect();

        Ok(source_tiles)
    }

    fn source_tile(&self, tile_coord: TileCoord) -> Arc<RwLock<SourceTile>> {
        if let Some(tile) = self.source_tiles.get(&tile_coord) {
            return tile;
        }

        let tile = Arc::new(RwLock::new(SourceTile::new(tile_coord)));
        self.source_tiles.insert(tile_coord, tile.clone());
        self.load_source_tile(&tile);

        tile
    }

    fn load_source_tile(&self, tile: &Arc<RwLock<SourceTile>>) {
        let tile_coord = {
            let mut tile = tile.write();
            if tile.state() != TileState::Idle {
                return;
            }

            tile.set_loading();
            tile.tile_coord()
        };

        let loader = self.loader.clone();
        let messenger = self.messenger.clone();
        let tile = tile.clone();
        let spawned = async_runtime::spawn(async move {
            match loader.load(tile_coord).await {
                Ok(features) => {
                    log::debug!("Loaded source tile {tile_coord} with {} features", features.len());
                    tile.write().set_loaded(features);
                }
                Err(err) => {
                    log::warn!("Failed to load source tile {tile_coord}: {err}");
                    tile.write().set_error();
                }
            }

            if let Some(messenger) = messenger {
                messenger.request_redraw();
            }
        });

        if let Err(err) = spawned {
            log::warn!("Cannot start loading of source tile {tile_coord}: {err}");
        }
    }
}
