//! Vector tile sources: loading of source tiles and the cache of render tiles.
//!
//! The source has its own [`TileGrid`](crate::TileGrid) that describes the tiles the data comes in. For every
//! projection it also derives a render grid, continued to zoom level 42, in which the renderer addresses
//! [render tiles](VectorRenderTile). A render tile references all source tiles covering it.

mod render_tile;
mod source_tile;
mod vector_tile_source;

pub use render_tile::{BuilderPhase, BuilderState, TileImage, VectorRenderTile};
pub use source_tile::{SourceTile, SourceTileLoader};
pub use vector_tile_source::VectorTileSource;

/// Load state of source and render tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Loading was not started.
    Idle,
    /// Data is being loaded.
    Loading,
    /// All data is available.
    Loaded,
    /// Loading failed. The tile is never retried.
    Error,
    /// There is no data for the tile.
    Empty,
}

impl TileState {
    /// Returns true if the state will not change anymore.
    pub fn is_settled(&self) -> bool {
        matches!(self, TileState::Loaded | TileState::Error | TileState::Empty)
    }
}
