//! Meridian is the tile addressing and vector tile rendering core of an interactive map.
//!
//! The crate is organized around two tightly coupled parts:
//!
//! * [`TileGrid`] maps continuous map coordinates to a discrete, multi-resolution tile addressing scheme and back.
//!   It knows the resolution of every zoom level, the origin and the size of tiles at each level, and how to fold
//!   tiles of neighbouring worlds onto the canonical one.
//! * [`VectorTileLayerRenderer`](renderer::VectorTileLayerRenderer) uses the grid of a
//!   [`VectorTileSource`](source::VectorTileSource) to decide which render tiles are visible, builds per-tile
//!   [executor groups](render::ExecutorGroup) out of the source tile features, caches them between frames and
//!   composites tiles of different zoom levels onto a [`DrawingSurface`](render::DrawingSurface) with clipping.
//!   It also answers hit detection queries.
//!
//! # Frame loop
//!
//! Rendering is frame driven. The application creates a [`FrameState`] for every frame and calls
//!
//! 1. [`LayerRenderer::prepare_frame`](renderer::LayerRenderer::prepare_frame) to select and (re)build tiles,
//! 2. [`LayerRenderer::render_frame`](renderer::LayerRenderer::render_frame) to draw them,
//! 3. optionally [`VectorTileLayerRenderer::render_declutter`](renderer::VectorTileLayerRenderer::render_declutter)
//!    to place labels and icons of decluttered layers.
//!
//! Source tiles and style icons are loaded asynchronously. When a load settles, the [`Messenger`] given to the
//! source or layer is asked to redraw the map, and the next frame picks up the new data.

pub(crate) mod async_runtime;
mod color;
pub mod error;
pub mod feature;
mod frame;
pub mod layer;
mod messenger;
mod projection;
pub mod render;
pub mod renderer;
pub mod source;
pub mod style;
pub mod tile_grid;
mod view;

#[cfg(test)]
pub(crate) mod tests;

pub use color::Color;
pub use error::MeridianError;
pub use frame::{FrameState, ViewHints};
pub use messenger::{DummyMessenger, Messenger};
pub use projection::{wrap_coordinate_x, Projection, Units};
pub use tile_grid::{TileCoord, TileGrid, TileRange};
pub use view::MapView;

// Reexport meridian_types
pub use meridian_types;
