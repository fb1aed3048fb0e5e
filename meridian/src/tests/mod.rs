use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use meridian_types::cartesian::Rect;
use meridian_types::{Contour, Polygon};

use crate::error::MeridianError;
use crate::feature::Feature;
use crate::messenger::Messenger;
use crate::projection::{Projection, Units};
use crate::source::{SourceTileLoader, VectorTileSource};
use crate::tile_grid::{create_xyz, TileCoord, TileGrid, XyzOptions};

/// Messenger counting redraw requests.
#[derive(Debug, Default)]
pub struct CountingMessenger {
    count: AtomicUsize,
}

impl CountingMessenger {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl Messenger for CountingMessenger {
    fn request_redraw(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Source tile loader backed by a closure.
pub struct FnTileLoader<F>(pub F);

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl<F> SourceTileLoader for FnTileLoader<F>
where
    F: Fn(TileCoord) -> Result<Vec<Feature>, MeridianError> + Send + Sync,
{
    async fn load(&self, tile_coord: TileCoord) -> Result<Vec<Feature>, MeridianError> {
        (self.0)(tile_coord)
    }
}

/// Shows library logs in the output of failing tests.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Yields to the runtime until the condition holds, giving spawned tasks the chance to finish.
pub async fn settle(condition: impl Fn() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
}

/// Loader of tiles without features.
pub fn empty_loader() -> Arc<dyn SourceTileLoader> {
    Arc::new(FnTileLoader(
        |_: TileCoord| -> Result<Vec<Feature>, MeridianError> { Ok(vec![]) },
    ))
}

pub fn empty_source() -> VectorTileSource {
    let grid = create_xyz(XyzOptions::default()).expect("valid grid");
    VectorTileSource::new(grid, empty_loader())
}

/// Square world of 1024 units with levels of resolution 4, 2 and 1.
pub fn test_grid() -> TileGrid {
    create_xyz(
        XyzOptions::default()
            .with_extent(Rect::new(0.0, 0.0, 1024.0, 1024.0))
            .with_max_zoom(2),
    )
    .expect("valid grid")
}

pub fn test_projection() -> Projection {
    Projection::new("TEST", Units::Pixels).with_extent(Rect::new(0.0, 0.0, 1024.0, 1024.0))
}

/// Polygon feature covering the extent.
pub fn square_feature(extent: Rect) -> Feature {
    Feature::new(Polygon::new(
        Contour::closed(extent.into_quadrangle().to_vec()),
        vec![],
    ))
}
