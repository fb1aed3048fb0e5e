//! Layer renderers turn the data of a layer into drawing operations for a frame.

use std::sync::Arc;

use meridian_types::cartesian::Point2;
use meridian_types::Geom;

use crate::feature::Feature;
use crate::frame::FrameState;
use crate::layer::LayerId;
use crate::render::DrawingSurface;

mod vector_tile;

pub use vector_tile::VectorTileLayerRenderer;

/// Feature found by hit detection.
#[derive(Debug, Clone)]
pub struct HitMatch {
    /// The feature.
    pub feature: Arc<Feature>,
    /// Layer the feature was found in.
    pub layer: LayerId,
    /// Geometry that was hit, as it was built for rendering.
    pub geometry: Geom,
    /// Squared distance from the query point in pixels.
    pub distance_sq: f64,
}

/// Frame driven renderer of one layer.
pub trait LayerRenderer {
    /// Selects the tiles or data to draw and prepares them. Returns `true` if everything needed for the frame
    /// is available and built.
    fn prepare_frame(&mut self, frame_state: &FrameState) -> bool;

    /// Draws the data selected by the last [`LayerRenderer::prepare_frame`] call onto the surface.
    fn render_frame(&mut self, frame_state: &FrameState, surface: &mut dyn DrawingSurface);

    /// Looks for features drawn within `hit_tolerance` pixels from the coordinate.
    ///
    /// Features hit exactly are passed to `callback` right away, and the search stops if it returns `true`. Other
    /// hits are added to `matches`, one per feature with the smallest distance, to be reported by the caller
    /// after all layers are searched.
    fn for_each_feature_at_coordinate(
        &self,
        coordinate: &Point2,
        frame_state: &FrameState,
        hit_tolerance: f64,
        callback: &mut dyn FnMut(&HitMatch) -> bool,
        matches: &mut Vec<HitMatch>,
    ) -> bool;
}

/// Runs hit detection over the layers, topmost layer last in `renderers`.
///
/// Exact hits are reported first, in the order they are found. Then the remaining matches are reported from the
/// closest to the farthest. Stops and returns `true` as soon as `callback` returns `true`.
pub fn for_each_feature_at_coordinate(
    renderers: &[&dyn LayerRenderer],
    coordinate: &Point2,
    frame_state: &FrameState,
    hit_tolerance: f64,
    callback: &mut dyn FnMut(&HitMatch) -> bool,
) -> bool {
    let mut matches = vec![];
    for renderer in renderers.iter().rev() {
        if renderer.for_each_feature_at_coordinate(
            coordinate,
            frame_state,
            hit_tolerance,
            callback,
            &mut matches,
        ) {
            return true;
        }
    }

    matches.sort_by(|a, b| a.distance_sq.total_cmp(&b.distance_sq));
    matches.iter().any(|hit| callback(hit))
}
