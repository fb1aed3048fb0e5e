//! Layers combine a data source with the way its data is drawn.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::render::BuilderType;

pub mod vector_tile_layer;

pub use vector_tile_layer::{RenderOrder, RenderOrderId, VectorTileLayer, VectorTileLayerBuilder};

/// Unique identifier of a layer.
///
/// Render tiles keep everything built for a layer under its id, so several layers can share one source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u32);

impl LayerId {
    /// Returns a new id, never returned before.
    pub fn next_id() -> Self {
        static ID: AtomicU32 = AtomicU32::new(0);
        Self(ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// How the features of a vector tile layer are drawn.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Everything is drawn as vectors in every frame. Best quality and the slowest mode.
    Vector,
    /// Areas and lines are pre-rendered into tile images, points and labels are drawn as vectors.
    #[default]
    Hybrid,
    /// Everything except custom renderers is pre-rendered into tile images.
    Image,
}

impl RenderMode {
    /// Categories pre-rendered into tile images.
    pub fn image_replays(&self) -> &'static [BuilderType] {
        match self {
            RenderMode::Image => &[
                BuilderType::Polygon,
                BuilderType::Circle,
                BuilderType::LineString,
                BuilderType::Image,
                BuilderType::Text,
            ],
            RenderMode::Hybrid => &[BuilderType::Polygon, BuilderType::LineString],
            RenderMode::Vector => &[],
        }
    }

    /// Categories drawn as vectors in every frame.
    pub fn vector_replays(&self) -> &'static [BuilderType] {
        match self {
            RenderMode::Image => &[BuilderType::Default],
            RenderMode::Hybrid => &[BuilderType::Image, BuilderType::Text, BuilderType::Default],
            RenderMode::Vector => &BuilderType::ORDER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_ids_are_unique() {
        let first = LayerId::next_id();
        let second = LayerId::next_id();
        assert_ne!(first, second);
    }

    #[test]
    fn replays_do_not_overlap() {
        for mode in [RenderMode::Vector, RenderMode::Hybrid, RenderMode::Image] {
            for builder_type in mode.image_replays() {
                assert!(!mode.vector_replays().contains(builder_type));
            }
        }

        assert!(RenderMode::Vector.image_replays().is_empty());
        assert_eq!(RenderMode::Vector.vector_replays(), &BuilderType::ORDER);
    }
}
