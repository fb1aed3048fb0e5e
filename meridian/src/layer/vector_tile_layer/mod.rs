//! [`VectorTileLayer`] draws the features of a [`VectorTileSource`] with a style function.

use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;

use super::{LayerId, RenderMode};
use crate::feature::Feature;
use crate::messenger::Messenger;
use crate::source::VectorTileSource;
use crate::style::StyleFunction;

mod builder;

pub use builder::VectorTileLayerBuilder;

/// Default number of pixels around a render tile whose features are included into the tile.
pub const DEFAULT_RENDER_BUFFER: f64 = 100.0;

/// Identifier of a [`RenderOrder`]. Tiles are re-sorted when the id changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RenderOrderId(u32);

impl RenderOrderId {
    fn next_id() -> Self {
        static ID: AtomicU32 = AtomicU32::new(0);
        Self(ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Order in which the features of a tile are drawn.
#[derive(Clone)]
pub struct RenderOrder {
    id: RenderOrderId,
    compare: Arc<dyn Fn(&Feature, &Feature) -> Ordering + Send + Sync>,
}

impl Debug for RenderOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RenderOrder").field(&self.id).finish()
    }
}

impl RenderOrder {
    /// Creates a render order from a comparator. Features that compare as less are drawn first.
    pub fn new(compare: impl Fn(&Feature, &Feature) -> Ordering + Send + Sync + 'static) -> Self {
        Self {
            id: RenderOrderId::next_id(),
            compare: Arc::new(compare),
        }
    }

    /// Id of the order.
    pub fn id(&self) -> RenderOrderId {
        self.id
    }

    /// Compares two features.
    pub fn compare(&self, a: &Feature, b: &Feature) -> Ordering {
        (self.compare)(a, b)
    }
}

/// Layer of vector tiles.
///
/// The layer holds the drawing parameters only. Everything built from them is stored in the render tiles of the
/// source under the id of the layer. Changing a parameter that affects the built data increments the revision of
/// the layer, so that the tiles are rebuilt in the next frame.
pub struct VectorTileLayer {
    id: LayerId,
    source: Arc<VectorTileSource>,
    style: Option<StyleFunction>,
    render_mode: RenderMode,
    declutter: bool,
    render_buffer: f64,
    render_order: Option<RenderOrder>,
    opacity: f64,
    revision: u64,
    messenger: Option<Arc<dyn Messenger>>,
}

impl Debug for VectorTileLayer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorTileLayer")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("render_mode", &self.render_mode)
            .field("declutter", &self.declutter)
            .field("render_buffer", &self.render_buffer)
            .field("render_order", &self.render_order)
            .field("opacity", &self.opacity)
            .field("revision", &self.revision)
            .finish()
    }
}

impl VectorTileLayer {
    /// Creates a layer with default parameters. Use [`VectorTileLayerBuilder`] to configure it.
    pub fn new(source: Arc<VectorTileSource>) -> Self {
        VectorTileLayerBuilder::new(source).build()
    }

    /// Id of the layer.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Source of the tiles.
    pub fn source(&self) -> &Arc<VectorTileSource> {
        &self.source
    }

    /// Style function of the layer. Features with their own style function ignore it.
    pub fn style(&self) -> Option<&StyleFunction> {
        self.style.as_ref()
    }

    /// Replaces the style function.
    pub fn set_style(&mut self, style: Option<StyleFunction>) {
        self.style = style;
        self.changed();
    }

    /// Render mode.
    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    /// Whether labels and icons are decluttered.
    pub fn declutter(&self) -> bool {
        self.declutter
    }

    /// Number of pixels around a render tile whose features are included into the tile.
    pub fn render_buffer(&self) -> f64 {
        self.render_buffer
    }

    /// Order in which features are drawn.
    pub fn render_order(&self) -> Option<&RenderOrder> {
        self.render_order.as_ref()
    }

    /// Replaces the render order.
    pub fn set_render_order(&mut self, render_order: Option<RenderOrder>) {
        self.render_order = render_order;
        self.changed();
    }

    /// Opacity of the layer.
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Sets the opacity of the layer, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Revision of the layer parameters.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Marks everything built for the layer as outdated.
    pub fn changed(&mut self) {
        self.revision += 1;
    }

    /// Messenger notified when resources used by the layer styles are loaded.
    pub fn messenger(&self) -> Option<&Arc<dyn Messenger>> {
        self.messenger.as_ref()
    }

    /// Sets the messenger.
    pub fn set_messenger(&mut self, messenger: Arc<dyn Messenger>) {
        self.messenger = Some(messenger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{static_style, Style};
    use crate::tests::empty_source;

    #[test]
    fn builder_defaults() {
        let layer = VectorTileLayer::new(Arc::new(empty_source()));
        assert_eq!(layer.render_mode(), RenderMode::Hybrid);
        assert!(!layer.declutter());
        assert_eq!(layer.render_buffer(), DEFAULT_RENDER_BUFFER);
        assert_eq!(layer.opacity(), 1.0);
        assert!(layer.style().is_none());
        assert!(layer.render_order().is_none());
    }

    #[test]
    fn changing_parameters_bumps_revision() {
        let mut layer = VectorTileLayer::new(Arc::new(empty_source()));
        let revision = layer.revision();

        layer.set_style(Some(static_style(vec![Style::new()])));
        assert_eq!(layer.revision(), revision + 1);

        layer.set_render_order(Some(RenderOrder::new(|a, b| a.uid().cmp(&b.uid()))));
        assert_eq!(layer.revision(), revision + 2);

        layer.set_opacity(2.0);
        assert_eq!(layer.opacity(), 1.0);
        assert_eq!(layer.revision(), revision + 2);
    }

    #[test]
    fn render_orders_have_distinct_ids() {
        let first = RenderOrder::new(|a, b| a.uid().cmp(&b.uid()));
        let second = first.clone();
        let third = RenderOrder::new(|a, b| b.uid().cmp(&a.uid()));

        assert_eq!(first.id(), second.id());
        assert_ne!(first.id(), third.id());
    }
}
