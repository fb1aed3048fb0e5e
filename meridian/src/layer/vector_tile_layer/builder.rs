use std::sync::Arc;

use super::{RenderOrder, VectorTileLayer, DEFAULT_RENDER_BUFFER};
use crate::layer::{LayerId, RenderMode};
use crate::messenger::Messenger;
use crate::source::VectorTileSource;
use crate::style::StyleFunction;

/// Constructor for a [`VectorTileLayer`].
///
/// ```
/// use std::sync::Arc;
/// use meridian::layer::{RenderMode, VectorTileLayerBuilder};
/// use meridian::source::VectorTileSource;
///
/// # fn create_source() -> VectorTileSource { unimplemented!() }
/// let source = Arc::new(create_source());
/// let layer = VectorTileLayerBuilder::new(source)
///     .with_render_mode(RenderMode::Vector)
///     .with_declutter(true)
///     .build();
/// ```
pub struct VectorTileLayerBuilder {
    source: Arc<VectorTileSource>,
    style: Option<StyleFunction>,
    render_mode: RenderMode,
    declutter: bool,
    render_buffer: f64,
    render_order: Option<RenderOrder>,
    opacity: f64,
    messenger: Option<Arc<dyn Messenger>>,
}

impl VectorTileLayerBuilder {
    /// Initializes a builder for a layer showing the given source.
    pub fn new(source: Arc<VectorTileSource>) -> Self {
        Self {
            source,
            style: None,
            render_mode: RenderMode::default(),
            declutter: false,
            render_buffer: DEFAULT_RENDER_BUFFER,
            render_order: None,
            opacity: 1.0,
            messenger: None,
        }
    }

    /// Sets the style function of the layer.
    pub fn with_style(mut self, style: StyleFunction) -> Self {
        self.style = Some(style);
        self
    }

    /// Sets the render mode.
    pub fn with_render_mode(mut self, render_mode: RenderMode) -> Self {
        self.render_mode = render_mode;
        self
    }

    /// Enables placement of labels and icons without overlaps.
    pub fn with_declutter(mut self, declutter: bool) -> Self {
        self.declutter = declutter;
        self
    }

    /// Sets the number of pixels around a render tile whose features are included into the tile.
    ///
    /// Must be large enough for the symbols of features outside the tile that reach into it.
    pub fn with_render_buffer(mut self, render_buffer: f64) -> Self {
        self.render_buffer = render_buffer;
        self
    }

    /// Sets the order features are drawn in.
    pub fn with_render_order(mut self, render_order: RenderOrder) -> Self {
        self.render_order = Some(render_order);
        self
    }

    /// Sets the opacity.
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Sets the messenger notified when icons used by the styles are loaded.
    pub fn with_messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Creates the layer.
    pub fn build(self) -> VectorTileLayer {
        VectorTileLayer {
            id: LayerId::next_id(),
            source: self.source,
            style: self.style,
            render_mode: self.render_mode,
            declutter: self.declutter,
            render_buffer: self.render_buffer,
            render_order: self.render_order,
            opacity: self.opacity,
            revision: 0,
            messenger: self.messenger,
        }
    }
}
