//! Styles describe how features are drawn.
//!
//! A [`StyleFunction`] turns a feature and the current resolution into a list of [`Style`]s. Every style can draw
//! an area fill, an outline, a point symbol and a label. Point symbols are either vector circles or
//! [icons](IconImage) that are loaded asynchronously.

mod icon;

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use meridian_types::cartesian::{Size, Vector2};
use meridian_types::Geom;
use serde::{Deserialize, Serialize};

pub use icon::{DecodedIcon, IconImage, IconLoader, IconState};

use crate::feature::Feature;
use crate::render::DrawingSurface;
use crate::Color;

/// Width of one character relative to the font size, used to estimate the size of labels.
const CHAR_WIDTH_FACTOR: f64 = 0.6;

/// Returns styles for the feature at the given resolution.
pub type StyleFunction = Arc<dyn Fn(&Feature, f64) -> Vec<Style> + Send + Sync>;

/// Draws a feature with custom code instead of the built-in symbols.
///
/// The geometry is given in the pixel coordinates of the surface.
pub type CustomRenderer = Arc<dyn Fn(&mut dyn DrawingSurface, &Geom, &Feature) + Send + Sync>;

/// Area fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Fill color.
    pub color: Color,
}

impl Fill {
    /// Creates a new fill.
    pub fn new(color: Color) -> Self {
        Self { color }
    }
}

/// Line style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Line color.
    pub color: Color,
    /// Line width in logical pixels.
    pub width: f64,
}

impl Stroke {
    /// Creates a new stroke.
    pub fn new(color: Color, width: f64) -> Self {
        Self { color, width }
    }
}

/// Circle drawn at point geometries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleStyle {
    /// Radius in logical pixels.
    pub radius: f64,
    /// Fill of the circle.
    pub fill: Option<Fill>,
    /// Outline of the circle.
    pub stroke: Option<Stroke>,
}

/// Image drawn at point geometries.
#[derive(Clone)]
pub struct IconStyle {
    /// The image.
    pub image: Arc<IconImage>,
    /// Scale applied to the image size.
    pub scale: f64,
    /// Rotation in radians, clockwise.
    pub rotation: f64,
    /// Rotate the icon together with the map.
    pub rotate_with_view: bool,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Position of the anchor point inside the image as a fraction of the image size, from the top-left corner.
    pub anchor: [f64; 2],
}

impl Debug for IconStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconStyle")
            .field("src", &self.image.src())
            .field("scale", &self.scale)
            .field("rotation", &self.rotation)
            .field("rotate_with_view", &self.rotate_with_view)
            .field("opacity", &self.opacity)
            .field("anchor", &self.anchor)
            .finish()
    }
}

impl IconStyle {
    /// Icon with the anchor in the middle of the image.
    pub fn new(image: Arc<IconImage>) -> Self {
        Self {
            image,
            scale: 1.0,
            rotation: 0.0,
            rotate_with_view: false,
            opacity: 1.0,
            anchor: [0.5, 0.5],
        }
    }

    /// Sets the scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the anchor.
    pub fn with_anchor(mut self, anchor: [f64; 2]) -> Self {
        self.anchor = anchor;
        self
    }

    /// Sets the rotation.
    pub fn with_rotation(mut self, rotation: f64, rotate_with_view: bool) -> Self {
        self.rotation = rotation;
        self.rotate_with_view = rotate_with_view;
        self
    }

    /// Sets the opacity.
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    /// Size of the drawn icon in logical pixels. `None` until the image is loaded.
    pub fn size(&self) -> Option<Size> {
        self.image.size().map(|size| size.scale(self.scale))
    }
}

/// Point symbol.
#[derive(Debug, Clone)]
pub enum ImageStyle {
    /// Raster icon.
    Icon(IconStyle),
    /// Vector circle.
    Circle(CircleStyle),
}

impl ImageStyle {
    /// Load state of the symbol. Circles are always loaded.
    pub fn state(&self) -> IconState {
        match self {
            ImageStyle::Icon(icon) => icon.image.state(),
            ImageStyle::Circle(_) => IconState::Loaded,
        }
    }
}

/// Label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Text of the label.
    pub text: String,
    /// Font size in logical pixels.
    pub font_size: f64,
    /// Text color.
    pub color: Color,
    /// Offset of the label from the anchor point in logical pixels.
    pub offset: [f64; 2],
}

impl TextStyle {
    /// Creates a label with default color and no offset.
    pub fn new(text: impl Into<String>, font_size: f64) -> Self {
        Self {
            text: text.into(),
            font_size,
            color: Color::BLACK,
            offset: [0.0, 0.0],
        }
    }

    /// Sets the color.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Sets the offset.
    pub fn with_offset(mut self, offset: [f64; 2]) -> Self {
        self.offset = offset;
        self
    }

    /// Estimated size of the label in logical pixels.
    pub fn approximate_size(&self) -> Size {
        let chars = self.text.chars().count() as f64;
        Size::new(chars * self.font_size * CHAR_WIDTH_FACTOR, self.font_size)
    }

    pub(crate) fn offset_vector(&self) -> Vector2 {
        Vector2::new(self.offset[0], self.offset[1])
    }
}

/// Set of symbols to draw one feature with.
#[derive(Clone, Default)]
pub struct Style {
    /// Fill of areas and circles.
    pub fill: Option<Fill>,
    /// Outline of areas and circles, or line style.
    pub stroke: Option<Stroke>,
    /// Point symbol.
    pub image: Option<ImageStyle>,
    /// Label.
    pub text: Option<TextStyle>,
    /// Styles with larger z index are drawn above the ones with smaller.
    pub z_index: i32,
    /// Custom drawing code. If set, the other symbols are ignored.
    pub renderer: Option<CustomRenderer>,
}

impl Debug for Style {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Style")
            .field("fill", &self.fill)
            .field("stroke", &self.stroke)
            .field("image", &self.image)
            .field("text", &self.text)
            .field("z_index", &self.z_index)
            .field("has_renderer", &self.renderer.is_some())
            .finish()
    }
}

impl Style {
    /// Style that draws nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fill.
    pub fn with_fill(mut self, fill: Fill) -> Self {
        self.fill = Some(fill);
        self
    }

    /// Sets the stroke.
    pub fn with_stroke(mut self, stroke: Stroke) -> Self {
        self.stroke = Some(stroke);
        self
    }

    /// Sets the point symbol.
    pub fn with_image(mut self, image: ImageStyle) -> Self {
        self.image = Some(image);
        self
    }

    /// Sets the label.
    pub fn with_text(mut self, text: TextStyle) -> Self {
        self.text = Some(text);
        self
    }

    /// Sets the z index.
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Sets a custom renderer.
    pub fn with_renderer(mut self, renderer: CustomRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }
}

/// Style function returning the same styles for every feature.
pub fn static_style(styles: Vec<Style>) -> StyleFunction {
    Arc::new(move |_, _| styles.clone())
}

/// Style used for layers without a style function: translucent white areas with blue outlines and blue circles
/// at points.
pub fn default_style() -> StyleFunction {
    let fill = Fill::new(Color::rgba(255, 255, 255, 102));
    let stroke = Stroke::new(Color::rgba(51, 153, 204, 255), 1.25);
    static_style(vec![Style::new()
        .with_fill(fill)
        .with_stroke(stroke)
        .with_image(ImageStyle::Circle(CircleStyle {
            radius: 5.0,
            fill: Some(fill),
            stroke: Some(stroke),
        }))])
}
