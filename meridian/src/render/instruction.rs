use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use meridian_types::Geom;

use crate::feature::Feature;
use crate::style::{CircleStyle, CustomRenderer, Fill, IconStyle, Stroke, TextStyle};

/// Category of drawing instructions.
///
/// Within one z index, categories are drawn in the order of [`BuilderType::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuilderType {
    /// Polygon fills and outlines.
    Polygon,
    /// Circle geometries.
    Circle,
    /// Lines.
    LineString,
    /// Point symbols.
    Image,
    /// Labels.
    Text,
    /// Custom renderers.
    Default,
}

impl BuilderType {
    /// Drawing order of the categories.
    pub const ORDER: [BuilderType; 6] = [
        BuilderType::Polygon,
        BuilderType::Circle,
        BuilderType::LineString,
        BuilderType::Image,
        BuilderType::Text,
        BuilderType::Default,
    ];

    /// Returns true if instructions of this category take part in decluttering.
    pub fn is_declutterable(&self) -> bool {
        matches!(self, BuilderType::Image | BuilderType::Text)
    }
}

/// What an instruction draws.
#[derive(Clone)]
pub enum InstructionKind {
    /// Polygon or circle area.
    Area {
        /// Fill.
        fill: Option<Fill>,
        /// Outline.
        stroke: Option<Stroke>,
    },
    /// Line.
    Line(Stroke),
    /// Circle symbol at every point of the geometry.
    CircleSymbol(CircleStyle),
    /// Icon at every point of the geometry.
    Icon(IconStyle),
    /// Label at the anchor point of the geometry.
    Text(TextStyle),
    /// Custom drawing code.
    Custom(CustomRenderer),
}

impl Debug for InstructionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InstructionKind::Area { fill, stroke } => f
                .debug_struct("Area")
                .field("fill", fill)
                .field("stroke", stroke)
                .finish(),
            InstructionKind::Line(stroke) => f.debug_tuple("Line").field(stroke).finish(),
            InstructionKind::CircleSymbol(circle) => {
                f.debug_tuple("CircleSymbol").field(circle).finish()
            }
            InstructionKind::Icon(icon) => f.debug_tuple("Icon").field(icon).finish(),
            InstructionKind::Text(text) => f.debug_tuple("Text").field(text).finish(),
            InstructionKind::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Recorded drawing of one feature with one symbol, in map coordinates.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// The drawn feature.
    pub feature: Arc<Feature>,
    /// Simplified geometry to draw.
    pub geometry: Geom,
    /// What to draw.
    pub kind: InstructionKind,
}
