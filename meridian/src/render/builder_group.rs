use std::collections::BTreeMap;
use std::sync::Arc;

use meridian_types::cartesian::{Point2, Rect};
use meridian_types::{Contour, Geom, GeometryType};

use super::instruction::{BuilderType, Instruction, InstructionKind};
use crate::error::MeridianError;
use crate::feature::Feature;
use crate::style::{IconState, ImageStyle, Style};

/// Instructions of a finished builder group, by z index and category.
pub type BuilderInstructions = BTreeMap<i32, BTreeMap<BuilderType, Vec<Instruction>>>;

/// Collects drawing instructions for the features of one tile.
///
/// Once [finished](BuilderGroup::finish), the group is frozen: adding features fails, and repeated `finish` calls
/// return the same instructions.
#[derive(Debug)]
pub struct BuilderGroup {
    max_extent: Option<Rect>,
    resolution: f64,
    pixel_ratio: f64,
    instructions: BuilderInstructions,
    finished: Option<Arc<BuilderInstructions>>,
}

impl BuilderGroup {
    /// Creates an empty group for features built at `resolution`.
    pub fn new(max_extent: Option<Rect>, resolution: f64, pixel_ratio: f64) -> Self {
        Self {
            max_extent,
            resolution,
            pixel_ratio,
            instructions: BTreeMap::new(),
            finished: None,
        }
    }

    /// Area the instructions are built for.
    pub fn max_extent(&self) -> Option<Rect> {
        self.max_extent
    }

    /// Resolution the features are built at.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Pixel ratio the features are built for.
    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Returns true if `finish` was called.
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Returns true if no instruction was recorded.
    pub fn is_empty(&self) -> bool {
        self.instruction_count() == 0
    }

    /// Number of recorded instructions.
    pub fn instruction_count(&self) -> usize {
        let count = |instructions: &BuilderInstructions| {
            instructions
                .values()
                .flat_map(|by_type| by_type.values())
                .map(Vec::len)
                .sum()
        };

        match &self.finished {
            Some(finished) => count(finished),
            None => count(&self.instructions),
        }
    }

    /// Records the feature drawn with the style.
    ///
    /// Point symbols and labels go to the `declutter` group if one is given. Returns `true` if the style uses an
    /// icon that is not loaded yet: the icon is skipped, and the feature must be built again once it loads.
    pub fn add_feature(
        &mut self,
        feature: &Arc<Feature>,
        squared_tolerance: f64,
        style: &Style,
        mut declutter: Option<&mut BuilderGroup>,
    ) -> Result<bool, MeridianError> {
        if self.is_finished() || declutter.as_ref().is_some_and(|group| group.is_finished()) {
            return Err(MeridianError::BuilderFinished);
        }

        let image_state = style.image.as_ref().map(ImageStyle::state);
        let needs_async = matches!(image_state, Some(IconState::Idle | IconState::Loading));

        let geometry = feature.geometry().simplify(squared_tolerance);
        let z = style.z_index;

        if let Some(renderer) = &style.renderer {
            self.push(
                z,
                BuilderType::Default,
                feature,
                geometry,
                InstructionKind::Custom(renderer.clone()),
            );
            return Ok(needs_async);
        }

        match geometry.geometry_type() {
            GeometryType::Polygon | GeometryType::MultiPolygon | GeometryType::Circle => {
                if style.fill.is_some() || style.stroke.is_some() {
                    let builder_type = match geometry.geometry_type() {
                        GeometryType::Circle => BuilderType::Circle,
                        _ => BuilderType::Polygon,
                    };
                    self.push(
                        z,
                        builder_type,
                        feature,
                        geometry.clone(),
                        InstructionKind::Area {
                            fill: style.fill,
                            stroke: style.stroke,
                        },
                    );
                }
            }
            GeometryType::LineString | GeometryType::MultiLineString => {
                if let Some(stroke) = style.stroke {
                    self.push(
                        z,
                        BuilderType::LineString,
                        feature,
                        geometry.clone(),
                        InstructionKind::Line(stroke),
                    );
                }
            }
            GeometryType::Point | GeometryType::MultiPoint => {
                if let (Some(image), Some(IconState::Loaded)) = (&style.image, image_state) {
                    let kind = match image {
                        ImageStyle::Icon(icon) => InstructionKind::Icon(icon.clone()),
                        ImageStyle::Circle(circle) => InstructionKind::CircleSymbol(*circle),
                    };
                    let target = match declutter.as_deref_mut() {
                        Some(group) => group,
                        None => &mut *self,
                    };
                    target.push(z, BuilderType::Image, feature, geometry.clone(), kind);
                }
            }
        }

        if let Some(text) = style.text.as_ref().filter(|text| !text.text.is_empty()) {
            let anchors = label_anchors(&geometry);
            if !anchors.is_empty() {
                let target = match declutter {
                    Some(group) => group,
                    None => self,
                };
                target.push(
                    z,
                    BuilderType::Text,
                    feature,
                    Geom::MultiPoint(anchors),
                    InstructionKind::Text(text.clone()),
                );
            }
        }

        Ok(needs_async)
    }

    /// Freezes the group and returns its instructions.
    pub fn finish(&mut self) -> Arc<BuilderInstructions> {
        if let Some(finished) = &self.finished {
            return finished.clone();
        }

        let finished = Arc::new(std::mem::take(&mut self.instructions));
        self.finished = Some(finished.clone());
        finished
    }

    fn push(
        &mut self,
        z: i32,
        builder_type: BuilderType,
        feature: &Arc<Feature>,
        geometry: Geom,
        kind: InstructionKind,
    ) {
        self.instructions
            .entry(z)
            .or_default()
            .entry(builder_type)
            .or_default()
            .push(Instruction {
                feature: feature.clone(),
                geometry,
                kind,
            });
    }
}

/// Points labels of the geometry are placed at.
fn label_anchors(geometry: &Geom) -> Vec<Point2> {
    match geometry {
        Geom::Point(p) => vec![*p],
        Geom::MultiPoint(points) => points.clone(),
        Geom::LineString(contour) => line_midpoint(contour).into_iter().collect(),
        Geom::MultiLineString(contours) => contours.iter().filter_map(line_midpoint).collect(),
        Geom::Polygon(polygon) => polygon.bounding_rect().map(|r| r.center()).into_iter().collect(),
        Geom::MultiPolygon(polygons) => polygons
            .iter()
            .filter_map(|p| p.bounding_rect())
            .map(|r| r.center())
            .collect(),
        Geom::Circle { center, .. } => vec![*center],
    }
}

/// Point in the middle of the line length.
fn line_midpoint(contour: &Contour) -> Option<Point2> {
    let length: f64 = contour.iter_segments().map(|s| nalgebra::distance(s.0, s.1)).sum();
    let mut remaining = length / 2.0;
    for segment in contour.iter_segments() {
        let segment_length = nalgebra::distance(segment.0, segment.1);
        if segment_length >= remaining && segment_length > 0.0 {
            let k = remaining / segment_length;
            return Some(segment.0 + (segment.1 - segment.0) * k);
        }
        remaining -= segment_length;
    }

    contour.points().first().copied()
}
