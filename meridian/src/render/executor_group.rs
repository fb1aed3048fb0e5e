use std::collections::HashSet;
use std::sync::Arc;

use meridian_types::cartesian::{Point2, Rect, Size};
use meridian_types::Geom;

use super::builder_group::BuilderInstructions;
use super::declutter::DeclutterTree;
use super::instruction::{BuilderType, Instruction, InstructionKind};
use super::{DrawingSurface, IconPaint, LinePaint, Paint, Path, TextPaint, Transform};
use crate::feature::{Feature, FeatureKey};
use crate::style::{CircleStyle, IconStyle, TextStyle};

/// Replays the instructions of a finished [`BuilderGroup`](super::BuilderGroup).
///
/// If the group has a maximum extent, drawing is clipped to it.
#[derive(Debug, Clone)]
pub struct ExecutorGroup {
    max_extent: Option<Rect>,
    resolution: f64,
    pixel_ratio: f64,
    overlaps: bool,
    render_buffer: f64,
    instructions: Arc<BuilderInstructions>,
}

impl ExecutorGroup {
    /// Creates an executor group.
    ///
    /// With `overlaps` unset, adjacent areas with the same fill are filled in one operation, so that no seams are
    /// visible between them. `render_buffer` is the distance in pixels symbols may extend beyond their geometry.
    pub fn new(
        max_extent: Option<Rect>,
        resolution: f64,
        pixel_ratio: f64,
        overlaps: bool,
        instructions: Arc<BuilderInstructions>,
        render_buffer: f64,
    ) -> Self {
        Self {
            max_extent,
            resolution,
            pixel_ratio,
            overlaps,
            render_buffer,
            instructions,
        }
    }

    /// Clip extent of the group.
    pub fn max_extent(&self) -> Option<Rect> {
        self.max_extent
    }

    /// Resolution the group was built at.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Pixel ratio the group was built for.
    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Returns true if the group has instructions of any of the categories.
    pub fn has_executors(&self, builder_types: &[BuilderType]) -> bool {
        self.instructions.values().any(|by_type| {
            builder_types
                .iter()
                .any(|t| by_type.get(t).is_some_and(|list| !list.is_empty()))
        })
    }

    /// Corners of the clip extent in pixels, in the order `bottom-left, top-left, top-right, bottom-right` of the
    /// extent.
    pub fn get_clip_coords(&self, transform: &Transform) -> Option<[Point2; 4]> {
        let corners = self.max_extent?.into_quadrangle();
        Some(corners.map(|p| transform.apply(&p)))
    }

    /// Draws the instructions of the given categories in z index order.
    ///
    /// `transform` maps map coordinates to the pixels of the surface, `pixel_ratio` is the number of surface pixels
    /// per logical pixel of the styles. With `snap_to_pixel` set, icons and labels are aligned to whole pixels.
    /// If a declutter tree is given, symbols colliding with already placed ones are skipped and z indices are
    /// processed from top to bottom.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        surface: &mut dyn DrawingSurface,
        pixel_ratio: f64,
        transform: &Transform,
        rotation: f64,
        snap_to_pixel: bool,
        builder_types: Option<&[BuilderType]>,
        mut declutter: Option<&mut DeclutterTree>,
    ) {
        let builder_types = builder_types.unwrap_or(&BuilderType::ORDER[..]);
        let mut zs: Vec<&i32> = self.instructions.keys().collect();
        if declutter.is_some() {
            zs.reverse();
        }

        let clip = self.get_clip_coords(transform);
        if let Some(clip) = &clip {
            surface.save();
            surface.clip(&Path::from_ring(clip));
        }

        let context = ExecutionContext {
            pixel_ratio,
            transform,
            rotation,
            snap_to_pixel,
        };
        for z in zs {
            let Some(by_type) = self.instructions.get(z) else {
                continue;
            };
            for builder_type in BuilderType::ORDER {
                if !builder_types.contains(&builder_type) {
                    continue;
                }
                let Some(instructions) = by_type.get(&builder_type) else {
                    continue;
                };

                match builder_type {
                    BuilderType::Polygon | BuilderType::Circle if !self.overlaps => {
                        context.draw_areas_batched(surface, instructions)
                    }
                    _ => {
                        for instruction in instructions {
                            context.draw(surface, instruction, declutter.as_deref_mut());
                        }
                    }
                }
            }
        }

        if clip.is_some() {
            surface.restore();
        }
    }

    /// Calls `callback` for every feature drawn within `hit_tolerance` pixels from the coordinate, topmost first,
    /// with the squared distance in pixels. Stops and returns `true` as soon as the callback returns `true`.
    ///
    /// If `decluttered` is given, point symbols and labels of features not in the set are ignored.
    pub fn for_each_feature_at_coordinate(
        &self,
        coordinate: &Point2,
        resolution: f64,
        rotation: f64,
        hit_tolerance: f64,
        callback: &mut dyn FnMut(&Arc<Feature>, &Geom, f64) -> bool,
        decluttered: Option<&HashSet<FeatureKey>>,
    ) -> bool {
        let hit_extent =
            Rect::from_point(coordinate).buffer(resolution * (self.render_buffer + hit_tolerance));
        let to_pixels =
            Transform::render_transform(coordinate, resolution, rotation, 1.0, 0.0, 0.0, 0.0);

        for by_type in self.instructions.values().rev() {
            for builder_type in BuilderType::ORDER.iter().rev() {
                let Some(instructions) = by_type.get(builder_type) else {
                    continue;
                };

                for instruction in instructions.iter().rev() {
                    if let Some(decluttered) = decluttered {
                        if builder_type.is_declutterable()
                            && !decluttered.contains(&instruction.feature.key())
                        {
                            continue;
                        }
                    }

                    let in_range = instruction
                        .geometry
                        .bounding_rect()
                        .is_some_and(|bbox| bbox.intersects(&hit_extent));
                    if !in_range {
                        continue;
                    }

                    let Some(distance) =
                        hit_distance(instruction, coordinate, resolution, &to_pixels)
                    else {
                        continue;
                    };
                    if distance <= hit_tolerance
                        && callback(&instruction.feature, &instruction.geometry, distance * distance)
                    {
                        return true;
                    }
                }
            }
        }

        false
    }
}

struct ExecutionContext<'a> {
    pixel_ratio: f64,
    transform: &'a Transform,
    rotation: f64,
    snap_to_pixel: bool,
}

impl ExecutionContext<'_> {
    fn snap(&self, point: Point2) -> Point2 {
        if self.snap_to_pixel {
            Point2::new(point.x.round(), point.y.round())
        } else {
            point
        }
    }

    fn line_paint(&self, stroke: &crate::style::Stroke) -> LinePaint {
        LinePaint {
            color: stroke.color,
            width: stroke.width * self.pixel_ratio,
        }
    }

    fn draw_areas_batched(&self, surface: &mut dyn DrawingSurface, instructions: &[Instruction]) {
        let mut start = 0;
        while start < instructions.len() {
            let fill = area_fill(&instructions[start]);
            let end = instructions[start..]
                .iter()
                .position(|i| area_fill(i) != fill)
                .map_or(instructions.len(), |offset| start + offset);
            let batch = &instructions[start..end];

            if let Some(fill) = fill {
                let mut path = Path::new();
                for instruction in batch {
                    path.add_geom(&self.transform.apply_geom(&instruction.geometry));
                }
                surface.fill_path(&path, &Paint { color: fill.color });
            }

            for instruction in batch {
                if let InstructionKind::Area {
                    stroke: Some(stroke),
                    ..
                } = &instruction.kind
                {
                    let path = Path::from_geom(&self.transform.apply_geom(&instruction.geometry));
                    surface.stroke_path(&path, &self.line_paint(stroke));
                }
            }

            start = end;
        }
    }

    fn draw(
        &self,
        surface: &mut dyn DrawingSurface,
        instruction: &Instruction,
        mut declutter: Option<&mut DeclutterTree>,
    ) {
        match &instruction.kind {
            InstructionKind::Area { fill, stroke } => {
                let path = Path::from_geom(&self.transform.apply_geom(&instruction.geometry));
                if let Some(fill) = fill {
                    surface.fill_path(&path, &Paint { color: fill.color });
                }
                if let Some(stroke) = stroke {
                    surface.stroke_path(&path, &self.line_paint(stroke));
                }
            }
            InstructionKind::Line(stroke) => {
                let path = Path::from_geom(&self.transform.apply_geom(&instruction.geometry));
                surface.stroke_path(&path, &self.line_paint(stroke));
            }
            InstructionKind::CircleSymbol(circle) => {
                for point in instruction.geometry.iter_points() {
                    let center = self.snap(self.transform.apply(point));
                    let bounds = Rect::from_point(&center)
                        .buffer(circle_symbol_radius(circle) * self.pixel_ratio);
                    if !place(declutter.as_deref_mut(), bounds, &instruction.feature) {
                        continue;
                    }

                    let path = Path::from_geom(&Geom::Circle {
                        center,
                        radius: circle.radius * self.pixel_ratio,
                    });
                    if let Some(fill) = circle.fill {
                        surface.fill_path(&path, &Paint { color: fill.color });
                    }
                    if let Some(stroke) = &circle.stroke {
                        surface.stroke_path(&path, &self.line_paint(stroke));
                    }
                }
            }
            InstructionKind::Icon(icon) => {
                let (Some(image), Some(size)) = (icon.image.image(), icon.size()) else {
                    return;
                };
                let size = size.scale(self.pixel_ratio);
                let rotation = icon_rotation(icon, self.rotation);

                for point in instruction.geometry.iter_points() {
                    let anchor = self.snap(self.transform.apply(point));
                    let position = self.snap(icon_top_left(icon, &anchor, size));
                    let paint = IconPaint {
                        image: image.clone(),
                        position,
                        size,
                        rotation,
                        anchor,
                        opacity: icon.opacity,
                    };
                    if place(declutter.as_deref_mut(), paint.bounds(), &instruction.feature) {
                        surface.draw_icon(&paint);
                    }
                }
            }
            InstructionKind::Text(text) => {
                let size = text.approximate_size().scale(self.pixel_ratio);
                for point in instruction.geometry.iter_points() {
                    let position = self.snap(
                        self.transform.apply(point) + text.offset_vector() * self.pixel_ratio,
                    );
                    let bounds = centered_box(&position, size);
                    if place(declutter.as_deref_mut(), bounds, &instruction.feature) {
                        surface.draw_text(&TextPaint {
                            text: text.text.clone(),
                            position,
                            font_size: text.font_size * self.pixel_ratio,
                            color: text.color,
                        });
                    }
                }
            }
            InstructionKind::Custom(renderer) => {
                let geometry = self.transform.apply_geom(&instruction.geometry);
                renderer(surface, &geometry, &instruction.feature);
            }
        }
    }
}

fn area_fill(instruction: &Instruction) -> Option<crate::style::Fill> {
    match &instruction.kind {
        InstructionKind::Area { fill, .. } => *fill,
        _ => None,
    }
}

/// Inserts the symbol box into the declutter tree. Returns false if the symbol must be skipped.
fn place(declutter: Option<&mut DeclutterTree>, bounds: Rect, feature: &Feature) -> bool {
    match declutter {
        Some(tree) => tree.try_insert(bounds, feature.key()),
        None => true,
    }
}

fn circle_symbol_radius(circle: &CircleStyle) -> f64 {
    circle.radius + circle.stroke.map_or(0.0, |s| s.width / 2.0)
}

fn icon_rotation(icon: &IconStyle, view_rotation: f64) -> f64 {
    if icon.rotate_with_view {
        icon.rotation + view_rotation
    } else {
        icon.rotation
    }
}

fn icon_top_left(icon: &IconStyle, anchor: &Point2, size: Size) -> Point2 {
    Point2::new(
        anchor.x - icon.anchor[0] * size.width(),
        anchor.y - icon.anchor[1] * size.height(),
    )
}

fn centered_box(center: &Point2, size: Size) -> Rect {
    Rect::new(
        center.x - size.half_width(),
        center.y - size.half_height(),
        center.x + size.half_width(),
        center.y + size.half_height(),
    )
}

/// Distance from the origin to the box.
fn distance_to_box(bounds: &Rect) -> f64 {
    let dx = (bounds.x_min().max(0.0)).max(-bounds.x_max());
    let dy = (bounds.y_min().max(0.0)).max(-bounds.y_max());
    (dx * dx + dy * dy).sqrt()
}

/// Distance in pixels from the coordinate to the drawn symbol of the instruction.
///
/// `to_pixels` maps the coordinate to the origin.
fn hit_distance(
    instruction: &Instruction,
    coordinate: &Point2,
    resolution: f64,
    to_pixels: &Transform,
) -> Option<f64> {
    let geometry = &instruction.geometry;
    let half_width = |stroke: &Option<crate::style::Stroke>| stroke.map_or(0.0, |s| s.width / 2.0);

    let distance = match &instruction.kind {
        InstructionKind::Area { fill, stroke } => {
            let map_distance = if fill.is_some() {
                geometry.distance_to_point_sq(coordinate)?.sqrt()
            } else {
                Path::from_geom(geometry).distance_to_outline(coordinate)?
            };
            map_distance / resolution - half_width(stroke)
        }
        InstructionKind::Line(stroke) => {
            geometry.distance_to_point_sq(coordinate)?.sqrt() / resolution - stroke.width / 2.0
        }
        InstructionKind::Custom(_) => geometry.distance_to_point_sq(coordinate)?.sqrt() / resolution,
        InstructionKind::CircleSymbol(circle) => {
            geometry.distance_to_point_sq(coordinate)?.sqrt() / resolution
                - circle_symbol_radius(circle)
        }
        InstructionKind::Icon(icon) => {
            let size = icon.size()?;
            geometry
                .iter_points()
                .map(|p| {
                    let anchor = to_pixels.apply(p);
                    let top_left = icon_top_left(icon, &anchor, size);
                    distance_to_box(&Rect::new(
                        top_left.x,
                        top_left.y,
                        top_left.x + size.width(),
                        top_left.y + size.height(),
                    ))
                })
                .min_by(f64::total_cmp)?
        }
        InstructionKind::Text(text) => text_hit_distance(text, geometry, to_pixels)?,
    };

    Some(distance.max(0.0))
}

fn text_hit_distance(text: &TextStyle, geometry: &Geom, to_pixels: &Transform) -> Option<f64> {
    let size = text.approximate_size();
    geometry
        .iter_points()
        .map(|p| distance_to_box(&centered_box(&(to_pixels.apply(p) + text.offset_vector()), size)))
        .min_by(f64::total_cmp)
}

#[cfg(test)]
mod tests {
    use meridian_types::{Contour, Polygon};

    use super::*;
    use crate::render::{BuilderGroup, RecordingSurface};
    use crate::style::{Fill, ImageStyle, Stroke, Style, TextStyle};
    use crate::Color;

    fn square(x: f64, y: f64, size: f64) -> Arc<Feature> {
        let contour = Contour::closed(vec![
            Point2::new(x, y),
            Point2::new(x + size, y),
            Point2::new(x + size, y + size),
            Point2::new(x, y + size),
        ]);
        Arc::new(Feature::new(Polygon::from(contour)))
    }

    fn executor(features: &[(Arc<Feature>, Style)], max_extent: Option<Rect>) -> ExecutorGroup {
        let mut builder = BuilderGroup::new(max_extent, 1.0, 1.0);
        for (feature, style) in features {
            builder
                .add_feature(feature, 0.0, style, None)
                .expect("group is not finished");
        }
        ExecutorGroup::new(max_extent, 1.0, 1.0, true, builder.finish(), 100.0)
    }

    fn fill(color: Color) -> Style {
        Style::new().with_fill(Fill::new(color))
    }

    #[test]
    fn z_index_order() {
        let group = executor(
            &[
                (square(0.0, 0.0, 10.0), fill(Color::RED).with_z_index(1)),
                (square(0.0, 0.0, 10.0), fill(Color::BLUE)),
            ],
            None,
        );
        let mut surface = RecordingSurface::new(10, 10);
        group.execute(
            &mut surface,
            1.0,
            &Transform::identity(),
            0.0,
            true,
            None,
            None,
        );

        assert_eq!(surface.color_at(&Point2::new(5.0, 5.0)), Color::RED);
    }

    #[test]
    fn builder_type_filter() {
        let group = executor(&[(square(0.0, 0.0, 10.0), fill(Color::RED))], None);
        assert!(group.has_executors(&[BuilderType::Polygon]));
        assert!(!group.has_executors(&[BuilderType::Text, BuilderType::Image]));

        let mut surface = RecordingSurface::new(10, 10);
        group.execute(
            &mut surface,
            1.0,
            &Transform::identity(),
            0.0,
            true,
            Some(&[BuilderType::Text]),
            None,
        );
        assert!(surface.commands().is_empty());
    }

    #[test]
    fn drawing_is_clipped_to_extent() {
        let extent = Rect::new(0.0, 0.0, 5.0, 5.0);
        let group = executor(&[(square(0.0, 0.0, 10.0), fill(Color::RED))], Some(extent));
        let mut surface = RecordingSurface::new(10, 10);
        group.execute(
            &mut surface,
            1.0,
            &Transform::identity(),
            0.0,
            true,
            None,
            None,
        );

        assert_eq!(surface.saved_states(), 0);
        assert_eq!(surface.color_at(&Point2::new(2.5, 2.5)), Color::RED);
        assert_eq!(surface.color_at(&Point2::new(7.5, 7.5)), Color::TRANSPARENT);

        let clip = group
            .get_clip_coords(&Transform::scaling(2.0, 2.0))
            .expect("has extent");
        assert_eq!(clip[0], Point2::new(0.0, 0.0));
        assert_eq!(clip[2], Point2::new(10.0, 10.0));
    }

    #[test]
    fn adjacent_fills_are_batched_without_overlaps() {
        let mut builder = BuilderGroup::new(None, 1.0, 1.0);
        for feature in [square(0.0, 0.0, 5.0), square(5.0, 0.0, 5.0)] {
            builder
                .add_feature(&feature, 0.0, &fill(Color::RED), None)
                .expect("group is not finished");
        }
        let group = ExecutorGroup::new(None, 1.0, 1.0, false, builder.finish(), 100.0);
        let mut surface = RecordingSurface::new(10, 10);
        group.execute(
            &mut surface,
            1.0,
            &Transform::identity(),
            0.0,
            true,
            None,
            None,
        );

        assert_eq!(surface.commands().len(), 1);
    }

    #[test]
    fn labels_are_decluttered() {
        let style = Style::new().with_text(TextStyle::new("label", 10.0));
        let group = executor(
            &[
                (Arc::new(Feature::new(Point2::new(10.0, 10.0))), style.clone()),
                (Arc::new(Feature::new(Point2::new(12.0, 10.0))), style.clone()),
                (Arc::new(Feature::new(Point2::new(80.0, 10.0))), style),
            ],
            None,
        );

        let mut tree = DeclutterTree::new();
        let mut surface = RecordingSurface::new(100, 100);
        group.execute(
            &mut surface,
            1.0,
            &Transform::identity(),
            0.0,
            true,
            None,
            Some(&mut tree),
        );

        assert_eq!(surface.texts().count(), 2);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn hit_detection_order_and_distance() {
        let bottom = square(0.0, 0.0, 10.0);
        let top = Arc::new(Feature::new(Point2::new(3.0, 0.0)));
        let circle = ImageStyle::Circle(CircleStyle {
            radius: 1.0,
            fill: Some(Fill::new(Color::BLUE)),
            stroke: None,
        });
        let group = executor(
            &[
                (bottom.clone(), fill(Color::RED)),
                (top.clone(), Style::new().with_image(circle)),
            ],
            None,
        );

        let mut hits = vec![];
        let found = group.for_each_feature_at_coordinate(
            &Point2::new(0.0, 0.0),
            1.0,
            0.0,
            3.0,
            &mut |feature, _, distance_sq| {
                hits.push((feature.uid(), distance_sq));
                false
            },
            None,
        );

        assert!(!found);
        assert_eq!(hits, vec![(top.uid(), 4.0), (bottom.uid(), 0.0)]);
    }

    #[test]
    fn outline_only_polygon_is_hit_at_the_outline() {
        let style = Style::new().with_stroke(Stroke::new(Color::BLACK, 2.0));
        let group = executor(&[(square(0.0, 0.0, 10.0), style)], None);

        let mut count = 0;
        let mut callback = |_: &Arc<Feature>, _: &Geom, _: f64| {
            count += 1;
            true
        };
        assert!(!group.for_each_feature_at_coordinate(
            &Point2::new(5.0, 5.0),
            1.0,
            0.0,
            1.0,
            &mut callback,
            None
        ));
        assert!(group.for_each_feature_at_coordinate(
            &Point2::new(5.0, 1.5),
            1.0,
            0.0,
            1.0,
            &mut callback,
            None
        ));
        assert_eq!(count, 1);
    }
}
