//! Drawing primitives and the instruction pipeline of vector tiles.
//!
//! Features of a tile are first recorded into a [`BuilderGroup`] as resolution independent
//! [instructions](Instruction) bucketed by z index and [`BuilderType`]. A finished group is turned into an
//! [`ExecutorGroup`] that replays the instructions onto any [`DrawingSurface`] with a given transform, and answers
//! hit detection queries.

use std::any::Any;
use std::sync::Arc;

use meridian_types::cartesian::{Point2, Rect, Size};
use maybe_sync::{MaybeSend, MaybeSync};
use meridian_types::{Contour, Geom, Polygon};

mod builder_group;
mod declutter;
mod executor_group;
mod instruction;
mod recording;
mod transform;

pub use builder_group::{BuilderGroup, BuilderInstructions};
pub use declutter::{DeclutterItem, DeclutterTree};
pub use executor_group::ExecutorGroup;
pub use instruction::{BuilderType, Instruction, InstructionKind};
pub use recording::{DrawCommand, RecordedCommand, RecordingSurface};
pub use transform::Transform;

use crate::style::DecodedIcon;
use crate::Color;

/// Target of the drawing operations, in device pixels.
///
/// Clipping and global alpha are part of the surface state, saved and restored by [`DrawingSurface::save`] and
/// [`DrawingSurface::restore`].
pub trait DrawingSurface: MaybeSend + MaybeSync {
    /// Size of the surface in device pixels.
    fn size(&self) -> Size;
    /// Pushes the current state to the stack.
    fn save(&mut self);
    /// Pops the state from the stack. Does nothing if the stack is empty.
    fn restore(&mut self);
    /// Current global alpha.
    fn global_alpha(&self) -> f64;
    /// Sets the alpha multiplied into every following drawing operation.
    fn set_global_alpha(&mut self, alpha: f64);
    /// Intersects the clip region with the path, using the nonzero winding rule.
    fn clip(&mut self, path: &Path);
    /// Fills the path using the nonzero winding rule.
    fn fill_path(&mut self, path: &Path, paint: &Paint);
    /// Draws the outline of the path.
    fn stroke_path(&mut self, path: &Path, paint: &LinePaint);
    /// Draws an image.
    fn draw_icon(&mut self, icon: &IconPaint);
    /// Draws a label.
    fn draw_text(&mut self, text: &TextPaint);
    /// Creates a new transparent surface of the same kind.
    fn create_offscreen(&self, width: u32, height: u32) -> Box<dyn DrawingSurface>;
    /// Draws the content of another surface with the given transform from its pixels to the pixels of this surface.
    fn draw_surface(&mut self, surface: &dyn DrawingSurface, transform: &Transform);
    /// Casts the surface to `Any`.
    fn as_any(&self) -> &dyn Any;
}

/// Area paint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    /// Fill color.
    pub color: Color,
}

/// Line paint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePaint {
    /// Line color.
    pub color: Color,
    /// Line width in device pixels.
    pub width: f64,
}

/// Image placed on the surface.
#[derive(Debug, Clone)]
pub struct IconPaint {
    /// Image.
    pub image: Arc<DecodedIcon>,
    /// Top-left corner of the image in device pixels.
    pub position: Point2,
    /// Drawn size in device pixels.
    pub size: Size,
    /// Rotation around the anchor point in radians, clockwise.
    pub rotation: f64,
    /// Anchor point in device pixels.
    pub anchor: Point2,
    /// Opacity.
    pub opacity: f64,
}

impl IconPaint {
    /// Area covered by the icon, ignoring rotation.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.position.x + self.size.width(),
            self.position.y + self.size.height(),
        )
    }
}

/// Label placed on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPaint {
    /// Text.
    pub text: String,
    /// Center of the label in device pixels.
    pub position: Point2,
    /// Font size in device pixels.
    pub font_size: f64,
    /// Text color.
    pub color: Color,
}

/// One element of a [`Path`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    /// Starts a new subpath.
    MoveTo(Point2),
    /// Adds a straight segment to the current subpath.
    LineTo(Point2),
    /// Closes the current subpath.
    Close,
    /// Adds a closed circular subpath, counterclockwise on the screen.
    Circle {
        /// Center.
        center: Point2,
        /// Radius.
        radius: f64,
    },
}

/// Sequence of subpaths in device pixels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    commands: Vec<PathCommand>,
}

impl Path {
    /// Empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of one closed ring.
    pub fn from_ring(points: &[Point2]) -> Self {
        let mut path = Self::new();
        path.add_ring(points.iter().copied());
        path
    }

    /// Path of a geometry. Points are ignored.
    pub fn from_geom(geom: &Geom) -> Self {
        let mut path = Self::new();
        path.add_geom(geom);
        path
    }

    /// Commands of the path.
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    /// Returns true if the path has no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Adds a closed ring.
    pub fn add_ring(&mut self, points: impl IntoIterator<Item = Point2>) {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return;
        };

        self.commands.push(PathCommand::MoveTo(first));
        self.commands.extend(points.map(PathCommand::LineTo));
        self.commands.push(PathCommand::Close);
    }

    /// Adds the geometry to the path. Open contours are not closed.
    pub fn add_geom(&mut self, geom: &Geom) {
        match geom {
            Geom::Point(_) | Geom::MultiPoint(_) => {}
            Geom::LineString(contour) => self.add_contour(contour),
            Geom::MultiLineString(contours) => contours.iter().for_each(|c| self.add_contour(c)),
            Geom::Polygon(polygon) => self.add_polygon(polygon),
            Geom::MultiPolygon(polygons) => polygons.iter().for_each(|p| self.add_polygon(p)),
            Geom::Circle { center, radius } => self.commands.push(PathCommand::Circle {
                center: *center,
                radius: *radius,
            }),
        }
    }

    fn add_contour(&mut self, contour: &Contour) {
        let mut points = contour.iter_points();
        let Some(first) = points.next() else {
            return;
        };

        self.commands.push(PathCommand::MoveTo(*first));
        self.commands.extend(points.map(|p| PathCommand::LineTo(*p)));
        if contour.is_closed() {
            self.commands.push(PathCommand::Close);
        }
    }

    fn add_polygon(&mut self, polygon: &Polygon) {
        for contour in polygon.iter_contours() {
            self.add_ring(contour.iter_points().copied());
        }
    }

    /// Straight segments of the path. Every subpath is treated as closed, circles are skipped.
    fn closed_segments(&self) -> Vec<(Point2, Point2)> {
        let mut segments = vec![];
        let mut start = None;
        let mut current = None;
        let close = |start: Option<Point2>, current: Option<Point2>, segments: &mut Vec<_>| {
            if let (Some(start), Some(current)) = (start, current) {
                if start != current {
                    segments.push((current, start));
                }
            }
        };

        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    close(start, current, &mut segments);
                    start = Some(p);
                    current = Some(p);
                }
                PathCommand::LineTo(p) => {
                    if let Some(from) = current {
                        segments.push((from, p));
                    } else {
                        start = Some(p);
                    }
                    current = Some(p);
                }
                PathCommand::Close => {
                    close(start, current, &mut segments);
                    current = start;
                }
                PathCommand::Circle { .. } => {}
            }
        }
        close(start, current, &mut segments);

        segments
    }

    /// Winding number of the path around the point.
    pub fn winding_number(&self, point: &Point2) -> i32 {
        let mut winding = 0;
        for (a, b) in self.closed_segments() {
            if a.y <= point.y {
                if b.y > point.y && cross(&a, &b, point) > 0.0 {
                    winding += 1;
                }
            } else if b.y <= point.y && cross(&a, &b, point) < 0.0 {
                winding -= 1;
            }
        }

        for command in &self.commands {
            if let PathCommand::Circle { center, radius } = command {
                if nalgebra::distance(center, point) < *radius {
                    winding += 1;
                }
            }
        }

        winding
    }

    /// Returns true if the point is inside the path by the nonzero winding rule.
    pub fn contains(&self, point: &Point2) -> bool {
        self.winding_number(point) != 0
    }

    /// Distance from the point to the outline of the path. Open subpaths are measured as open lines.
    pub fn distance_to_outline(&self, point: &Point2) -> Option<f64> {
        let mut min: Option<f64> = None;
        let mut update = |distance: f64| {
            min = Some(min.map_or(distance, |m| m.min(distance)));
        };

        let mut start = None;
        let mut current: Option<Point2> = None;
        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    start = Some(p);
                    current = Some(p);
                }
                PathCommand::LineTo(p) => {
                    if let Some(from) = current {
                        update(segment_distance(&from, &p, point));
                    }
                    current = Some(p);
                }
                PathCommand::Close => {
                    if let (Some(from), Some(to)) = (current, start) {
                        update(segment_distance(&from, &to, point));
                    }
                    current = start;
                }
                PathCommand::Circle { center, radius } => {
                    update((nalgebra::distance(&center, point) - radius).abs());
                }
            }
        }

        min
    }

    /// Bounding box of the path.
    pub fn bounds(&self) -> Option<Rect> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                PathCommand::MoveTo(p) | PathCommand::LineTo(p) => Some(Rect::from_point(p)),
                PathCommand::Circle { center, radius } => {
                    Some(Rect::from_point(center).buffer(*radius))
                }
                PathCommand::Close => None,
            })
            .collect()
    }
}

/// Positive if `p` is to the left of the directed line `a -> b`.
fn cross(a: &Point2, b: &Point2, p: &Point2) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y)
}

fn segment_distance(a: &Point2, b: &Point2, p: &Point2) -> f64 {
    meridian_types::Segment(a, b).distance_to_point_sq(p).sqrt()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Vec<Point2> {
        vec![
            Point2::new(x, y),
            Point2::new(x + size, y),
            Point2::new(x + size, y + size),
            Point2::new(x, y + size),
        ]
    }

    #[test]
    fn nonzero_contains() {
        let path = Path::from_ring(&square(0.0, 0.0, 10.0));
        assert!(path.contains(&Point2::new(5.0, 5.0)));
        assert!(!path.contains(&Point2::new(15.0, 5.0)));
    }

    #[test]
    fn opposite_rings_cut_a_hole() {
        let mut path = Path::from_ring(&square(0.0, 0.0, 10.0));
        let mut inner = square(2.0, 2.0, 4.0);
        inner.reverse();
        path.add_ring(inner);

        assert!(path.contains(&Point2::new(1.0, 1.0)));
        assert!(!path.contains(&Point2::new(3.0, 3.0)));
    }

    #[test]
    fn same_direction_rings_do_not_cut() {
        let mut path = Path::from_ring(&square(0.0, 0.0, 10.0));
        path.add_ring(square(2.0, 2.0, 4.0));
        assert!(path.contains(&Point2::new(3.0, 3.0)));
    }

    #[test]
    fn outline_distance() {
        let path = Path::from_ring(&square(0.0, 0.0, 10.0));
        let inside = path
            .distance_to_outline(&Point2::new(5.0, 2.0))
            .expect("not empty");
        assert_abs_diff_eq!(inside, 2.0, epsilon = 1e-9);
        let outside = path
            .distance_to_outline(&Point2::new(13.0, 5.0))
            .expect("not empty");
        assert_abs_diff_eq!(outside, 3.0, epsilon = 1e-9);
        assert_eq!(Path::new().distance_to_outline(&Point2::new(0.0, 0.0)), None);
    }
}
