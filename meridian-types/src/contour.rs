//! Contour is a sequence of points.
//!
//! Contours can be:
//! * **open** - the first and the last points of the contour are not connected, for example a road.
//! * **closed** - the first and the last points are connected by an implicit segment, for example a shoreline.
//!
//! A closed contour should not repeat its first point at the end. [`Contour::iter_points_closing`] and
//! [`Contour::iter_segments`] deal with the closing segment instead.

use serde::{Deserialize, Serialize};

use crate::cartesian::{Point2, Rect};
use crate::segment::Segment;
use crate::MeridianTypesError;

/// Sequence of points. See module level documentation for details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    points: Vec<Point2>,
    is_closed: bool,
}

/// Direction of traversal of a closed contour.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Winding {
    /// Counterclockwise in a coordinate system with Y axis pointing up.
    CounterClockwise,
    /// Clockwise in a coordinate system with Y axis pointing up.
    Clockwise,
}

impl Contour {
    /// Creates a new contour.
    pub fn new(points: Vec<Point2>, is_closed: bool) -> Self {
        Self { points, is_closed }
    }

    /// Creates an open contour.
    pub fn open(points: Vec<Point2>) -> Self {
        Self::new(points, false)
    }

    /// Creates a closed contour. If the last point repeats the first one, it is removed.
    pub fn closed(mut points: Vec<Point2>) -> Self {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        Self::new(points, true)
    }

    /// Same as [`Contour::closed`] but fails if the contour has less than 3 distinct points.
    pub fn try_closed(points: Vec<Point2>) -> Result<Self, MeridianTypesError> {
        let contour = Self::closed(points);
        if contour.points.len() < 3 {
            return Err(MeridianTypesError::InvalidGeometry(format!(
                "closed contour must have at least 3 points, got {}",
                contour.points.len()
            )));
        }

        Ok(contour)
    }

    /// Whether the contour is closed.
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// Points of the contour. The first point is not repeated for closed contours.
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    /// Iterates over the points of the contour.
    pub fn iter_points(&self) -> impl Iterator<Item = &Point2> {
        self.points.iter()
    }

    /// Same as [`Contour::iter_points`] but for closed contours repeats the first point at the end.
    pub fn iter_points_closing(&self) -> impl Iterator<Item = &Point2> {
        let closing = if self.is_closed && !self.points.is_empty() {
            self.points.first()
        } else {
            None
        };

        self.points.iter().chain(closing)
    }

    /// Iterates over segments of the contour, including the closing segment for closed contours.
    pub fn iter_segments(&self) -> impl Iterator<Item = Segment<'_>> {
        let points: Vec<&Point2> = self.iter_points_closing().collect();
        (1..points.len()).map(move |i| Segment(points[i - 1], points[i]))
    }

    /// Shortest squared distance from the point to any segment of the contour.
    ///
    /// Returns `None` for an empty contour.
    pub fn distance_to_point_sq(&self, point: &Point2) -> Option<f64> {
        if self.points.len() == 1 {
            return Some(crate::cartesian::distance_sq(&self.points[0], point));
        }

        self.iter_segments()
            .map(|segment| segment.distance_to_point_sq(point))
            .min_by(f64::total_cmp)
    }

    /// Signed area of the contour (shoelace formula). Positive for counterclockwise contours.
    ///
    /// The closing segment is always taken into account, even for open contours.
    pub fn area_signed(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }

        let mut sum = 0.0;
        for i in 0..n {
            let a = &self.points[i];
            let b = &self.points[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }

        sum / 2.0
    }

    /// Winding direction of the contour.
    pub fn winding(&self) -> Winding {
        if self.area_signed() >= 0.0 {
            Winding::CounterClockwise
        } else {
            Winding::Clockwise
        }
    }

    /// Returns a copy of the contour with reversed point order.
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self::new(points, self.is_closed)
    }

    /// Bounding rectangle. `None` for an empty contour.
    pub fn bounding_rect(&self) -> Option<Rect> {
        Rect::from_points(self.points.iter())
    }

    /// Number of times a horizontal ray from the point crosses the contour.
    pub(crate) fn ray_crossings(&self, point: &Point2) -> usize {
        let points = &self.points;
        let n = points.len();
        if n < 2 {
            return 0;
        }

        (0..n)
            .filter(|&i| Segment(&points[i], &points[(i + 1) % n]).crosses_ray(point))
            .count()
    }
}

impl From<Vec<Point2>> for Contour {
    fn from(points: Vec<Point2>) -> Self {
        Self::open(points)
    }
}
