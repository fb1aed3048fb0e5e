use serde::{Deserialize, Serialize};

use crate::cartesian::{Point2, Rect};
use crate::contour::Contour;

/// Polygon with one outer contour and any number of holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Outer boundary.
    pub outer_contour: Contour,
    /// Holes.
    pub inner_contours: Vec<Contour>,
}

impl Polygon {
    /// Creates a new polygon.
    pub fn new(outer_contour: Contour, inner_contours: Vec<Contour>) -> Self {
        Self {
            outer_contour,
            inner_contours,
        }
    }

    /// Iterates over all contours, the outer one first.
    pub fn iter_contours(&self) -> impl Iterator<Item = &Contour> {
        std::iter::once(&self.outer_contour).chain(self.inner_contours.iter())
    }

    /// Returns true if the point is inside the polygon by the even-odd rule. Points on the boundary are inside.
    pub fn contains_point(&self, point: &Point2) -> bool {
        if self
            .iter_contours()
            .filter_map(|c| c.distance_to_point_sq(point))
            .any(|d| d == 0.0)
        {
            return true;
        }

        let crossings: usize = self.iter_contours().map(|c| c.ray_crossings(point)).sum();
        crossings % 2 == 1
    }

    /// Squared distance from the point to the polygon. Zero for points inside the polygon.
    pub fn distance_to_point_sq(&self, point: &Point2) -> Option<f64> {
        if self.contains_point(point) {
            return Some(0.0);
        }

        self.iter_contours()
            .filter_map(|c| c.distance_to_point_sq(point))
            .min_by(f64::total_cmp)
    }

    /// Bounding rectangle of the outer contour.
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.outer_contour.bounding_rect()
    }
}

impl From<Contour> for Polygon {
    fn from(outer_contour: Contour) -> Self {
        Self::new(outer_contour, vec![])
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn ring(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Contour {
        Contour::closed(vec![
            Point2::new(x_min, y_min),
            Point2::new(x_max, y_min),
            Point2::new(x_max, y_max),
            Point2::new(x_min, y_max),
        ])
    }

    #[test]
    fn contains_point_with_hole() {
        let polygon = Polygon::new(ring(0.0, 0.0, 10.0, 10.0), vec![ring(4.0, 4.0, 6.0, 6.0)]);

        assert!(polygon.contains_point(&Point2::new(1.0, 1.0)));
        assert!(!polygon.contains_point(&Point2::new(5.0, 5.0)));
        assert!(!polygon.contains_point(&Point2::new(11.0, 5.0)));
        assert!(polygon.contains_point(&Point2::new(0.0, 5.0)));
        assert!(polygon.contains_point(&Point2::new(10.0, 10.0)));
    }

    #[test]
    fn distance_to_point() {
        let polygon = Polygon::new(ring(0.0, 0.0, 10.0, 10.0), vec![ring(4.0, 4.0, 6.0, 6.0)]);
        assert_relative_eq!(polygon.distance_to_point_sq(&Point2::new(2.0, 2.0)).unwrap(), 0.0);
        assert_relative_eq!(polygon.distance_to_point_sq(&Point2::new(5.0, 5.0)).unwrap(), 1.0);
        assert_relative_eq!(polygon.distance_to_point_sq(&Point2::new(13.0, 5.0)).unwrap(), 9.0);
    }
}
