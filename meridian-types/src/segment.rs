use crate::cartesian::{distance_sq, Point2};

/// A strait line segment between two points.
#[derive(Debug, PartialEq)]
pub struct Segment<'a>(pub &'a Point2, pub &'a Point2);

impl Segment<'_> {
    /// Shortest euclidian distance (squared) between a point and the segment:
    ///
    /// * if the normal from the point to the segment ends inside the segment, the returned value is the squared length
    ///   of the normal
    /// * if the normal from the point to the segment ends outside of the segment, the returned value is the smaller one
    ///   of the distances between the point and the segment's endpoints
    pub fn distance_to_point_sq(&self, point: &Point2) -> f64 {
        if self.0 == self.1 {
            return distance_sq(self.0, point);
        }

        let ds = self.1 - self.0;
        let dp = point - self.0;
        let ds_len = ds.x * ds.x + ds.y * ds.y;

        let r = (dp.x * ds.x + dp.y * ds.y) / ds_len;
        if r <= 0.0 {
            distance_sq(self.0, point)
        } else if r >= 1.0 {
            distance_sq(self.1, point)
        } else {
            let s = (dp.y * ds.x - dp.x * ds.y) / ds_len;
            (s * s) * ds_len
        }
    }

    /// Returns true if a horizontal ray going from the point to the positive X direction crosses the segment.
    ///
    /// Segment's lower endpoint is included and the upper one is not, so a ray through a shared vertex is counted
    /// once.
    pub(crate) fn crosses_ray(&self, point: &Point2) -> bool {
        let (a, b) = (self.0, self.1);
        if (a.y > point.y) == (b.y > point.y) {
            return false;
        }

        let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
        point.x < x_cross
    }
}
