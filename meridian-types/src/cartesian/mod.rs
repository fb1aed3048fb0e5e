//! Types and functions on geometries in cartesian coordinates.

mod rect;
mod size;

pub use rect::{Corner, Rect};
pub use size::Size;

/// 2d point with `f64` coordinates.
pub type Point2 = nalgebra::Point2<f64>;
/// 2d vector with `f64` coordinates.
pub type Vector2 = nalgebra::Vector2<f64>;

/// Squared euclidean distance between two points.
pub fn distance_sq(a: &Point2, b: &Point2) -> f64 {
    nalgebra::distance_squared(a, b)
}
