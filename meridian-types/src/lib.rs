//! Cartesian geometry types used by the `meridian` tile renderer.
//!
//! All coordinates are `f64` values in a projected (planar) coordinate system. Geometries know how to compute
//! their bounding rectangles, distances to a point and simplified versions of themselves. They do not know anything
//! about projections: coordinates are expected to already be in the map CRS.

pub mod cartesian;
mod contour;
mod error;
mod geometry;
mod polygon;
mod segment;
mod simplify;

pub use contour::{Contour, Winding};
pub use error::MeridianTypesError;
pub use geometry::{Geom, GeometryType};
pub use polygon::Polygon;
pub use segment::Segment;
pub use simplify::douglas_peucker;
