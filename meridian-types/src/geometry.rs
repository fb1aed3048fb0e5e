use serde::{Deserialize, Serialize};

use crate::cartesian::{distance_sq, Point2, Rect};
use crate::contour::Contour;
use crate::polygon::Polygon;
use crate::simplify::douglas_peucker;

/// Geometry of a feature in map coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geom {
    /// Point geometry.
    Point(Point2),
    /// Set of points.
    MultiPoint(Vec<Point2>),
    /// Open contour.
    LineString(Contour),
    /// Set of open contours.
    MultiLineString(Vec<Contour>),
    /// Polygon.
    Polygon(Polygon),
    /// Set of polygons.
    MultiPolygon(Vec<Polygon>),
    /// Circle with the radius in map units.
    Circle {
        /// Center of the circle.
        center: Point2,
        /// Radius in map units.
        radius: f64,
    },
}

/// Type of a [`Geom`] without the coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    /// [`Geom::Point`]
    Point,
    /// [`Geom::MultiPoint`]
    MultiPoint,
    /// [`Geom::LineString`]
    LineString,
    /// [`Geom::MultiLineString`]
    MultiLineString,
    /// [`Geom::Polygon`]
    Polygon,
    /// [`Geom::MultiPolygon`]
    MultiPolygon,
    /// [`Geom::Circle`]
    Circle,
}

impl Geom {
    /// Type of the geometry.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geom::Point(_) => GeometryType::Point,
            Geom::MultiPoint(_) => GeometryType::MultiPoint,
            Geom::LineString(_) => GeometryType::LineString,
            Geom::MultiLineString(_) => GeometryType::MultiLineString,
            Geom::Polygon(_) => GeometryType::Polygon,
            Geom::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geom::Circle { .. } => GeometryType::Circle,
        }
    }

    /// Bounding rectangle. `None` for empty geometries.
    pub fn bounding_rect(&self) -> Option<Rect> {
        match self {
            Geom::Point(p) => Some(Rect::from_point(p)),
            Geom::MultiPoint(points) => Rect::from_points(points.iter()),
            Geom::LineString(contour) => contour.bounding_rect(),
            Geom::MultiLineString(contours) => {
                contours.iter().filter_map(Contour::bounding_rect).collect()
            }
            Geom::Polygon(polygon) => polygon.bounding_rect(),
            Geom::MultiPolygon(polygons) => {
                polygons.iter().filter_map(Polygon::bounding_rect).collect()
            }
            Geom::Circle { center, radius } => Some(Rect::from_point(center).buffer(*radius)),
        }
    }

    /// Squared distance from the point to the geometry. Zero for points inside areas.
    ///
    /// Returns `None` for empty geometries.
    pub fn distance_to_point_sq(&self, point: &Point2) -> Option<f64> {
        match self {
            Geom::Point(p) => Some(distance_sq(p, point)),
            Geom::MultiPoint(points) => points
                .iter()
                .map(|p| distance_sq(p, point))
                .min_by(f64::total_cmp),
            Geom::LineString(contour) => contour.distance_to_point_sq(point),
            Geom::MultiLineString(contours) => contours
                .iter()
                .filter_map(|c| c.distance_to_point_sq(point))
                .min_by(f64::total_cmp),
            Geom::Polygon(polygon) => polygon.distance_to_point_sq(point),
            Geom::MultiPolygon(polygons) => polygons
                .iter()
                .filter_map(|p| p.distance_to_point_sq(point))
                .min_by(f64::total_cmp),
            Geom::Circle { center, radius } => {
                let distance = (distance_sq(center, point).sqrt() - radius).max(0.0);
                Some(distance * distance)
            }
        }
    }

    /// Returns a simplified copy of the geometry.
    ///
    /// Contours are simplified with [`douglas_peucker`]. Points and circles are returned unchanged.
    pub fn simplify(&self, squared_tolerance: f64) -> Self {
        let contour = |c: &Contour| {
            Contour::new(
                douglas_peucker(c.points(), squared_tolerance),
                c.is_closed(),
            )
        };
        let polygon = |p: &Polygon| {
            Polygon::new(
                contour(&p.outer_contour),
                p.inner_contours.iter().map(contour).collect(),
            )
        };

        match self {
            Geom::Point(_) | Geom::MultiPoint(_) | Geom::Circle { .. } => self.clone(),
            Geom::LineString(c) => Geom::LineString(contour(c)),
            Geom::MultiLineString(contours) => {
                Geom::MultiLineString(contours.iter().map(contour).collect())
            }
            Geom::Polygon(p) => Geom::Polygon(polygon(p)),
            Geom::MultiPolygon(polygons) => {
                Geom::MultiPolygon(polygons.iter().map(polygon).collect())
            }
        }
    }

    /// Iterates over all vertices of the geometry. Circles yield their center.
    pub fn iter_points(&self) -> Box<dyn Iterator<Item = &Point2> + '_> {
        match self {
            Geom::Point(p) | Geom::Circle { center: p, .. } => Box::new(std::iter::once(p)),
            Geom::MultiPoint(points) => Box::new(points.iter()),
            Geom::LineString(c) => Box::new(c.iter_points()),
            Geom::MultiLineString(contours) => {
                Box::new(contours.iter().flat_map(Contour::iter_points))
            }
            Geom::Polygon(p) => Box::new(p.iter_contours().flat_map(Contour::iter_points)),
            Geom::MultiPolygon(polygons) => Box::new(
                polygons
                    .iter()
                    .flat_map(|p| p.iter_contours().flat_map(Contour::iter_points)),
            ),
        }
    }
}

impl From<Point2> for Geom {
    fn from(value: Point2) -> Self {
        Self::Point(value)
    }
}

impl From<Polygon> for Geom {
    fn from(value: Polygon) -> Self {
        Self::Polygon(value)
    }
}
