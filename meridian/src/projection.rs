//! Projection descriptor.
//!
//! Projection math is opaque to the crate: a projection only describes its units, its valid extent and whether the
//! world repeats horizontally. Optional `project`/`unproject` functions convert between geographic and projected
//! coordinates.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use meridian_types::cartesian::{Point2, Rect};
use serde::{Deserialize, Serialize};

/// Radius of the sphere used to convert degrees into meters.
const EARTH_RADIUS: f64 = 6_370_997.0;

/// Half size of the Web Mercator world in meters.
const WEB_MERCATOR_HALF_SIZE: f64 = 20_037_508.342789244;

/// Function converting a point between coordinate systems.
pub type TransformFn = Arc<dyn Fn(&Point2) -> Point2 + Send + Sync>;

/// Units of a projection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Units {
    /// Meters.
    Meters,
    /// Degrees.
    Degrees,
    /// International feet.
    Feet,
    /// US survey feet.
    UsFeet,
    /// Pixels of an image.
    Pixels,
}

impl Units {
    /// Number of meters in one unit. `None` for units without a fixed ground size.
    pub fn meters_per_unit(&self) -> Option<f64> {
        match self {
            Units::Meters => Some(1.0),
            Units::Degrees => Some(2.0 * std::f64::consts::PI * EARTH_RADIUS / 360.0),
            Units::Feet => Some(0.3048),
            Units::UsFeet => Some(1200.0 / 3937.0),
            Units::Pixels => None,
        }
    }
}

/// Description of a projected coordinate system.
#[derive(Clone)]
pub struct Projection {
    code: String,
    units: Units,
    meters_per_unit: Option<f64>,
    extent: Option<Rect>,
    global: bool,
    project: Option<TransformFn>,
    unproject: Option<TransformFn>,
}

impl Debug for Projection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projection")
            .field("code", &self.code)
            .field("units", &self.units)
            .field("extent", &self.extent)
            .field("global", &self.global)
            .finish()
    }
}

/// Projections are identified by their code.
impl PartialEq for Projection {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Projection {
    /// Creates a new projection without an extent.
    pub fn new(code: impl Into<String>, units: Units) -> Self {
        Self {
            code: code.into(),
            units,
            meters_per_unit: None,
            extent: None,
            global: false,
            project: None,
            unproject: None,
        }
    }

    /// Web Mercator projection (`EPSG:3857`).
    pub fn epsg_3857() -> Self {
        let half = WEB_MERCATOR_HALF_SIZE;
        Self::new("EPSG:3857", Units::Meters)
            .with_extent(Rect::new(-half, -half, half, half))
            .with_global(true)
    }

    /// Geographic coordinates in degrees (`EPSG:4326`).
    pub fn epsg_4326() -> Self {
        Self::new("EPSG:4326", Units::Degrees)
            .with_extent(Rect::new(-180.0, -90.0, 180.0, 90.0))
            .with_global(true)
    }

    /// Sets the valid extent of the projection.
    pub fn with_extent(mut self, extent: Rect) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Sets whether the projection covers the whole world.
    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    /// Overrides the number of meters in one projection unit.
    pub fn with_meters_per_unit(mut self, meters_per_unit: f64) -> Self {
        self.meters_per_unit = Some(meters_per_unit);
        self
    }

    /// Sets functions converting geographic coordinates into the projection and back.
    pub fn with_transforms(mut self, project: TransformFn, unproject: TransformFn) -> Self {
        self.project = Some(project);
        self.unproject = Some(unproject);
        self
    }

    /// Code of the projection, e.g. `EPSG:3857`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Units of the projection.
    pub fn units(&self) -> Units {
        self.units
    }

    /// Number of meters in one projection unit.
    pub fn meters_per_unit(&self) -> Option<f64> {
        self.meters_per_unit.or_else(|| self.units.meters_per_unit())
    }

    /// Valid extent of the projection.
    pub fn extent(&self) -> Option<Rect> {
        self.extent
    }

    /// Whether the projection covers the whole world.
    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Returns true if the world repeats horizontally in this projection.
    pub fn can_wrap_x(&self) -> bool {
        self.global && self.extent.is_some()
    }

    /// Converts a geographic point into the projection. Identity if no transform is set.
    pub fn project(&self, point: &Point2) -> Point2 {
        match &self.project {
            Some(project) => project(point),
            None => *point,
        }
    }

    /// Converts a projected point into geographic coordinates. Identity if no transform is set.
    pub fn unproject(&self, point: &Point2) -> Point2 {
        match &self.unproject {
            Some(unproject) => unproject(point),
            None => *point,
        }
    }

    /// Extent of the projection, or a square world-sized extent derived from its units if the projection does
    /// not define one.
    pub fn extent_or_default(&self) -> Rect {
        if let Some(extent) = self.extent {
            return extent;
        }

        let degree = Units::Degrees.meters_per_unit().unwrap_or(1.0);
        let half = 180.0 * degree / self.meters_per_unit().unwrap_or(1.0);
        Rect::new(-half, -half, half, half)
    }
}

/// Moves the coordinate into the world extent of a wrapping projection.
///
/// Coordinates already inside the extent and coordinates of non-wrapping projections are returned unchanged.
pub fn wrap_coordinate_x(coordinate: &Point2, projection: &Projection) -> Point2 {
    let Some(extent) = projection.extent().filter(|_| projection.can_wrap_x()) else {
        return *coordinate;
    };

    if coordinate.x >= extent.x_min() && coordinate.x <= extent.x_max() {
        return *coordinate;
    }

    let world_width = extent.width();
    let worlds_away = ((coordinate.x - extent.x_min()) / world_width).floor();
    Point2::new(coordinate.x - worlds_away * world_width, coordinate.y)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn can_wrap_x() {
        assert!(Projection::epsg_3857().can_wrap_x());
        assert!(Projection::epsg_4326().can_wrap_x());
        assert!(!Projection::new("local", Units::Meters).can_wrap_x());
        assert!(!Projection::new("local", Units::Meters)
            .with_global(true)
            .can_wrap_x());
    }

    #[test]
    fn default_extent_from_units() {
        let extent = Projection::new("EPSG:4087", Units::Meters).extent_or_default();
        let half = std::f64::consts::PI * EARTH_RADIUS;
        assert_abs_diff_eq!(extent.x_max(), half, epsilon = 1e-6);
        assert_abs_diff_eq!(extent.y_min(), -half, epsilon = 1e-6);

        let extent = Projection::new("degrees", Units::Degrees).extent_or_default();
        assert_abs_diff_eq!(extent.x_max(), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn wrap_coordinate() {
        let projection = Projection::epsg_4326();
        let wrapped = wrap_coordinate_x(&Point2::new(190.0, 10.0), &projection);
        assert_abs_diff_eq!(wrapped.x, -170.0, epsilon = 1e-9);
        assert_abs_diff_eq!(wrapped.y, 10.0);

        let wrapped = wrap_coordinate_x(&Point2::new(-550.0, 0.0), &projection);
        assert_abs_diff_eq!(wrapped.x, 170.0, epsilon = 1e-9);

        let inside = Point2::new(180.0, 0.0);
        assert_eq!(wrap_coordinate_x(&inside, &projection), inside);

        let local = Projection::new("local", Units::Meters);
        assert_eq!(wrap_coordinate_x(&Point2::new(1e9, 0.0), &local), Point2::new(1e9, 0.0));
    }
}
