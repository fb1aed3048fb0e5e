//! Affine transforms between map coordinates and pixels.

use meridian_types::cartesian::{Point2, Vector2};
use meridian_types::{Contour, Geom, Polygon};
use nalgebra::{Matrix3, Rotation2};

/// 2d affine transform stored as a homogeneous 3x3 matrix.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform(Matrix3<f64>);

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    /// Translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self(Matrix3::new_translation(&Vector2::new(dx, dy)))
    }

    /// Non-uniform scaling.
    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self(Matrix3::new_nonuniform_scaling(&Vector2::new(sx, sy)))
    }

    /// Rotation by `angle` radians counterclockwise.
    pub fn rotation(angle: f64) -> Self {
        Self(Rotation2::new(angle).to_homogeneous())
    }

    /// Creates a transform equal to `translate(dx1, dy1) * scale(sx, sy) * rotate(angle) * translate(dx2, dy2)`.
    pub fn compose(dx1: f64, dy1: f64, sx: f64, sy: f64, angle: f64, dx2: f64, dy2: f64) -> Self {
        Self::translation(dx1, dy1)
            .then_scale(sx, sy)
            .then_rotate(angle)
            .then_translate(dx2, dy2)
    }

    /// Transform from map coordinates to pixels of a surface with the given size.
    ///
    /// The center of the view is placed in the middle of the surface, Y axis is flipped. `offset_x` is added to
    /// the coordinates before projection and is used to render neighbouring worlds.
    #[allow(clippy::too_many_arguments)]
    pub fn render_transform(
        center: &Point2,
        resolution: f64,
        rotation: f64,
        pixel_ratio: f64,
        width: f64,
        height: f64,
        offset_x: f64,
    ) -> Self {
        let scale = pixel_ratio / resolution;
        Self::compose(
            width / 2.0,
            height / 2.0,
            scale,
            -scale,
            -rotation,
            -center.x + offset_x,
            -center.y,
        )
    }

    /// Returns `self * other`: `other` is applied to points first.
    pub fn multiply(&self, other: &Transform) -> Self {
        Self(self.0 * other.0)
    }

    /// Appends a scaling applied before `self`.
    pub fn then_scale(&self, sx: f64, sy: f64) -> Self {
        self.multiply(&Self::scaling(sx, sy))
    }

    /// Appends a translation applied before `self`.
    pub fn then_translate(&self, dx: f64, dy: f64) -> Self {
        self.multiply(&Self::translation(dx, dy))
    }

    /// Appends a rotation applied before `self`.
    pub fn then_rotate(&self, angle: f64) -> Self {
        self.multiply(&Self::rotation(angle))
    }

    /// Inverse transform. `None` if the transform is degenerate.
    pub fn invert(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Applies the transform to a point.
    pub fn apply(&self, point: &Point2) -> Point2 {
        self.0.transform_point(point)
    }

    /// Length of a unit vector after the transform, assuming uniform scale.
    pub fn scale_factor(&self) -> f64 {
        let m = &self.0;
        (m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)]).abs().sqrt()
    }

    /// Applies the transform to every vertex of the geometry. Circle radius is scaled by
    /// [`Transform::scale_factor`].
    pub fn apply_geom(&self, geom: &Geom) -> Geom {
        let contour = |c: &Contour| {
            Contour::new(
                c.iter_points().map(|p| self.apply(p)).collect(),
                c.is_closed(),
            )
        };
        let polygon = |p: &Polygon| {
            Polygon::new(
                contour(&p.outer_contour),
                p.inner_contours.iter().map(contour).collect(),
            )
        };

        match geom {
            Geom::Point(p) => Geom::Point(self.apply(p)),
            Geom::MultiPoint(points) => {
                Geom::MultiPoint(points.iter().map(|p| self.apply(p)).collect())
            }
            Geom::LineString(c) => Geom::LineString(contour(c)),
            Geom::MultiLineString(contours) => {
                Geom::MultiLineString(contours.iter().map(contour).collect())
            }
            Geom::Polygon(p) => Geom::Polygon(polygon(p)),
            Geom::MultiPolygon(polygons) => {
                Geom::MultiPolygon(polygons.iter().map(polygon).collect())
            }
            Geom::Circle { center, radius } => Geom::Circle {
                center: self.apply(center),
                radius: radius * self.scale_factor(),
            },
        }
    }
}
