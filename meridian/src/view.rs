use meridian_types::cartesian::{Point2, Rect, Size};

use crate::projection::Projection;
use crate::render::Transform;

/// Position of the map on the screen: center, resolution, rotation and the size of the viewport.
///
/// Size is given in logical (CSS) pixels. Rotation is in radians, positive values turn the map clockwise.
#[derive(Debug, Clone)]
pub struct MapView {
    center: Point2,
    resolution: f64,
    rotation: f64,
    projection: Projection,
    size: Size,
}

impl MapView {
    /// Creates a new view with zero size and no rotation.
    pub fn new(center: Point2, resolution: f64, projection: Projection) -> Self {
        Self {
            center,
            resolution,
            rotation: 0.0,
            projection,
            size: Size::new(0.0, 0.0),
        }
    }

    /// Center of the view in projection coordinates.
    pub fn center(&self) -> Point2 {
        self.center
    }

    /// Returns a copy of the view with a new center.
    pub fn with_center(&self, center: Point2) -> Self {
        Self {
            center,
            ..self.clone()
        }
    }

    /// Map units per logical pixel.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Returns a copy of the view with a new resolution.
    pub fn with_resolution(&self, resolution: f64) -> Self {
        Self {
            resolution,
            ..self.clone()
        }
    }

    /// Rotation in radians.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Returns a copy of the view with a new rotation.
    pub fn with_rotation(&self, rotation: f64) -> Self {
        Self {
            rotation,
            ..self.clone()
        }
    }

    /// Projection of the view.
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Size of the viewport in logical pixels.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Returns a copy of the view with a new viewport size.
    pub fn with_size(&self, size: Size) -> Self {
        Self {
            size,
            ..self.clone()
        }
    }

    /// Transform from map coordinates to logical pixels.
    pub fn coordinate_to_pixel_transform(&self) -> Transform {
        Transform::render_transform(
            &self.center,
            self.resolution,
            self.rotation,
            1.0,
            self.size.width(),
            self.size.height(),
            0.0,
        )
    }

    /// Transform from logical pixels to map coordinates.
    pub fn pixel_to_coordinate_transform(&self) -> Option<Transform> {
        self.coordinate_to_pixel_transform().invert()
    }

    /// Map area covered by the viewport. For rotated views this is the bounding box of the rotated viewport.
    pub fn extent(&self) -> Rect {
        let dx = self.resolution * self.size.half_width();
        let dy = self.resolution * self.size.half_height();
        let (sin, cos) = self.rotation.sin_cos();
        let corners = [(-dx, -dy), (-dx, dy), (dx, dy), (dx, -dy)].map(|(x, y)| {
            Point2::new(
                self.center.x + x * cos - y * sin,
                self.center.y + x * sin + y * cos,
            )
        });

        Rect::from_points(corners.iter()).unwrap_or_else(|| Rect::from_point(&self.center))
    }
}
