use serde::{Deserialize, Serialize};

use crate::cartesian::Point2;

/// Corner of a rectangle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Corner {
    /// `(x_min, y_min)`
    BottomLeft,
    /// `(x_max, y_min)`
    BottomRight,
    /// `(x_min, y_max)`
    #[default]
    TopLeft,
    /// `(x_max, y_max)`
    TopRight,
}

/// Axis aligned rectangle. Also used as a map extent.
///
/// Edges are inclusive for all predicates: two rectangles sharing one edge intersect.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Minimum X.
    pub x_min: f64,
    /// Minimum Y.
    pub y_min: f64,
    /// Maximum X.
    pub x_max: f64,
    /// Maximum Y.
    pub y_max: f64,
}

impl Rect {
    /// Creates a new rectangle. Coordinates are used as is, no normalization is done.
    pub const fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Rectangle with zero area around the point.
    pub fn from_point(p: &Point2) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    /// Bounding rectangle of the points. Returns `None` if the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut rect = Self::from_point(first);
        for p in points {
            rect.extend_point(p);
        }

        Some(rect)
    }

    /// Minimum X.
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Maximum X.
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Minimum Y.
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    /// Maximum Y.
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Width.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Returns true if the rectangle has no area or is inverted.
    pub fn is_empty(&self) -> bool {
        !(self.x_max > self.x_min && self.y_max > self.y_min)
    }

    /// Center point.
    pub fn center(&self) -> Point2 {
        Point2::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Returns the given corner point.
    pub fn corner(&self, corner: Corner) -> Point2 {
        match corner {
            Corner::BottomLeft => Point2::new(self.x_min, self.y_min),
            Corner::BottomRight => Point2::new(self.x_max, self.y_min),
            Corner::TopLeft => Point2::new(self.x_min, self.y_max),
            Corner::TopRight => Point2::new(self.x_max, self.y_max),
        }
    }

    /// Grows the rectangle to include the point.
    pub fn extend_point(&mut self, p: &Point2) {
        self.x_min = self.x_min.min(p.x);
        self.y_min = self.y_min.min(p.y);
        self.x_max = self.x_max.max(p.x);
        self.y_max = self.y_max.max(p.y);
    }

    /// Moves every edge inwards by `amount`. Negative amount grows the rectangle.
    pub fn shrink(&self, amount: f64) -> Self {
        Self {
            x_min: self.x_min + amount,
            x_max: self.x_max - amount,
            y_min: self.y_min + amount,
            y_max: self.y_max - amount,
        }
    }

    /// Moves every edge outwards by `amount`.
    pub fn buffer(&self, amount: f64) -> Self {
        self.shrink(-amount)
    }

    /// Smallest rectangle containing both rectangles.
    pub fn merge(&self, other: Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Common part of two rectangles, `None` if they do not intersect.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }

        Some(Self {
            x_min: self.x_min.max(other.x_min),
            y_min: self.y_min.max(other.y_min),
            x_max: self.x_max.min(other.x_max),
            y_max: self.y_max.min(other.y_max),
        })
    }

    /// Returns true if the point is inside the rectangle or on its edge.
    pub fn contains(&self, point: &Point2) -> bool {
        self.x_min <= point.x
            && self.x_max >= point.x
            && self.y_min <= point.y
            && self.y_max >= point.y
    }

    /// Returns true if `other` lies completely inside the rectangle.
    pub fn contains_rect(&self, other: &Self) -> bool {
        self.x_min <= other.x_min
            && self.x_max >= other.x_max
            && self.y_min <= other.y_min
            && self.y_max >= other.y_max
    }

    /// Returns true if the rectangles have at least one common point.
    pub fn intersects(&self, other: &Self) -> bool {
        self.x_min <= other.x_max
            && self.x_max >= other.x_min
            && self.y_min <= other.y_max
            && self.y_max >= other.y_min
    }

    /// Scales the rectangle around its center.
    pub fn magnify(&self, factor: f64) -> Self {
        let center = self.center();
        let half_width = self.width() / 2.0 * factor;
        let half_height = self.height() / 2.0 * factor;
        Self {
            x_min: center.x - half_width,
            x_max: center.x + half_width,
            y_min: center.y - half_height,
            y_max: center.y + half_height,
        }
    }

    /// Returns a copy of the rectangle moved along the X axis.
    pub fn translate_x(&self, dx: f64) -> Self {
        Self {
            x_min: self.x_min + dx,
            x_max: self.x_max + dx,
            ..*self
        }
    }

    /// Corner points in the order `bottom-left, top-left, top-right, bottom-right`.
    pub fn into_quadrangle(self) -> [Point2; 4] {
        [
            Point2::new(self.x_min, self.y_min),
            Point2::new(self.x_min, self.y_max),
            Point2::new(self.x_max, self.y_max),
            Point2::new(self.x_max, self.y_min),
        ]
    }
}

impl FromIterator<Rect> for Option<Rect> {
    fn from_iter<T: IntoIterator<Item = Rect>>(iter: T) -> Self {
        iter.into_iter().reduce(|acc, rect| acc.merge(rect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersects_includes_edges() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        assert!(a.intersects(&Rect::new(1.0, 0.0, 2.0, 1.0)));
        assert!(a.intersects(&Rect::new(0.5, 0.5, 0.6, 0.6)));
        assert!(!a.intersects(&Rect::new(1.1, 0.0, 2.0, 1.0)));
        assert!(!a.intersects(&Rect::new(0.0, -2.0, 1.0, -0.1)));
    }

    #[test]
    fn intersection() {
        let a = Rect::new(0.0, 0.0, 2.0, 2.0);
        let b = Rect::new(1.0, -1.0, 3.0, 1.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(1.0, 0.0, 2.0, 1.0)));
        assert_eq!(a.intersection(&Rect::new(5.0, 5.0, 6.0, 6.0)), None);
    }

    #[test]
    fn buffer_and_shrink() {
        let a = Rect::new(0.0, 0.0, 2.0, 2.0);
        assert_eq!(a.buffer(1.0), Rect::new(-1.0, -1.0, 3.0, 3.0));
        assert_eq!(a.shrink(0.5), Rect::new(0.5, 0.5, 1.5, 1.5));
        assert!(a.shrink(1.0).is_empty());
    }

    #[test]
    fn corners() {
        let a = Rect::new(0.0, 1.0, 2.0, 3.0);
        assert_eq!(a.corner(Corner::TopLeft), Point2::new(0.0, 3.0));
        assert_eq!(a.corner(Corner::BottomRight), Point2::new(2.0, 1.0));
    }

    #[test]
    fn merge_from_iterator() {
        let merged: Option<Rect> = [Rect::new(0.0, 0.0, 1.0, 1.0), Rect::new(-1.0, 0.5, 0.5, 4.0)]
            .into_iter()
            .collect();
        assert_eq!(merged, Some(Rect::new(-1.0, 0.0, 1.0, 4.0)));

        let empty: Option<Rect> = std::iter::empty().collect();
        assert_eq!(empty, None);
    }
}
