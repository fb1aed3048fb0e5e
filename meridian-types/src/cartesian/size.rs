use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Width and height of a rectangular area, usually in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f64,
    height: f64,
}

impl Size {
    /// Creates a new size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Square size with both sides equal to `side`.
    pub const fn square(side: f64) -> Self {
        Self::new(side, side)
    }

    /// Width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Half of the width.
    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    /// Height.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Half of the height.
    pub fn half_height(&self) -> f64 {
        self.height / 2.0
    }

    /// Returns true if one of the dimensions is zero.
    pub fn is_zero(&self) -> bool {
        self.width.is_zero() || self.height.is_zero()
    }

    /// Returns a size with both dimensions multiplied by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    /// Returns true if both sizes are equal within the relative `tolerance`.
    pub fn approx_eq(&self, other: &Size, tolerance: f64) -> bool {
        (self.width - other.width).abs() <= tolerance * self.width.abs()
            && (self.height - other.height).abs() <= tolerance * self.height.abs()
    }
}
