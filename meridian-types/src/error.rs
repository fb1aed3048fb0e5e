//! Error type used by the crate.

use thiserror::Error;

/// Error enum.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeridianTypesError {
    /// Geometry cannot be constructed from the given points.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}
