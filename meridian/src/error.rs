//! Error types used by the crate.

use meridian_types::MeridianTypesError;
use thiserror::Error;

/// Meridian error type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeridianError {
    /// Inconsistent grid or source configuration. Sources with such configuration never become ready.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Zoom level is outside of the grid bounds.
    #[error("zoom level {z} is outside of the grid range [{min_zoom}, {max_zoom}]")]
    OutOfRange {
        /// Requested zoom level.
        z: u32,
        /// Minimum zoom level of the grid.
        min_zoom: u32,
        /// Maximum zoom level of the grid.
        max_zoom: u32,
    },
    /// A source tile or a style image failed to load.
    #[error("failed to load resource: {0}")]
    ResourceLoad(String),
    /// An asynchronous operation could not be started or did not settle.
    #[error("async operation did not settle: {0}")]
    AsyncSettlement(String),
    /// A feature was added to a builder group after it was finished.
    #[error("builder group is already finished")]
    BuilderFinished,
    /// Invalid geometry.
    #[error(transparent)]
    Types(#[from] MeridianTypesError),
}
