use thiserror::Error;

use crate::geometric::extraction::Selector;

/// Conditions raised by the surface reconstruction core.
///
/// `NoPoints` and `InsufficientData` are expected data problems: the caller
/// skips the surface (or the file) and moves on. `ShapeMismatch` is a
/// recoverable error that must never be papered over by reshaping.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    #[error("no points match selector {selector}")]
    NoPoints { selector: Selector },

    #[error("non-finite coordinate in point {index} ({selector})")]
    NonFiniteCoordinate { selector: Selector, index: usize },

    #[error("insufficient data: {count} points, at least {required} required")]
    InsufficientData { count: usize, required: usize },

    #[error("raster shape mismatch: DSM is {dsm:?}, DTM is {dtm:?}")]
    ShapeMismatch {
        dsm: (usize, usize),
        dtm: (usize, usize),
    },

    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),

    #[error("grid over extent ({0}, {1}) has no cells")]
    EmptyGrid(f64, f64),
}

impl SurfaceError {
    /// Expected data conditions that skip a file instead of failing it
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            SurfaceError::NoPoints { .. } | SurfaceError::InsufficientData { .. }
        )
    }
}
