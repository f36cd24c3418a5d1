//! Error types for nodal-solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The elimination hit a pivot below threshold; `row` is the zero-based
    /// row of the failing pivot.
    #[error("singular matrix: pivot below threshold at row {row}")]
    SingularPivot { row: usize },

    #[error(transparent)]
    Core(#[from] nodal_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
