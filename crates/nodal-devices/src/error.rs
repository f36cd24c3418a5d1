//! Error types for nodal-devices.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid element parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Core(#[from] nodal_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
