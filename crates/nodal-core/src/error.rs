//! Error types for nodal-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("circuit is not finalized: {0}")]
    NotFinalized(&'static str),

    #[error("circuit is already finalized; elements and nodes are frozen")]
    Finalized,

    #[error("invalid time step dt = {dt}; must be > 0")]
    InvalidTimeStep { dt: f64 },

    #[error("unknown node index {0}")]
    UnknownNode(i32),
}

pub type Result<T> = std::result::Result<T, Error>;
