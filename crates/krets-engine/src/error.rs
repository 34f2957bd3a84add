//! Error types for the simulation engine.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Sparse(#[from] krets_sparse::Error),

    #[error("operating point did not converge after {iterations} iterations")]
    OpConvergenceFailed { iterations: usize },

    #[error("timestep too small at t={time:.6e}: delta={delta:.6e}")]
    TimestepTooSmall { time: f64, delta: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;
