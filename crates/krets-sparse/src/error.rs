//! Error types for krets-sparse.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// No acceptable pivot exists at an elimination step. Indices are
    /// external (pre-permutation) so callers can name the offending unknown.
    #[error("structurally singular matrix at external position ({row}, {col})")]
    SingularMatrix { row: usize, col: usize },

    #[error("solver is not factored yet")]
    NotFactored,
}

pub type Result<T> = std::result::Result<T, Error>;
