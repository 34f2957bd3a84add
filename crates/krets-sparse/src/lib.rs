//! Sparse linear algebra for Krets.
//!
//! This crate provides:
//! - A linked-grid sparse matrix whose elements survive pivot reordering
//! - A sparse vector sharing the same arena-and-links layout
//! - External/internal index translation so stamping code never sees pivots
//! - Markowitz pivot selection with relative and absolute thresholds
//! - An LU solver over real or complex values, with a fast refactorization
//!   path for unchanged sparsity patterns and a transposed solve

pub mod element;
pub mod error;
pub mod markowitz;
pub mod matrix;
pub mod scalar;
pub mod solver;
pub mod translation;
pub mod vector;

pub use element::ElementId;
pub use error::{Error, Result};
pub use markowitz::Markowitz;
pub use matrix::SparseMatrix;
pub use scalar::Scalar;
pub use solver::{ComplexSolver, LuSolver, RealSolver};
pub use translation::Translation;
pub use vector::{SparseVector, VectorElementId};
