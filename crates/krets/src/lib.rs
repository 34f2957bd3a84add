//! # Krets
//!
//! A sparse-LU circuit simulation core written in Rust.
//!
//! Krets provides the numerical machinery of a SPICE-style simulator:
//! - A linked-grid sparse matrix with Markowitz pivoting and a fast
//!   refactorization path for unchanged sparsity patterns
//! - Newton-Raphson iteration with the SPICE initialization-mode machine
//! - Variable-order trapezoidal time integration with adaptive stepping,
//!   truncation-error control, and breakpoint handling
//!
//! Device models and netlist handling live outside this core; circuits
//! implement [`Circuit`] and stamp their contributions through sparse
//! element handles.
//!
//! ## Quick Start
//!
//! ```rust
//! use krets::prelude::*;
//!
//! // Solve a 2x2 system directly through the sparse solver.
//! let mut solver = RealSolver::new();
//! let id = solver.get_element(1, 1);
//! solver.add(id, 2.0);
//! let id = solver.get_element(2, 2);
//! solver.add(id, 4.0);
//! solver.add_rhs(1, 2.0);
//! solver.add_rhs(2, 8.0);
//!
//! solver.order_and_factor().unwrap();
//! let mut x = vec![0.0; 3];
//! solver.solve(&mut x).unwrap();
//! assert_eq!(x[1], 1.0);
//! assert_eq!(x[2], 2.0);
//! ```

// Re-export member crates
pub use krets_engine as engine;
pub use krets_sparse as sparse;

// Convenient re-exports from krets_sparse
pub use krets_sparse::{
    ComplexSolver,
    ElementId,
    Error as SparseError,
    LuSolver,
    Markowitz,
    RealSolver,
    SparseMatrix,
    SparseVector,
    Translation,
};

// Convenient re-exports from krets_engine
pub use krets_engine::{
    Circuit,
    Error as EngineError,
    InitMode,
    LoadContext,
    NewtonIteration,
    SetupContext,
    StateSlot,
    TimePoint,
    Transient,
    TransientConfig,
    TransientResult,
    Trapezoidal,
    VariableMap,
};

/// Commonly used types in one import.
pub mod prelude {
    pub use crate::{
        Circuit, ComplexSolver, ElementId, LoadContext, RealSolver, SetupContext, StateSlot,
        TimePoint, Transient, TransientConfig, TransientResult, Trapezoidal, VariableMap,
    };
}
