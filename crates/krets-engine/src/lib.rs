//! Transient simulation engine for Krets.
//!
//! This crate provides:
//! - Variable-order trapezoidal time integration with LTE step control
//! - Newton-Raphson iteration with the SPICE initialization-mode machine
//! - A transient driver with adaptive stepping and breakpoint handling
//! - A named-unknown variable map for diagnostics
//!
//! Device models live outside the engine; they implement [`Circuit`] and
//! stamp the sparse system through element handles and the integration
//! interface.

pub mod circuit;
pub mod error;
pub mod method;
pub mod newton;
pub mod state;
pub mod transient;
pub mod variables;

pub use circuit::{Circuit, LoadContext, SetupContext};
pub use error::{Error, Result};
pub use method::{MAX_ORDER, StateSlot, Trapezoidal};
pub use newton::{IterationReport, NewtonIteration};
pub use state::{InitMode, SimState};
pub use transient::{TimePoint, Transient, TransientConfig, TransientResult};
pub use variables::VariableMap;
