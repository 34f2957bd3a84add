//! The seam between the engine and device stamping code.

use krets_sparse::RealSolver;

use crate::method::Trapezoidal;
use crate::state::InitMode;
use crate::variables::VariableMap;

/// Context for the one-time setup phase: allocate matrix elements,
/// register named unknowns, allocate integration state slots.
pub struct SetupContext<'a> {
    pub solver: &'a mut RealSolver,
    pub variables: &'a mut VariableMap,
    pub method: &'a mut Trapezoidal,
}

/// Context for the load phase of one Newton iteration.
///
/// Devices stamp Jacobian entries through their element handles and
/// right-hand side contributions through [`RealSolver::add_rhs`]. During a
/// transient iteration `method` carries the active integration
/// coefficients; it is `None` while solving the DC operating point.
pub struct LoadContext<'a> {
    pub solver: &'a mut RealSolver,
    pub method: Option<&'a mut Trapezoidal>,
    /// Solution of the previous iteration, indexed by equation number.
    pub solution: &'a [f64],
    pub init: InitMode,
    /// True while computing the DC operating point.
    pub dc: bool,
    pub time: f64,
}

/// A circuit that can be simulated by the transient driver.
///
/// Implementations own their devices and write all contributions in the
/// load phase; the engine guarantees load completes before factoring and
/// factoring before solving within each iteration.
pub trait Circuit {
    /// Number of equations, excluding the ground reference.
    fn num_unknowns(&self) -> usize;

    /// Allocate element handles, variables, and integration states.
    fn setup(&mut self, ctx: &mut SetupContext);

    /// Stamp the matrix and right-hand side for one Newton iteration.
    fn load(&mut self, ctx: &mut LoadContext);

    /// Seed integration states from the converged operating point.
    fn init_states(&mut self, _method: &mut Trapezoidal, _solution: &[f64]) {}

    /// Called once per accepted time point.
    fn accept(&mut self, _time: f64) {}

    /// Mandatory stop times known up front (source discontinuities).
    fn breakpoints(&self) -> Vec<f64> {
        Vec::new()
    }
}
