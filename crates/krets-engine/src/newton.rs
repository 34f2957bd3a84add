//! Newton-Raphson iteration over the sparse solver.

use krets_sparse::RealSolver;
use log::{debug, trace};

use crate::circuit::{Circuit, LoadContext};
use crate::error::{Error, Result};
use crate::method::Trapezoidal;
use crate::state::{InitMode, SimState};

/// Outcome of one call to [`NewtonIteration::iterate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationReport {
    pub converged: bool,
    pub iterations: usize,
}

/// Newton loop shared by the operating point and every time point.
///
/// Keeps the reorder flag across calls: the expensive Markowitz ordering
/// runs once per structural change, after which the cheap in-place
/// factorization path is used until it reports a bad pivot.
#[derive(Debug)]
pub struct NewtonIteration {
    pub reltol: f64,
    pub abstol: f64,
    should_reorder: bool,
}

impl Default for NewtonIteration {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonIteration {
    pub fn new() -> Self {
        Self {
            reltol: 1e-3,
            abstol: 1e-6,
            should_reorder: true,
        }
    }

    fn is_convergent(&self, state: &SimState) -> bool {
        for i in 1..state.solution.len() {
            let new = state.solution[i];
            let old = state.old_solution[i];
            let tolerance = self.reltol * new.abs().max(old.abs()) + self.abstol;
            if (new - old).abs() > tolerance {
                return false;
            }
        }
        true
    }

    /// Iterate to a solution at one operating or time point.
    ///
    /// Returns `Ok` with `converged = false` when `max_iterations` is
    /// exceeded; the caller decides whether that is fatal (DC operating
    /// point) or a retry with a smaller step (transient). A singular
    /// matrix is always fatal.
    pub fn iterate(
        &mut self,
        circuit: &mut dyn Circuit,
        solver: &mut RealSolver,
        state: &mut SimState,
        mut method: Option<&mut Trapezoidal>,
        time: f64,
        dc: bool,
        max_iterations: usize,
    ) -> Result<IterationReport> {
        let mut iterno = 0;
        let mut init_transient = state.init == InitMode::InitTransient;

        loop {
            solver.clear();
            {
                let mut ctx = LoadContext {
                    solver,
                    method: method.as_deref_mut(),
                    solution: &state.solution,
                    init: state.init,
                    dc,
                    time,
                };
                circuit.load(&mut ctx);
            }
            iterno += 1;

            // The junction starting point and the first transient point
            // restamp enough of the matrix to invalidate the pivot order.
            if state.init == InitMode::Junction || init_transient {
                self.should_reorder = true;
            }

            if self.should_reorder {
                debug!("reordering at t={time:.6e}, iteration {iterno}");
                solver.order_and_factor()?;
                self.should_reorder = false;
            } else if !solver.factor() {
                trace!("bad pivot in fast factorization, requesting reorder");
                solver.set_needs_reordering(true);
                self.should_reorder = true;
                continue;
            }

            state.store_solution();
            solver.solve(&mut state.solution)?;
            state.solution[0] = 0.0;
            state.old_solution[0] = 0.0;

            if iterno > max_iterations {
                return Ok(IterationReport {
                    converged: false,
                    iterations: iterno,
                });
            }

            state.is_convergent = iterno != 1 && self.is_convergent(state);

            if init_transient {
                init_transient = false;
                if iterno <= 1 {
                    self.should_reorder = true;
                }
                state.init = InitMode::Float;
                continue;
            }
            match state.init {
                InitMode::Float => {
                    if state.is_convergent {
                        return Ok(IterationReport {
                            converged: true,
                            iterations: iterno,
                        });
                    }
                }
                InitMode::Junction => {
                    state.init = InitMode::Fix;
                    self.should_reorder = true;
                }
                InitMode::Fix => {
                    if state.is_convergent {
                        state.init = InitMode::Float;
                    }
                }
                InitMode::None | InitMode::InitTransient => {
                    state.init = InitMode::Float;
                }
            }
        }
    }

    /// Solve the DC operating point, returning the iteration count.
    /// Non-convergence is fatal here.
    pub fn operating_point(
        &mut self,
        circuit: &mut dyn Circuit,
        solver: &mut RealSolver,
        state: &mut SimState,
        max_iterations: usize,
    ) -> Result<usize> {
        state.init = InitMode::Junction;
        let report = self.iterate(circuit, solver, state, None, 0.0, true, max_iterations)?;
        if !report.converged {
            return Err(Error::OpConvergenceFailed {
                iterations: report.iterations,
            });
        }
        Ok(report.iterations)
    }
}
