//! Transient analysis driver.

use log::{debug, warn};
use nalgebra::DVector;

use krets_sparse::RealSolver;

use crate::circuit::{Circuit, SetupContext};
use crate::error::{Error, Result};
use crate::method::Trapezoidal;
use crate::newton::NewtonIteration;
use crate::state::{InitMode, SimState};
use crate::variables::VariableMap;

/// Parameters for a transient analysis.
#[derive(Debug, Clone)]
pub struct TransientConfig {
    /// Suggested output step size.
    pub step: f64,
    pub final_time: f64,
    /// Hard upper bound on the timestep.
    pub max_step: f64,
    /// Relative tolerance for convergence and truncation error.
    pub reltol: f64,
    /// Absolute tolerance for convergence and truncation error.
    pub abstol: f64,
    /// Newton iteration budget per time point.
    pub max_iterations: usize,
    /// Newton iteration budget for the DC operating point.
    pub dc_max_iterations: usize,
}

impl TransientConfig {
    pub fn new(step: f64, final_time: f64) -> Self {
        Self {
            step,
            final_time,
            max_step: final_time / 50.0,
            reltol: 1e-3,
            abstol: 1e-6,
            max_iterations: 10,
            dc_max_iterations: 100,
        }
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Smallest usable timestep; stepping below it is fatal.
    pub fn delta_min(&self) -> f64 {
        1e-13 * self.max_step
    }
}

/// One accepted time point.
#[derive(Debug, Clone)]
pub struct TimePoint {
    pub time: f64,
    /// Solution indexed by equation number; entry 0 is ground.
    pub solution: DVector<f64>,
}

/// Accepted time points plus step statistics.
///
/// The statistics surface the silently retried conditions: rejected steps
/// (truncation error or Newton non-convergence) and the total Newton
/// iteration count including the operating point.
#[derive(Debug, Clone)]
pub struct TransientResult {
    pub points: Vec<TimePoint>,
    pub accepted: usize,
    pub rejected: usize,
    pub iterations: usize,
}

/// Transient simulation: DC operating point followed by adaptive
/// time-stepping with Newton iteration at every probed time point.
pub struct Transient {
    config: TransientConfig,
    solver: RealSolver,
    method: Trapezoidal,
    variables: VariableMap,
    newton: NewtonIteration,
}

impl Transient {
    pub fn new(config: TransientConfig) -> Self {
        let method = Trapezoidal::new(config.max_step);
        let mut newton = NewtonIteration::new();
        newton.reltol = config.reltol;
        newton.abstol = config.abstol;
        Self {
            config,
            solver: RealSolver::new(),
            method,
            variables: VariableMap::new(),
            newton,
        }
    }

    /// Named unknowns registered during circuit setup.
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// Run the analysis to `final_time`.
    pub fn execute(&mut self, circuit: &mut dyn Circuit) -> Result<TransientResult> {
        {
            let mut ctx = SetupContext {
                solver: &mut self.solver,
                variables: &mut self.variables,
                method: &mut self.method,
            };
            circuit.setup(&mut ctx);
        }
        let unknowns = circuit
            .num_unknowns()
            .max(self.solver.size())
            .max(self.variables.len());
        let mut state = SimState::new(unknowns);

        self.method.add_breakpoint(0.0);
        self.method.add_breakpoint(self.config.final_time);
        for breakpoint in circuit.breakpoints() {
            if breakpoint > 0.0 && breakpoint < self.config.final_time {
                self.method.add_breakpoint(breakpoint);
            }
        }

        let op_iterations = self.newton.operating_point(
            circuit,
            &mut self.solver,
            &mut state,
            self.config.dc_max_iterations,
        )?;
        debug!("operating point converged in {op_iterations} iterations");

        self.method.initialize(&state.solution);
        circuit.init_states(&mut self.method, &state.solution);
        let initial_delta = (self.config.final_time / 50.0).min(self.config.step) / 10.0;
        self.method.set_delta(initial_delta);

        let mut result = TransientResult {
            points: Vec::new(),
            accepted: 0,
            rejected: 0,
            iterations: op_iterations,
        };
        let delta_min = self.config.delta_min();

        loop {
            // Accept the current point (the operating point on the first
            // pass) and export it.
            circuit.accept(self.method.time());
            self.method.accept(&state.solution);
            result.accepted += 1;
            result.points.push(TimePoint {
                time: self.method.base_time(),
                solution: DVector::from_column_slice(&state.solution),
            });

            if self.method.base_time() >= self.config.final_time {
                return Ok(result);
            }

            // Probe until a point both converges and passes LTE control.
            loop {
                self.method.probe();
                self.method.compute_coefficients();
                self.method.predict();

                // The first point after the operating point restarts the
                // init machine once.
                if self.method.base_time() == 0.0 {
                    state.init = InitMode::InitTransient;
                }
                let time = self.method.time();
                let report = self.newton.iterate(
                    circuit,
                    &mut self.solver,
                    &mut state,
                    Some(&mut self.method),
                    time,
                    false,
                    self.config.max_iterations,
                )?;
                result.iterations += report.iterations;

                if !report.converged {
                    warn!(
                        "no convergence at t={:.6e}, cutting delta to {:.6e}",
                        self.method.time(),
                        self.method.delta() / 8.0
                    );
                    self.method.rollback();
                    result.rejected += 1;
                    let delta = self.method.delta() / 8.0;
                    self.method.set_delta(delta);
                    self.method.cut_order();
                } else if self.method.base_time() == 0.0
                    || self
                        .method
                        .lte_control(&state.solution, self.config.reltol, self.config.abstol)
                {
                    // Accepted; the first point is never LTE-checked.
                    break;
                } else {
                    debug!(
                        "step rejected by truncation error at t={:.6e}, delta now {:.6e}",
                        self.method.time(),
                        self.method.delta()
                    );
                    result.rejected += 1;
                }

                if self.method.delta() <= delta_min {
                    // One clamp to the floor is allowed if we were above
                    // it before this cut.
                    if self.method.old_delta() > delta_min {
                        self.method.set_delta(delta_min);
                    } else {
                        return Err(Error::TimestepTooSmall {
                            time: self.method.base_time(),
                            delta: self.method.delta(),
                        });
                    }
                }
            }
        }
    }
}
