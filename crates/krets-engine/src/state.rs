//! Shared simulation state for the Newton iteration.

/// Initialization mode steering device stamping during Newton iteration.
///
/// The operating point walks `Junction` → `Fix` → `Float`; nonlinear
/// devices use the mode to pick starting junction voltages before letting
/// the solution float. `InitTransient` is a one-shot override for the
/// first time point after the operating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitMode {
    #[default]
    None,
    Junction,
    Fix,
    Float,
    InitTransient,
}

/// Solution vectors and convergence bookkeeping, mutated in place across
/// Newton iterations.
#[derive(Debug, Clone)]
pub struct SimState {
    /// Current solution, indexed by equation number; entry 0 is ground.
    pub solution: Vec<f64>,
    /// Solution of the previous Newton iteration.
    pub old_solution: Vec<f64>,
    pub init: InitMode,
    pub is_convergent: bool,
}

impl SimState {
    /// Create state for `unknowns` equations (plus the ground entry).
    pub fn new(unknowns: usize) -> Self {
        Self {
            solution: vec![0.0; unknowns + 1],
            old_solution: vec![0.0; unknowns + 1],
            init: InitMode::None,
            is_convergent: false,
        }
    }

    /// Make the current solution the old one before the next solve.
    pub fn store_solution(&mut self) {
        std::mem::swap(&mut self.solution, &mut self.old_solution);
    }
}
