//! Variable-order trapezoidal integration with local truncation error
//! control and breakpoint handling.

/// Highest integration order (backward Euler = 1, trapezoidal = 2).
pub const MAX_ORDER: usize = 2;

/// Handle to a per-device integration state slot.
///
/// A slot stores a (value, derivative) pair per history depth; devices set
/// the value (charge or flux) during the load phase and read back the
/// derivative after [`Trapezoidal::integrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSlot(usize);

/// Mandatory stop times, kept sorted and deduplicated to `min_break`
/// resolution.
#[derive(Debug, Clone)]
struct Breakpoints {
    times: Vec<f64>,
    min_break: f64,
}

impl Breakpoints {
    fn new(min_break: f64) -> Self {
        Self {
            times: Vec::new(),
            min_break,
        }
    }

    fn add(&mut self, time: f64) {
        if self
            .times
            .iter()
            .any(|&t| (t - time).abs() <= self.min_break)
        {
            return;
        }
        let position = self.times.partition_point(|&t| t < time);
        self.times.insert(position, time);
    }

    fn first(&self) -> Option<f64> {
        self.times.first().copied()
    }

    /// Drop every breakpoint at or before `time`; returns whether any was
    /// reached.
    fn clear_reached(&mut self, time: f64) -> bool {
        let reached = self
            .times
            .iter()
            .take_while(|&&t| t <= time + self.min_break)
            .count();
        self.times.drain(..reached);
        reached > 0
    }
}

/// Trapezoidal-family integration method.
///
/// Runs at order 1 (backward Euler) or order 2 (trapezoidal) with a
/// variable timestep. Histories of accepted solutions, state pairs, and
/// step sizes are only advanced by [`accept`]; a rejected time point can
/// therefore be retried with a smaller step without corrupting history.
///
/// [`accept`]: Trapezoidal::accept
#[derive(Debug, Clone)]
pub struct Trapezoidal {
    order: usize,
    delta: f64,
    old_delta: f64,
    /// Step size history; entry 0 is the step currently being probed.
    delta_old: [f64; MAX_ORDER + 1],
    /// Integration coefficients for the current order and step.
    ag: [f64; 2],
    time: f64,
    base_time: f64,
    max_step: f64,
    /// Accepted solutions, most recent first.
    solutions: Vec<Vec<f64>>,
    prediction: Vec<f64>,
    /// Interleaved (value, derivative) state pairs; `[0]` is the working
    /// set, `[1]` the last accepted one.
    states: [Vec<f64>; 2],
    breakpoints: Breakpoints,
}

impl Trapezoidal {
    pub fn new(max_step: f64) -> Self {
        Self {
            order: 1,
            delta: 0.0,
            old_delta: 0.0,
            delta_old: [max_step; MAX_ORDER + 1],
            ag: [0.0; 2],
            time: 0.0,
            base_time: 0.0,
            max_step,
            solutions: Vec::new(),
            prediction: Vec::new(),
            states: [Vec::new(), Vec::new()],
            breakpoints: Breakpoints::new(5e-5 * max_step),
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Time of the last accepted point.
    pub fn base_time(&self) -> f64 {
        self.base_time
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Step size before the most recent [`set_delta`].
    ///
    /// [`set_delta`]: Trapezoidal::set_delta
    pub fn old_delta(&self) -> f64 {
        self.old_delta
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    pub fn set_delta(&mut self, delta: f64) {
        self.old_delta = self.delta;
        self.delta = delta;
    }

    pub fn add_breakpoint(&mut self, time: f64) {
        self.breakpoints.add(time);
    }

    /// Allocate a (value, derivative) integration state slot.
    pub fn allocate_state(&mut self) -> StateSlot {
        let slot = StateSlot(self.states[0].len() / 2);
        for history in &mut self.states {
            history.push(0.0);
            history.push(0.0);
        }
        slot
    }

    /// Seed the histories with the operating-point solution; every past
    /// point is assumed identical (circuit at rest).
    pub fn initialize(&mut self, solution: &[f64]) {
        self.solutions.clear();
        for _ in 0..=MAX_ORDER {
            self.solutions.push(solution.to_vec());
        }
        self.prediction = vec![0.0; solution.len()];
        self.delta_old = [self.max_step; MAX_ORDER + 1];
        self.order = 1;
        self.time = 0.0;
        self.base_time = 0.0;
    }

    pub fn state(&self, slot: StateSlot) -> f64 {
        self.states[0][2 * slot.0]
    }

    pub fn set_state(&mut self, slot: StateSlot, value: f64) {
        self.states[0][2 * slot.0] = value;
    }

    pub fn derivative(&self, slot: StateSlot) -> f64 {
        self.states[0][2 * slot.0 + 1]
    }

    /// Set a slot's DC value across all history, with zero derivative.
    pub fn init_state(&mut self, slot: StateSlot, value: f64) {
        for history in &mut self.states {
            history[2 * slot.0] = value;
            history[2 * slot.0 + 1] = 0.0;
        }
    }

    /// Derive the integration coefficients for the current order and step.
    pub fn compute_coefficients(&mut self) {
        self.ag = match self.order {
            1 => [1.0 / self.delta, -1.0 / self.delta],
            _ => [2.0 / self.delta, -2.0 / self.delta],
        };
    }

    /// Differentiate a slot's current value with the active coefficients.
    ///
    /// Order 1 is the backward Euler recurrence; order 2 carries the
    /// previous derivative (trapezoidal rule).
    pub fn integrate(&mut self, slot: StateSlot) {
        let i = 2 * slot.0;
        let value = self.states[0][i];
        let old_value = self.states[1][i];
        let old_derivative = self.states[1][i + 1];
        let derivative = match self.order {
            1 => self.ag[0] * value + self.ag[1] * old_value,
            _ => self.ag[0] * value + self.ag[1] * old_value - old_derivative,
        };
        self.states[0][i + 1] = derivative;
    }

    /// Conductance equivalent of a charge sensitivity `dq/dv`.
    pub fn jacobian(&self, dq_dv: f64) -> f64 {
        self.ag[0] * dq_dv
    }

    /// Equivalent current source for a charge-storage element: the part of
    /// the derivative not already covered by `geq * v`.
    pub fn rhs_current(&self, slot: StateSlot, geq: f64, v: f64) -> f64 {
        self.derivative(slot) - geq * v
    }

    /// Extrapolate the next solution through the accepted history by
    /// Newton divided differences.
    pub fn predict(&mut self) {
        let d1 = self.delta_old[1];
        let d2 = self.delta_old[2];
        for i in 0..self.prediction.len() {
            let s0 = self.solutions[0][i];
            let s1 = self.solutions[1][i];
            let s2 = self.solutions[2][i];
            let dd1 = (s0 - s1) / d1;
            self.prediction[i] = match self.order {
                1 => s0 + self.delta * dd1,
                _ => {
                    let dd2 = (dd1 - (s1 - s2) / d2) / (d1 + d2);
                    s0 + self.delta * dd1 + self.delta * (self.delta + d1) * dd2
                }
            };
        }
    }

    pub fn prediction(&self) -> &[f64] {
        &self.prediction
    }

    /// Probe a new time point at the current step size.
    ///
    /// The step is clipped to `max_step` and to the next breakpoint; when
    /// clipped to a breakpoint, the new time is the breakpoint exactly.
    pub fn probe(&mut self) {
        let mut delta = self.delta.min(self.max_step);
        let mut time = self.base_time + delta;
        if let Some(breakpoint) = self.breakpoints.first() {
            if breakpoint > self.base_time && time + self.breakpoints.min_break >= breakpoint {
                delta = breakpoint - self.base_time;
                time = breakpoint;
            }
        }
        self.delta = delta;
        self.delta_old[0] = delta;
        self.time = time;
    }

    /// Retry the current time point without advancing history.
    pub fn rollback(&mut self) {
        self.time = self.base_time;
    }

    /// Drop to backward Euler after a convergence failure.
    pub fn cut_order(&mut self) {
        self.order = 1;
    }

    /// Check the converged solution against the prediction.
    ///
    /// Returns `true` when the local truncation error is within
    /// `reltol * max(|x|, |pred|) + abstol` for every unknown; the step
    /// size for the next attempt shrinks strictly on rejection and may
    /// grow (at most doubling) on acceptance.
    pub fn lte_control(&mut self, solution: &[f64], reltol: f64, abstol: f64) -> bool {
        let mut worst = 0.0_f64;
        for i in 1..solution.len() {
            let tolerance = reltol * solution[i].abs().max(self.prediction[i].abs()) + abstol;
            worst = worst.max((solution[i] - self.prediction[i]).abs() / tolerance);
        }
        let exponent = 1.0 / (self.order + 1) as f64;
        let factor = 0.9 * (1.0 / worst.max(1e-12)).powf(exponent);
        if worst > 1.0 {
            self.set_delta(self.delta * factor.clamp(0.1, 0.9));
            false
        } else {
            self.set_delta(self.delta * factor.clamp(1.0, 2.0));
            true
        }
    }

    /// Accept the probed time point: rotate solution, state, and step
    /// histories, consume reached breakpoints, adjust the order.
    pub fn accept(&mut self, solution: &[f64]) {
        self.solutions.rotate_right(1);
        self.solutions[0].clear();
        self.solutions[0].extend_from_slice(solution);

        let (current, previous) = self.states.split_at_mut(1);
        previous[0].copy_from_slice(&current[0]);

        for i in (1..self.delta_old.len()).rev() {
            self.delta_old[i] = self.delta_old[i - 1];
        }
        self.base_time = self.time;

        if self.breakpoints.clear_reached(self.time) {
            // Discontinuity: trapezoidal would ring, restart at order 1.
            self.order = 1;
        } else {
            self.order = (self.order + 1).min(MAX_ORDER);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method_with_history(solution: &[f64]) -> Trapezoidal {
        let mut method = Trapezoidal::new(1e-3);
        method.initialize(solution);
        method
    }

    #[test]
    fn test_backward_euler_derivative() {
        let mut method = method_with_history(&[0.0, 1.0]);
        let slot = method.allocate_state();
        method.init_state(slot, 2.0);
        method.set_delta(1e-6);
        method.probe();
        method.compute_coefficients();

        method.set_state(slot, 3.0);
        method.integrate(slot);
        // d/dt = (3 - 2) / 1e-6
        assert!((method.derivative(slot) - 1e6).abs() < 1.0);
        assert!((method.jacobian(1e-9) - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_trapezoidal_derivative_carries_history() {
        let mut method = method_with_history(&[0.0, 1.0]);
        let slot = method.allocate_state();
        method.init_state(slot, 0.0);
        method.set_delta(1e-6);
        method.probe();
        method.compute_coefficients();

        // First step at order 1: value ramps to 1e-6 => derivative 1.0
        method.set_state(slot, 1e-6);
        method.integrate(slot);
        assert!((method.derivative(slot) - 1.0).abs() < 1e-9);
        method.accept(&[0.0, 1.0]);
        assert_eq!(method.order(), 2);

        // Second step at order 2 on the same ramp keeps derivative 1.0:
        // d = (2/h)(v - v_old) - d_old = 2 - 1
        method.probe();
        method.compute_coefficients();
        method.set_state(slot, 2e-6);
        method.integrate(slot);
        assert!((method.derivative(slot) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_is_exact_for_linear_history() {
        let mut method = Trapezoidal::new(1.0);
        method.initialize(&[0.0, 0.0]);
        method.set_delta(0.5);
        method.probe();
        method.accept(&[0.0, 1.0]);
        method.set_delta(0.5);
        method.probe();
        method.accept(&[0.0, 2.0]);

        method.set_delta(0.5);
        method.probe();
        method.compute_coefficients();
        method.predict();
        // Linear ramp: 0, 1, 2 at equal spacing predicts 3.
        assert!(
            (method.prediction()[1] - 3.0).abs() < 1e-12,
            "prediction = {}",
            method.prediction()[1]
        );
    }

    #[test]
    fn test_lte_rejection_strictly_shrinks_delta() {
        let mut method = method_with_history(&[0.0, 0.0]);
        method.set_delta(1e-6);
        method.probe();
        method.compute_coefficients();
        method.predict();

        let rejected = method.lte_control(&[0.0, 1.0], 1e-3, 1e-6);
        assert!(!rejected, "large error must reject the step");
        assert!(
            method.delta() < 1e-6,
            "delta must shrink, got {}",
            method.delta()
        );
    }

    #[test]
    fn test_lte_acceptance_can_grow_delta() {
        let mut method = method_with_history(&[0.0, 1.0]);
        method.set_delta(1e-6);
        method.probe();
        method.compute_coefficients();
        method.predict();

        // Prediction matches the flat history exactly.
        let accepted = method.lte_control(&[0.0, 1.0], 1e-3, 1e-6);
        assert!(accepted);
        assert!(method.delta() >= 1e-6);
        assert!(method.delta() <= 2e-6, "growth is bounded");
    }

    #[test]
    fn test_probe_lands_exactly_on_breakpoint() {
        let mut method = method_with_history(&[0.0, 0.0]);
        method.add_breakpoint(1e-6);
        method.set_delta(0.9e-6);
        method.probe();
        method.accept(&[0.0, 0.0]);
        assert_eq!(method.order(), 2, "plain step raises the order");

        // Next step would overshoot the breakpoint; it must land on it.
        method.set_delta(0.9e-6);
        method.probe();
        assert_eq!(method.time(), 1e-6, "must land exactly on breakpoint");

        method.accept(&[0.0, 0.0]);
        assert_eq!(method.order(), 1, "breakpoint resets the order");
    }

    #[test]
    fn test_rollback_returns_to_base_time() {
        let mut method = method_with_history(&[0.0, 0.0]);
        method.set_delta(1e-6);
        method.probe();
        method.accept(&[0.0, 0.0]);
        let base = method.base_time();

        method.set_delta(1e-6);
        method.probe();
        assert!(method.time() > base);
        method.rollback();
        assert_eq!(method.time(), base);
    }
}
