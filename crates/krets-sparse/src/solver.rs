//! Sparse LU solver with Markowitz reordering.

use num_complex::Complex;

use crate::element::ElementId;
use crate::error::{Error, Result};
use crate::markowitz::Markowitz;
use crate::matrix::SparseMatrix;
use crate::scalar::Scalar;
use crate::translation::Translation;

/// LU solver over a linked-grid sparse matrix.
///
/// Callers address rows and columns by their fixed external indices; the
/// solver maintains row and column [`Translation`]s so that pivoting is
/// invisible to the stamping code. The right-hand side is stored densely in
/// external order and is never permuted.
///
/// The factorization overwrites the matrix in place: the diagonal holds the
/// reciprocal of each pivot, rows of U are scaled to a unit diagonal, and
/// fill-ins created during elimination stay in the structure so later
/// factorizations of the same pattern can use the cheap [`factor`] path.
///
/// [`factor`]: LuSolver::factor
pub struct LuSolver<T> {
    matrix: SparseMatrix<T>,
    rhs: Vec<T>,
    row: Translation,
    column: Translation,
    /// Pivot strategy, including the pivot magnitude thresholds.
    pub strategy: Markowitz,
    needs_reordering: bool,
    is_factored: bool,
    fillins: usize,
    intermediate: Vec<T>,
    dest: Vec<Option<ElementId>>,
}

/// Solver over real values.
pub type RealSolver = LuSolver<f64>;

/// Solver over complex values, for small-signal analyses.
pub type ComplexSolver = LuSolver<Complex<f64>>;

impl<T: Scalar> LuSolver<T> {
    pub fn new() -> Self {
        Self {
            matrix: SparseMatrix::new(),
            rhs: vec![T::zero()],
            row: Translation::new(0),
            column: Translation::new(0),
            strategy: Markowitz::new(),
            needs_reordering: true,
            is_factored: false,
            fillins: 0,
            intermediate: Vec::new(),
            dest: Vec::new(),
        }
    }

    /// Current dimension of the system.
    pub fn size(&self) -> usize {
        self.matrix.size().max(self.rhs.len().saturating_sub(1))
    }

    pub fn is_factored(&self) -> bool {
        self.is_factored
    }

    /// Number of fill-ins created by elimination so far.
    pub fn fillins(&self) -> usize {
        self.fillins
    }

    pub fn needs_reordering(&self) -> bool {
        self.needs_reordering
    }

    /// Request (or cancel) a full reordering on the next [`order_and_factor`].
    ///
    /// [`order_and_factor`]: LuSolver::order_and_factor
    pub fn set_needs_reordering(&mut self, value: bool) {
        self.needs_reordering = value;
    }

    /// Find or create the element at an external `(row, col)` position.
    ///
    /// The returned handle stays valid across reordering.
    pub fn get_element(&mut self, row: usize, col: usize) -> ElementId {
        let int_row = self.row.index(row);
        let int_col = self.column.index(col);
        self.matrix.get(int_row, int_col)
    }

    /// Find an existing element at an external `(row, col)` position.
    pub fn find_element(&self, row: usize, col: usize) -> Option<ElementId> {
        self.matrix.find(self.row.index(row), self.column.index(col))
    }

    pub fn value(&self, id: ElementId) -> T {
        self.matrix.value(id)
    }

    pub fn value_mut(&mut self, id: ElementId) -> &mut T {
        self.matrix.value_mut(id)
    }

    /// Accumulate into a matrix element.
    pub fn add(&mut self, id: ElementId, value: T) {
        self.matrix.add(id, value);
    }

    pub fn rhs(&self, index: usize) -> T {
        if index < self.rhs.len() {
            self.rhs[index]
        } else {
            T::zero()
        }
    }

    pub fn rhs_mut(&mut self, index: usize) -> &mut T {
        if index >= self.rhs.len() {
            self.rhs.resize(index + 1, T::zero());
        }
        &mut self.rhs[index]
    }

    /// Accumulate into the right-hand side. Index 0 is the ground reference
    /// and is absorbed like a matrix write to row 0.
    pub fn add_rhs(&mut self, index: usize, value: T) {
        if index == 0 {
            return;
        }
        *self.rhs_mut(index) += value;
    }

    /// Zero all matrix and right-hand side values, keeping the structure.
    pub fn clear(&mut self) {
        self.matrix.clear();
        for value in &mut self.rhs {
            *value = T::zero();
        }
        self.is_factored = false;
    }

    fn prepare_scratch(&mut self) {
        let len = self.matrix.size() + 1;
        if self.intermediate.len() != len {
            self.intermediate.resize(len, T::zero());
            self.dest.clear();
            self.dest.resize(len, None);
        }
    }

    /// Factor the matrix reusing the existing pivot order.
    ///
    /// This is a left-looking pass that assumes the structure already holds
    /// every fill-in of the current ordering. Returns `false` when a pivot
    /// is exactly zero or an expected element is missing; the caller should
    /// fall back to [`order_and_factor`].
    ///
    /// [`order_and_factor`]: LuSolver::order_and_factor
    pub fn factor(&mut self) -> bool {
        let size = self.matrix.size();
        self.prepare_scratch();

        let Some(diag) = self.matrix.diagonal(1) else {
            self.is_factored = false;
            return false;
        };
        if self.matrix.value(diag) == T::zero() {
            self.is_factored = false;
            return false;
        }
        let recip = self.matrix.value(diag).recip();
        *self.matrix.value_mut(diag) = recip;

        for step in 2..=size {
            // Scatter the column so updates can index by row.
            let mut cursor = self.matrix.first_in_col(step);
            while let Some(id) = cursor {
                self.dest[self.matrix.row_of(id)] = Some(id);
                cursor = self.matrix.below(id);
            }

            // Update the column with every finished column to its left.
            let mut ok = true;
            let mut column = self.matrix.first_in_col(step);
            'update: while let Some(cid) = column {
                let row = self.matrix.row_of(cid);
                if row >= step {
                    break;
                }
                let Some(pivot) = self.matrix.diagonal(row) else {
                    ok = false;
                    break;
                };
                let mult = self.matrix.value(cid) * self.matrix.value(pivot);
                *self.matrix.value_mut(cid) = mult;
                let mut lower = self.matrix.below(pivot);
                while let Some(lid) = lower {
                    let Some(target) = self.dest[self.matrix.row_of(lid)] else {
                        ok = false;
                        break 'update;
                    };
                    let delta = mult * self.matrix.value(lid);
                    *self.matrix.value_mut(target) -= delta;
                    lower = self.matrix.below(lid);
                }
                column = self.matrix.below(cid);
            }

            // Reset the scatter entries touched by this step.
            let mut cursor = self.matrix.first_in_col(step);
            while let Some(id) = cursor {
                self.dest[self.matrix.row_of(id)] = None;
                cursor = self.matrix.below(id);
            }

            if !ok {
                self.is_factored = false;
                return false;
            }
            let Some(diag) = self.matrix.diagonal(step) else {
                self.is_factored = false;
                return false;
            };
            if self.matrix.value(diag) == T::zero() {
                self.is_factored = false;
                return false;
            }
            let recip = self.matrix.value(diag).recip();
            *self.matrix.value_mut(diag) = recip;
        }

        self.is_factored = true;
        true
    }

    /// Factor the matrix, reordering pivots where needed.
    ///
    /// When no reordering was requested the existing pivot order is reused
    /// as long as every diagonal passes the pivot thresholds; reordering
    /// resumes from the first step that fails. Returns a
    /// [`Error::SingularMatrix`] naming the external position of the step
    /// at which no acceptable pivot exists.
    pub fn order_and_factor(&mut self) -> Result<()> {
        let size = self.matrix.size();
        self.prepare_scratch();

        let mut step = 1;
        if !self.needs_reordering {
            while step <= size {
                match self.matrix.diagonal(step) {
                    Some(pivot) if self.strategy.is_valid_pivot(&self.matrix, step) => {
                        self.eliminate(pivot, false);
                    }
                    _ => {
                        self.needs_reordering = true;
                        break;
                    }
                }
                step += 1;
            }
            if !self.needs_reordering {
                self.is_factored = true;
                return Ok(());
            }
        }

        self.strategy.setup(&self.matrix, step);
        while step <= size {
            let Some(pivot) = self.strategy.find_pivot(&self.matrix, step) else {
                self.is_factored = false;
                return Err(Error::SingularMatrix {
                    row: self.row.reverse(step),
                    col: self.column.reverse(step),
                });
            };
            self.move_pivot(pivot, step);
            self.eliminate(pivot, true);
            step += 1;
        }

        self.needs_reordering = false;
        self.is_factored = true;
        Ok(())
    }

    /// Move a chosen pivot to `(step, step)`, updating the translations.
    fn move_pivot(&mut self, pivot: ElementId, step: usize) {
        let row = self.matrix.row_of(pivot);
        let col = self.matrix.col_of(pivot);
        self.strategy.move_pivot(row, col, step);
        if row != step {
            self.matrix.swap_rows(row, step);
            self.row.swap(row, step);
        }
        if col != step {
            self.matrix.swap_columns(col, step);
            self.column.swap(col, step);
        }
        self.strategy.update(&self.matrix, pivot);
    }

    /// Right-looking elimination of one pivot, creating fill-ins on demand.
    fn eliminate(&mut self, pivot: ElementId, reordering: bool) {
        let recip = self.matrix.value(pivot).recip();
        *self.matrix.value_mut(pivot) = recip;

        let mut upper = self.matrix.right(pivot);
        while let Some(uid) = upper {
            let scaled = self.matrix.value(uid) * recip;
            *self.matrix.value_mut(uid) = scaled;

            let mut sub = self.matrix.below(uid);
            let mut lower = self.matrix.below(pivot);
            while let Some(lid) = lower {
                let row = self.matrix.row_of(lid);

                // Advance to the element lined up with the lower one.
                while let Some(s) = sub {
                    if self.matrix.row_of(s) < row {
                        sub = self.matrix.below(s);
                    } else {
                        break;
                    }
                }
                let target = match sub {
                    Some(s) if self.matrix.row_of(s) == row => s,
                    _ => {
                        let col = self.matrix.col_of(uid);
                        let fill = self.matrix.get(row, col);
                        self.fillins += 1;
                        if reordering {
                            self.strategy.create_fillin(row, col);
                        }
                        fill
                    }
                };
                let delta = scaled * self.matrix.value(lid);
                *self.matrix.value_mut(target) -= delta;
                sub = self.matrix.below(target);
                lower = self.matrix.below(lid);
            }
            upper = self.matrix.right(uid);
        }
    }

    /// Solve `A x = b` for the stamped right-hand side.
    ///
    /// `solution` is indexed by external position and must hold at least
    /// `size() + 1` entries; entry 0 is the ground reference and is reset
    /// to zero.
    pub fn solve(&mut self, solution: &mut [T]) -> Result<()> {
        if !self.is_factored {
            return Err(Error::NotFactored);
        }
        let size = self.matrix.size();
        self.prepare_scratch();
        self.rhs.resize(size + 1, T::zero());
        self.row.scramble(&self.rhs, &mut self.intermediate);

        // Forward substitution; zero entries contribute nothing.
        for i in 1..=size {
            let mut temp = self.intermediate[i];
            if temp != T::zero() {
                if let Some(pivot) = self.matrix.diagonal(i) {
                    temp *= self.matrix.value(pivot);
                    self.intermediate[i] = temp;
                    let mut cursor = self.matrix.below(pivot);
                    while let Some(id) = cursor {
                        let delta = temp * self.matrix.value(id);
                        self.intermediate[self.matrix.row_of(id)] -= delta;
                        cursor = self.matrix.below(id);
                    }
                }
            }
        }

        // Backward substitution over the unit-diagonal upper factor.
        for i in (1..=size).rev() {
            let mut temp = self.intermediate[i];
            if let Some(pivot) = self.matrix.diagonal(i) {
                let mut cursor = self.matrix.right(pivot);
                while let Some(id) = cursor {
                    let delta = self.matrix.value(id) * self.intermediate[self.matrix.col_of(id)];
                    temp -= delta;
                    cursor = self.matrix.right(id);
                }
            }
            self.intermediate[i] = temp;
        }

        self.column.unscramble(&self.intermediate, solution);
        solution[0] = T::zero();
        Ok(())
    }

    /// Solve the transposed system `Aᵀ x = b`.
    pub fn solve_transposed(&mut self, solution: &mut [T]) -> Result<()> {
        if !self.is_factored {
            return Err(Error::NotFactored);
        }
        let size = self.matrix.size();
        self.prepare_scratch();
        self.rhs.resize(size + 1, T::zero());
        self.column.scramble(&self.rhs, &mut self.intermediate);

        // Forward elimination over the transposed upper factor.
        for i in 1..=size {
            let temp = self.intermediate[i];
            if temp != T::zero() {
                if let Some(pivot) = self.matrix.diagonal(i) {
                    let mut cursor = self.matrix.right(pivot);
                    while let Some(id) = cursor {
                        let delta = temp * self.matrix.value(id);
                        self.intermediate[self.matrix.col_of(id)] -= delta;
                        cursor = self.matrix.right(id);
                    }
                }
            }
        }

        // Backward substitution over the transposed lower factor.
        for i in (1..=size).rev() {
            let mut temp = self.intermediate[i];
            if let Some(pivot) = self.matrix.diagonal(i) {
                let mut cursor = self.matrix.below(pivot);
                while let Some(id) = cursor {
                    let delta = self.intermediate[self.matrix.row_of(id)] * self.matrix.value(id);
                    temp -= delta;
                    cursor = self.matrix.below(id);
                }
                temp *= self.matrix.value(pivot);
            }
            self.intermediate[i] = temp;
        }

        self.row.unscramble(&self.intermediate, solution);
        solution[0] = T::zero();
        Ok(())
    }
}

impl<T: Scalar> Default for LuSolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(solver: &mut RealSolver, row: usize, col: usize, value: f64) {
        let id = solver.get_element(row, col);
        solver.add(id, value);
    }

    #[test]
    fn test_solve_2x2() {
        // [4 1; 2 3] x = [9; 13] -> x = [2; 1]... actually [14/10? ]
        let mut solver = RealSolver::new();
        stamp(&mut solver, 1, 1, 4.0);
        stamp(&mut solver, 1, 2, 1.0);
        stamp(&mut solver, 2, 1, 2.0);
        stamp(&mut solver, 2, 2, 3.0);
        solver.add_rhs(1, 9.0);
        solver.add_rhs(2, 13.0);

        solver.order_and_factor().unwrap();
        let mut x = vec![0.0; 3];
        solver.solve(&mut x).unwrap();

        assert!((x[1] - 1.4).abs() < 1e-12, "x1 = {}", x[1]);
        assert!((x[2] - 3.4).abs() < 1e-12, "x2 = {}", x[2]);
    }

    #[test]
    fn test_solve_requires_factorization() {
        let mut solver = RealSolver::new();
        stamp(&mut solver, 1, 1, 1.0);
        let mut x = vec![0.0; 2];
        assert_eq!(solver.solve(&mut x), Err(Error::NotFactored));
    }

    #[test]
    fn test_factor_rejects_zero_pivot() {
        let mut solver = RealSolver::new();
        stamp(&mut solver, 1, 1, 0.0);
        stamp(&mut solver, 1, 2, 1.0);
        stamp(&mut solver, 2, 1, 1.0);
        stamp(&mut solver, 2, 2, 1.0);
        assert!(!solver.factor());
        assert!(!solver.is_factored());
    }

    #[test]
    fn test_order_and_factor_reorders_zero_diagonal() {
        let mut solver = RealSolver::new();
        stamp(&mut solver, 1, 2, 1.0);
        stamp(&mut solver, 2, 1, 1.0);
        solver.add_rhs(1, 3.0);
        solver.add_rhs(2, 5.0);

        solver.order_and_factor().unwrap();
        let mut x = vec![0.0; 3];
        solver.solve(&mut x).unwrap();

        // x2 solves row 1, x1 solves row 2
        assert!((x[1] - 5.0).abs() < 1e-12);
        assert!((x[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_is_reported() {
        let mut solver = RealSolver::new();
        stamp(&mut solver, 1, 1, 1.0);
        stamp(&mut solver, 1, 2, 1.0);
        stamp(&mut solver, 2, 1, 1.0);
        stamp(&mut solver, 2, 2, 1.0);
        let result = solver.order_and_factor();
        assert!(matches!(result, Err(Error::SingularMatrix { .. })));
    }

    #[test]
    fn test_solve_transposed_2x2() {
        // A = [4 1; 2 3]; A^T x = [8; 7] -> 4x1 + 2x2 = 8, x1 + 3x2 = 7
        let mut solver = RealSolver::new();
        stamp(&mut solver, 1, 1, 4.0);
        stamp(&mut solver, 1, 2, 1.0);
        stamp(&mut solver, 2, 1, 2.0);
        stamp(&mut solver, 2, 2, 3.0);
        solver.add_rhs(1, 8.0);
        solver.add_rhs(2, 7.0);

        solver.order_and_factor().unwrap();
        let mut x = vec![0.0; 3];
        solver.solve_transposed(&mut x).unwrap();

        assert!((x[1] - 1.0).abs() < 1e-12, "x1 = {}", x[1]);
        assert!((x[2] - 2.0).abs() < 1e-12, "x2 = {}", x[2]);
    }

    #[test]
    fn test_refactor_after_restamp_uses_fast_path() {
        let mut solver = RealSolver::new();
        stamp(&mut solver, 1, 1, 2.0);
        stamp(&mut solver, 1, 2, 1.0);
        stamp(&mut solver, 2, 1, 1.0);
        stamp(&mut solver, 2, 2, 2.0);
        solver.order_and_factor().unwrap();

        // Restamp the same pattern with different values.
        solver.clear();
        stamp(&mut solver, 1, 1, 3.0);
        stamp(&mut solver, 1, 2, 1.0);
        stamp(&mut solver, 2, 1, 1.0);
        stamp(&mut solver, 2, 2, 3.0);
        solver.add_rhs(1, 4.0);
        solver.add_rhs(2, 4.0);

        assert!(solver.factor(), "same pattern must refactor in place");
        let mut x = vec![0.0; 3];
        solver.solve(&mut x).unwrap();
        assert!((x[1] - 1.0).abs() < 1e-12);
        assert!((x[2] - 1.0).abs() < 1e-12);
    }
}
