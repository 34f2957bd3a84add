//! Markowitz pivot selection for sparse LU factorization.

use crate::element::ElementId;
use crate::matrix::SparseMatrix;
use crate::scalar::Scalar;

/// Pivot strategy that minimizes expected fill-in using Markowitz counts.
///
/// For each row and column of the active submatrix the strategy tracks the
/// number of stored elements. The Markowitz product of a candidate at
/// `(r, c)` is `(row_count(r) - 1) * (col_count(c) - 1)`, an upper bound on
/// the fill-ins its elimination can create. Candidates must also be
/// numerically acceptable: at least `relative_threshold` times the largest
/// magnitude in their submatrix column, and strictly larger than
/// `absolute_threshold`.
#[derive(Debug, Clone)]
pub struct Markowitz {
    row_count: Vec<usize>,
    col_count: Vec<usize>,
    /// Minimum acceptable pivot magnitude relative to the largest entry in
    /// its column.
    pub relative_threshold: f64,
    /// Absolute lower bound on pivot magnitude.
    pub absolute_threshold: f64,
}

impl Markowitz {
    pub fn new() -> Self {
        Self {
            row_count: Vec::new(),
            col_count: Vec::new(),
            relative_threshold: 1e-3,
            absolute_threshold: 0.0,
        }
    }

    /// Count submatrix elements per row and column, starting at `step`.
    pub fn setup<T: Scalar>(&mut self, matrix: &SparseMatrix<T>, step: usize) {
        let size = matrix.size();
        self.row_count.clear();
        self.row_count.resize(size + 1, 0);
        self.col_count.clear();
        self.col_count.resize(size + 1, 0);
        for index in step..=size {
            let mut cursor = matrix.first_in_row(index);
            while let Some(id) = cursor {
                if matrix.col_of(id) >= step {
                    self.row_count[index] += 1;
                }
                cursor = matrix.right(id);
            }
            let mut cursor = matrix.first_in_col(index);
            while let Some(id) = cursor {
                if matrix.row_of(id) >= step {
                    self.col_count[index] += 1;
                }
                cursor = matrix.below(id);
            }
        }
    }

    fn product(&self, row: usize, col: usize) -> usize {
        self.row_count[row].saturating_sub(1) * self.col_count[col].saturating_sub(1)
    }

    fn largest_below<T: Scalar>(&self, matrix: &SparseMatrix<T>, id: ElementId) -> f64 {
        let mut largest = 0.0_f64;
        let mut cursor = matrix.below(id);
        while let Some(below) = cursor {
            largest = largest.max(matrix.value(below).magnitude());
            cursor = matrix.below(below);
        }
        largest
    }

    /// Check whether the current diagonal element can serve as the pivot
    /// for `step` without reordering.
    pub fn is_valid_pivot<T: Scalar>(&self, matrix: &SparseMatrix<T>, step: usize) -> bool {
        let Some(diag) = matrix.diagonal(step) else {
            return false;
        };
        let magnitude = matrix.value(diag).magnitude();
        if magnitude <= self.absolute_threshold {
            return false;
        }
        magnitude >= self.relative_threshold * self.largest_below(matrix, diag)
    }

    /// Search the active submatrix for the best pivot for `step`.
    ///
    /// Diagonal candidates are preferred; the full submatrix is searched
    /// only when no diagonal element is acceptable. Returns `None` when the
    /// submatrix has no element above the absolute threshold, which means
    /// the matrix is singular at this step.
    pub fn find_pivot<T: Scalar>(
        &self,
        matrix: &SparseMatrix<T>,
        step: usize,
    ) -> Option<ElementId> {
        self.search_diagonal(matrix, step)
            .or_else(|| self.search_submatrix(matrix, step))
    }

    fn search_diagonal<T: Scalar>(
        &self,
        matrix: &SparseMatrix<T>,
        step: usize,
    ) -> Option<ElementId> {
        let size = matrix.size();
        let mut best: Option<(usize, f64, ElementId)> = None;
        for index in step..=size {
            let Some(diag) = matrix.diagonal(index) else {
                continue;
            };
            let magnitude = matrix.value(diag).magnitude();
            if magnitude <= self.absolute_threshold {
                continue;
            }
            if magnitude < self.relative_threshold * self.largest_below(matrix, diag) {
                continue;
            }
            let product = self.product(index, index);
            let better = match best {
                None => true,
                Some((p, m, _)) => product < p || (product == p && magnitude > m),
            };
            if better {
                best = Some((product, magnitude, diag));
            }
        }
        best.map(|(_, _, id)| id)
    }

    fn search_submatrix<T: Scalar>(
        &self,
        matrix: &SparseMatrix<T>,
        step: usize,
    ) -> Option<ElementId> {
        let size = matrix.size();
        let mut best: Option<(usize, f64, ElementId)> = None;
        let mut largest_overall: Option<(f64, ElementId)> = None;
        for col in step..=size {
            // largest magnitude in the submatrix part of this column
            let mut largest = 0.0_f64;
            let mut cursor = matrix.first_in_col(col);
            while let Some(id) = cursor {
                if matrix.row_of(id) >= step {
                    largest = largest.max(matrix.value(id).magnitude());
                }
                cursor = matrix.below(id);
            }
            if largest <= self.absolute_threshold {
                continue;
            }
            let mut cursor = matrix.first_in_col(col);
            while let Some(id) = cursor {
                let row = matrix.row_of(id);
                if row >= step {
                    let magnitude = matrix.value(id).magnitude();
                    if magnitude > self.absolute_threshold {
                        if largest_overall.is_none_or(|(m, _)| magnitude > m) {
                            largest_overall = Some((magnitude, id));
                        }
                        if magnitude >= self.relative_threshold * largest {
                            let product = self.product(row, col);
                            let better = match best {
                                None => true,
                                Some((p, m, _)) => {
                                    product < p || (product == p && magnitude > m)
                                }
                            };
                            if better {
                                best = Some((product, magnitude, id));
                            }
                        }
                    }
                }
                cursor = matrix.below(id);
            }
        }
        best.map(|(_, _, id)| id)
            .or(largest_overall.map(|(_, id)| id))
    }

    /// Swap the bookkeeping for a pivot that is about to be moved to the
    /// diagonal position of `step`. The caller performs the actual matrix
    /// and translation swaps.
    pub fn move_pivot(&mut self, row: usize, col: usize, step: usize) {
        self.row_count.swap(row, step);
        self.col_count.swap(col, step);
    }

    /// Remove the pivot row and column from the active submatrix counts.
    pub fn update<T: Scalar>(&mut self, matrix: &SparseMatrix<T>, pivot: ElementId) {
        let mut cursor = matrix.right(pivot);
        while let Some(id) = cursor {
            self.col_count[matrix.col_of(id)] -= 1;
            cursor = matrix.right(id);
        }
        let mut cursor = matrix.below(pivot);
        while let Some(id) = cursor {
            self.row_count[matrix.row_of(id)] -= 1;
            cursor = matrix.below(id);
        }
    }

    /// Account for a fill-in created during elimination.
    pub fn create_fillin(&mut self, row: usize, col: usize) {
        self.row_count[row] += 1;
        self.col_count[col] += 1;
    }
}

impl Default for Markowitz {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_from(entries: &[(usize, usize, f64)]) -> SparseMatrix<f64> {
        let mut m = SparseMatrix::new();
        for &(row, col, value) in entries {
            let id = m.get(row, col);
            *m.value_mut(id) = value;
        }
        m
    }

    #[test]
    fn test_setup_counts_submatrix_only() {
        let m = matrix_from(&[
            (1, 1, 1.0),
            (1, 2, 1.0),
            (2, 1, 1.0),
            (2, 2, 1.0),
            (3, 3, 1.0),
        ]);
        let mut strategy = Markowitz::new();
        strategy.setup(&m, 2);
        // row/col 1 are outside the submatrix
        assert_eq!(strategy.row_count[2], 1);
        assert_eq!(strategy.col_count[2], 1);
        assert_eq!(strategy.row_count[3], 1);
    }

    #[test]
    fn test_find_pivot_prefers_low_product_diagonal() {
        // diagonal (3,3) touches nothing else; (1,1) has a dense row
        let m = matrix_from(&[
            (1, 1, 1.0),
            (1, 2, 1.0),
            (1, 3, 1.0),
            (2, 1, 1.0),
            (2, 2, 1.0),
            (3, 3, 1.0),
        ]);
        let mut strategy = Markowitz::new();
        strategy.setup(&m, 1);
        let pivot = strategy.find_pivot(&m, 1).unwrap();
        assert_eq!((m.row_of(pivot), m.col_of(pivot)), (3, 3));
    }

    #[test]
    fn test_find_pivot_falls_back_to_off_diagonal() {
        // all diagonal entries absent or zero
        let m = matrix_from(&[(1, 2, 2.0), (2, 1, 3.0), (2, 2, 0.0)]);
        let mut strategy = Markowitz::new();
        strategy.setup(&m, 1);
        let pivot = strategy.find_pivot(&m, 1).unwrap();
        assert!(m.value(pivot).magnitude() > 0.0, "pivot must be nonzero");
    }

    #[test]
    fn test_find_pivot_reports_singular_submatrix() {
        let m = matrix_from(&[(1, 1, 0.0), (2, 2, 0.0)]);
        let mut strategy = Markowitz::new();
        strategy.setup(&m, 1);
        assert!(strategy.find_pivot(&m, 1).is_none());
    }

    #[test]
    fn test_is_valid_pivot_rejects_tiny_diagonal() {
        let m = matrix_from(&[(1, 1, 1e-9), (2, 1, 1.0), (2, 2, 1.0)]);
        let strategy = Markowitz::new();
        assert!(!strategy.is_valid_pivot(&m, 1));
        assert!(strategy.is_valid_pivot(&m, 2));
    }

    #[test]
    fn test_update_and_fillin_bookkeeping() {
        let m = matrix_from(&[
            (1, 1, 1.0),
            (1, 2, 1.0),
            (2, 1, 1.0),
            (2, 2, 1.0),
        ]);
        let mut strategy = Markowitz::new();
        strategy.setup(&m, 1);
        assert_eq!(strategy.row_count[2], 2);
        let pivot = m.diagonal(1).unwrap();
        strategy.update(&m, pivot);
        assert_eq!(strategy.row_count[2], 1);
        assert_eq!(strategy.col_count[2], 1);
        strategy.create_fillin(2, 2);
        assert_eq!(strategy.row_count[2], 2);
    }
}
