//! Arena-backed sparse matrix with linked row/column traversal.

use crate::element::{Element, ElementId};
use crate::scalar::Scalar;

/// Sparse matrix stored as a doubly-linked grid of elements inside an
/// arena.
///
/// Rows and columns are 1-indexed; row/column 0 is the ground reference and
/// all writes to it are absorbed by a trash element. Elements are created
/// on first access and never removed; fill-ins created during elimination
/// persist across factorizations. Swapping rows or columns only updates
/// link fields, so [`ElementId`] handles held by callers stay valid across
/// any reordering.
#[derive(Debug, Clone)]
pub struct SparseMatrix<T> {
    elements: Vec<Element<T>>,
    first_in_row: Vec<Option<ElementId>>,
    first_in_col: Vec<Option<ElementId>>,
    diagonal: Vec<Option<ElementId>>,
    size: usize,
}

impl<T: Scalar> SparseMatrix<T> {
    pub fn new() -> Self {
        Self {
            elements: vec![Element::new(0, 0, T::zero())],
            first_in_row: vec![None],
            first_in_col: vec![None],
            diagonal: vec![None],
            size: 0,
        }
    }

    /// Current dimension (largest row/column index touched).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored elements, excluding the ground trash element.
    pub fn element_count(&self) -> usize {
        self.elements.len() - 1
    }

    fn ensure_size(&mut self, dimension: usize) {
        if dimension > self.size {
            self.size = dimension;
            self.first_in_row.resize(dimension + 1, None);
            self.first_in_col.resize(dimension + 1, None);
            self.diagonal.resize(dimension + 1, None);
        }
    }

    /// Find an element, or create it (growing the matrix if needed).
    ///
    /// Writes to row or column 0 return the trash element.
    pub fn get(&mut self, row: usize, col: usize) -> ElementId {
        if row == 0 || col == 0 {
            return ElementId::TRASH;
        }
        self.ensure_size(row.max(col));
        if let Some(id) = self.find(row, col) {
            return id;
        }
        let id = ElementId(self.elements.len());
        self.elements.push(Element::new(row, col, T::zero()));
        self.insert_horizontal(id);
        self.insert_vertical(id);
        if row == col {
            self.diagonal[row] = Some(id);
        }
        id
    }

    /// Find an existing element without creating it.
    pub fn find(&self, row: usize, col: usize) -> Option<ElementId> {
        if row == 0 || col == 0 || row > self.size {
            return None;
        }
        let mut cursor = self.first_in_row[row];
        while let Some(id) = cursor {
            let e = &self.elements[id.0];
            if e.col == col {
                return Some(id);
            }
            if e.col > col {
                return None;
            }
            cursor = e.right;
        }
        None
    }

    /// Diagonal element at (index, index), if it exists.
    pub fn diagonal(&self, index: usize) -> Option<ElementId> {
        if index == 0 || index > self.size {
            return None;
        }
        self.diagonal[index]
    }

    pub fn first_in_row(&self, row: usize) -> Option<ElementId> {
        if row == 0 || row > self.size {
            return None;
        }
        self.first_in_row[row]
    }

    pub fn first_in_col(&self, col: usize) -> Option<ElementId> {
        if col == 0 || col > self.size {
            return None;
        }
        self.first_in_col[col]
    }

    pub fn row_of(&self, id: ElementId) -> usize {
        self.elements[id.0].row
    }

    pub fn col_of(&self, id: ElementId) -> usize {
        self.elements[id.0].col
    }

    pub fn right(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].right
    }

    pub fn left(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].left
    }

    pub fn below(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].below
    }

    pub fn above(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].above
    }

    pub fn value(&self, id: ElementId) -> T {
        self.elements[id.0].value
    }

    pub fn value_mut(&mut self, id: ElementId) -> &mut T {
        &mut self.elements[id.0].value
    }

    /// Accumulate into an element.
    pub fn add(&mut self, id: ElementId, value: T) {
        self.elements[id.0].value += value;
    }

    /// Zero all element values, keeping the structure (and fill-ins).
    pub fn clear(&mut self) {
        for e in &mut self.elements {
            e.value = T::zero();
        }
    }

    /// Iterate over `(row, col, value)` of all stored elements.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.elements
            .iter()
            .skip(1)
            .map(|e| (e.row, e.col, e.value))
    }

    /// Swap two rows by relinking the vertical chains.
    ///
    /// Horizontal chains move wholesale with their row; no element records
    /// are moved or reallocated.
    pub fn swap_rows(&mut self, row1: usize, row2: usize) {
        if row1 == row2 {
            return;
        }
        self.ensure_size(row1.max(row2));
        let ids1 = self.row_ids(row1);
        let ids2 = self.row_ids(row2);
        for &id in ids1.iter().chain(ids2.iter()) {
            self.unlink_vertical(id);
        }
        for &id in &ids1 {
            self.elements[id.0].row = row2;
        }
        for &id in &ids2 {
            self.elements[id.0].row = row1;
        }
        for &id in ids1.iter().chain(ids2.iter()) {
            self.insert_vertical(id);
        }
        self.first_in_row.swap(row1, row2);
        self.diagonal[row1] = self.find(row1, row1);
        self.diagonal[row2] = self.find(row2, row2);
    }

    /// Swap two columns by relinking the horizontal chains.
    pub fn swap_columns(&mut self, col1: usize, col2: usize) {
        if col1 == col2 {
            return;
        }
        self.ensure_size(col1.max(col2));
        let ids1 = self.col_ids(col1);
        let ids2 = self.col_ids(col2);
        for &id in ids1.iter().chain(ids2.iter()) {
            self.unlink_horizontal(id);
        }
        for &id in &ids1 {
            self.elements[id.0].col = col2;
        }
        for &id in &ids2 {
            self.elements[id.0].col = col1;
        }
        for &id in ids1.iter().chain(ids2.iter()) {
            self.insert_horizontal(id);
        }
        self.first_in_col.swap(col1, col2);
        self.diagonal[col1] = self.find(col1, col1);
        self.diagonal[col2] = self.find(col2, col2);
    }

    fn row_ids(&self, row: usize) -> Vec<ElementId> {
        let mut ids = Vec::new();
        let mut cursor = self.first_in_row[row];
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.elements[id.0].right;
        }
        ids
    }

    fn col_ids(&self, col: usize) -> Vec<ElementId> {
        let mut ids = Vec::new();
        let mut cursor = self.first_in_col[col];
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.elements[id.0].below;
        }
        ids
    }

    fn unlink_vertical(&mut self, id: ElementId) {
        let (col, above, below) = {
            let e = &self.elements[id.0];
            (e.col, e.above, e.below)
        };
        match above {
            Some(a) => self.elements[a.0].below = below,
            None => self.first_in_col[col] = below,
        }
        if let Some(b) = below {
            self.elements[b.0].above = above;
        }
        self.elements[id.0].above = None;
        self.elements[id.0].below = None;
    }

    fn unlink_horizontal(&mut self, id: ElementId) {
        let (row, left, right) = {
            let e = &self.elements[id.0];
            (e.row, e.left, e.right)
        };
        match left {
            Some(l) => self.elements[l.0].right = right,
            None => self.first_in_row[row] = right,
        }
        if let Some(r) = right {
            self.elements[r.0].left = left;
        }
        self.elements[id.0].left = None;
        self.elements[id.0].right = None;
    }

    /// Insert into its column chain, ordered by row.
    fn insert_vertical(&mut self, id: ElementId) {
        let (row, col) = {
            let e = &self.elements[id.0];
            (e.row, e.col)
        };
        let mut prev: Option<ElementId> = None;
        let mut cursor = self.first_in_col[col];
        while let Some(c) = cursor {
            if self.elements[c.0].row > row {
                break;
            }
            prev = Some(c);
            cursor = self.elements[c.0].below;
        }
        self.elements[id.0].above = prev;
        self.elements[id.0].below = cursor;
        match prev {
            Some(p) => self.elements[p.0].below = Some(id),
            None => self.first_in_col[col] = Some(id),
        }
        if let Some(n) = cursor {
            self.elements[n.0].above = Some(id);
        }
    }

    /// Insert into its row chain, ordered by column.
    fn insert_horizontal(&mut self, id: ElementId) {
        let (row, col) = {
            let e = &self.elements[id.0];
            (e.row, e.col)
        };
        let mut prev: Option<ElementId> = None;
        let mut cursor = self.first_in_row[row];
        while let Some(c) = cursor {
            if self.elements[c.0].col > col {
                break;
            }
            prev = Some(c);
            cursor = self.elements[c.0].right;
        }
        self.elements[id.0].left = prev;
        self.elements[id.0].right = cursor;
        match prev {
            Some(p) => self.elements[p.0].right = Some(id),
            None => self.first_in_row[row] = Some(id),
        }
        if let Some(n) = cursor {
            self.elements[n.0].left = Some(id);
        }
    }
}

impl<T: Scalar> Default for SparseMatrix<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(m: &mut SparseMatrix<f64>, row: usize, col: usize, value: f64) {
        let id = m.get(row, col);
        *m.value_mut(id) = value;
    }

    fn row_contents(m: &SparseMatrix<f64>, row: usize) -> Vec<(usize, f64)> {
        let mut out = Vec::new();
        let mut cursor = m.first_in_row(row);
        while let Some(id) = cursor {
            out.push((m.col_of(id), m.value(id)));
            cursor = m.right(id);
        }
        out
    }

    fn col_contents(m: &SparseMatrix<f64>, col: usize) -> Vec<(usize, f64)> {
        let mut out = Vec::new();
        let mut cursor = m.first_in_col(col);
        while let Some(id) = cursor {
            out.push((m.row_of(id), m.value(id)));
            cursor = m.below(id);
        }
        out
    }

    #[test]
    fn test_ordered_chains() {
        let mut m = SparseMatrix::new();
        set(&mut m, 2, 3, 23.0);
        set(&mut m, 2, 1, 21.0);
        set(&mut m, 2, 2, 22.0);
        set(&mut m, 1, 2, 12.0);
        set(&mut m, 3, 2, 32.0);

        assert_eq!(row_contents(&m, 2), vec![(1, 21.0), (2, 22.0), (3, 23.0)]);
        assert_eq!(col_contents(&m, 2), vec![(1, 12.0), (2, 22.0), (3, 32.0)]);
        assert_eq!(m.size(), 3);
        assert_eq!(m.value(m.diagonal(2).unwrap()), 22.0);
    }

    #[test]
    fn test_ground_writes_are_absorbed() {
        let mut m: SparseMatrix<f64> = SparseMatrix::new();
        let g = m.get(0, 5);
        assert!(g.is_ground());
        m.add(g, 100.0);
        assert_eq!(m.element_count(), 0);
        assert_eq!(m.size(), 0);
    }

    #[test]
    fn test_get_returns_same_handle() {
        let mut m: SparseMatrix<f64> = SparseMatrix::new();
        let a = m.get(4, 7);
        let b = m.get(4, 7);
        assert_eq!(a, b);
        assert_eq!(m.element_count(), 1);
    }

    #[test]
    fn test_swap_rows_preserves_handles_and_order() {
        let mut m = SparseMatrix::new();
        set(&mut m, 1, 1, 11.0);
        set(&mut m, 1, 3, 13.0);
        set(&mut m, 2, 2, 22.0);
        set(&mut m, 3, 1, 31.0);
        set(&mut m, 3, 3, 33.0);
        let handle = m.get(1, 3);

        m.swap_rows(1, 3);

        // handle follows the element
        assert_eq!(m.row_of(handle), 3);
        assert_eq!(m.col_of(handle), 3);
        assert_eq!(m.value(handle), 13.0);

        assert_eq!(row_contents(&m, 1), vec![(1, 31.0), (3, 33.0)]);
        assert_eq!(row_contents(&m, 3), vec![(1, 11.0), (3, 13.0)]);
        assert_eq!(col_contents(&m, 1), vec![(1, 31.0), (3, 11.0)]);
        assert_eq!(col_contents(&m, 3), vec![(1, 33.0), (3, 13.0)]);

        // diagonals repaired
        assert_eq!(m.value(m.diagonal(1).unwrap()), 31.0);
        assert_eq!(m.value(m.diagonal(3).unwrap()), 13.0);
    }

    #[test]
    fn test_swap_columns_preserves_handles_and_order() {
        let mut m = SparseMatrix::new();
        set(&mut m, 1, 1, 11.0);
        set(&mut m, 1, 2, 12.0);
        set(&mut m, 2, 1, 21.0);
        set(&mut m, 2, 2, 22.0);
        let handle = m.get(2, 1);

        m.swap_columns(1, 2);

        assert_eq!(m.col_of(handle), 2);
        assert_eq!(m.value(handle), 21.0);
        assert_eq!(row_contents(&m, 1), vec![(1, 12.0), (2, 11.0)]);
        assert_eq!(row_contents(&m, 2), vec![(1, 22.0), (2, 21.0)]);
        assert_eq!(m.value(m.diagonal(1).unwrap()), 12.0);
        assert_eq!(m.value(m.diagonal(2).unwrap()), 21.0);
    }

    #[test]
    fn test_clear_keeps_structure() {
        let mut m = SparseMatrix::new();
        set(&mut m, 1, 1, 1.0);
        set(&mut m, 2, 1, 2.0);
        m.clear();
        assert_eq!(m.element_count(), 2);
        assert_eq!(m.value(m.find(2, 1).unwrap()), 0.0);
    }
}
