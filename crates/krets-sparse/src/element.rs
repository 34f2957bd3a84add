//! Arena element records for the sparse matrix.

/// Stable handle to a matrix element.
///
/// Handles are never invalidated: row/column swaps relink the grid around
/// the records, so a handle obtained before reordering still refers to the
/// same logical (external) matrix position afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    /// The trash element absorbing all writes to the ground row/column.
    pub(crate) const TRASH: ElementId = ElementId(0);

    /// True if this handle refers to the ground (row or column 0) sink.
    pub fn is_ground(self) -> bool {
        self.0 == 0
    }
}

/// A node in the doubly-linked element grid.
///
/// Invariant: `right` walks a row in strictly increasing column order,
/// `below` walks a column in strictly increasing row order.
#[derive(Debug, Clone)]
pub(crate) struct Element<T> {
    pub row: usize,
    pub col: usize,
    pub value: T,
    pub left: Option<ElementId>,
    pub right: Option<ElementId>,
    pub above: Option<ElementId>,
    pub below: Option<ElementId>,
}

impl<T> Element<T> {
    pub fn new(row: usize, col: usize, value: T) -> Self {
        Self {
            row,
            col,
            value,
            left: None,
            right: None,
            above: None,
            below: None,
        }
    }
}
