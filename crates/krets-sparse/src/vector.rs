//! Arena-backed sparse vector.

use crate::scalar::Scalar;

/// Stable handle to a sparse vector element.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct VectorElementId(usize);

#[derive(Debug, Clone)]
struct VectorElement<T> {
    index: usize,
    value: T,
    next: Option<VectorElementId>,
}

/// Singly-linked sparse vector ordered by index.
///
/// Index 0 is reserved as the ground/no-op entry; writes through
/// [`SparseVector::get`] at index 0 land in a trash element.
#[derive(Debug, Clone)]
pub struct SparseVector<T> {
    elements: Vec<VectorElement<T>>,
    first: Option<VectorElementId>,
    length: usize,
}

impl<T: Scalar> SparseVector<T> {
    pub fn new() -> Self {
        Self {
            // id 0 is the trash element
            elements: vec![VectorElement {
                index: 0,
                value: T::zero(),
                next: None,
            }],
            first: None,
            length: 0,
        }
    }

    /// Highest index written so far.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Find an element, or create it keeping the list ordered by index.
    pub fn get(&mut self, index: usize) -> VectorElementId {
        if index == 0 {
            return VectorElementId(0);
        }
        self.length = self.length.max(index);

        let mut prev: Option<VectorElementId> = None;
        let mut cursor = self.first;
        while let Some(id) = cursor {
            let e = &self.elements[id.0];
            if e.index == index {
                return id;
            }
            if e.index > index {
                break;
            }
            prev = Some(id);
            cursor = e.next;
        }

        let id = VectorElementId(self.elements.len());
        self.elements.push(VectorElement {
            index,
            value: T::zero(),
            next: cursor,
        });
        match prev {
            Some(p) => self.elements[p.0].next = Some(id),
            None => self.first = Some(id),
        }
        id
    }

    /// Find an existing element without creating it.
    pub fn find(&self, index: usize) -> Option<VectorElementId> {
        let mut cursor = self.first;
        while let Some(id) = cursor {
            let e = &self.elements[id.0];
            if e.index == index {
                return Some(id);
            }
            if e.index > index {
                return None;
            }
            cursor = e.next;
        }
        None
    }

    pub fn first(&self) -> Option<VectorElementId> {
        self.first
    }

    pub fn next(&self, id: VectorElementId) -> Option<VectorElementId> {
        self.elements[id.0].next
    }

    pub fn index_of(&self, id: VectorElementId) -> usize {
        self.elements[id.0].index
    }

    pub fn value(&self, id: VectorElementId) -> T {
        self.elements[id.0].value
    }

    pub fn value_mut(&mut self, id: VectorElementId) -> &mut T {
        &mut self.elements[id.0].value
    }

    /// Zero all values, keeping the structure.
    pub fn clear(&mut self) {
        for e in &mut self.elements {
            e.value = T::zero();
        }
    }
}

impl<T: Scalar> Default for SparseVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_insertion() {
        let mut v: SparseVector<f64> = SparseVector::new();
        for (idx, val) in [(5, 5.0), (2, 2.0), (8, 8.0), (3, 3.0)] {
            let id = v.get(idx);
            *v.value_mut(id) = val;
        }

        let mut seen = Vec::new();
        let mut cursor = v.first();
        while let Some(id) = cursor {
            seen.push((v.index_of(id), v.value(id)));
            cursor = v.next(id);
        }
        assert_eq!(seen, vec![(2, 2.0), (3, 3.0), (5, 5.0), (8, 8.0)]);
        assert_eq!(v.length(), 8);
    }

    #[test]
    fn test_get_is_idempotent() {
        let mut v: SparseVector<f64> = SparseVector::new();
        let a = v.get(4);
        *v.value_mut(a) += 1.0;
        let b = v.get(4);
        *v.value_mut(b) += 1.0;
        assert_eq!(a, b);
        assert_eq!(v.value(a), 2.0);
    }

    #[test]
    fn test_ground_index_is_trash() {
        let mut v: SparseVector<f64> = SparseVector::new();
        let g = v.get(0);
        *v.value_mut(g) = 42.0;
        assert!(v.first().is_none());
        assert_eq!(v.find(0), None);
    }

    #[test]
    fn test_clear_keeps_structure() {
        let mut v: SparseVector<f64> = SparseVector::new();
        let a = v.get(1);
        *v.value_mut(a) = 1.0;
        let b = v.get(7);
        *v.value_mut(b) = 7.0;
        v.clear();
        assert_eq!(v.value(v.find(7).unwrap()), 0.0);
        assert!(v.find(1).is_some());
    }
}
