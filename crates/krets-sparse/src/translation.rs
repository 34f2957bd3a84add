//! External/internal index translation surviving pivot permutations.

const EXPANSION_FACTOR: f64 = 1.5;

/// Bidirectional mapping between external (caller-facing) and internal
/// (pivot-ordered) indices.
///
/// Index 0 is the ground reference and always maps to itself. Entries
/// beyond the allocated range are identity-mapped, so lookups never require
/// growth; only [`Translation::swap`] allocates.
///
/// Invariant: `ext_to_int[int_to_ext[i]] == i` for all allocated `i`.
#[derive(Debug, Clone)]
pub struct Translation {
    ext_to_int: Vec<usize>,
    int_to_ext: Vec<usize>,
    allocated: usize,
}

impl Translation {
    /// Create a translation preallocated for `size` indices (1..=size).
    pub fn new(size: usize) -> Self {
        let mut ext_to_int = Vec::with_capacity(size + 1);
        let mut int_to_ext = Vec::with_capacity(size + 1);
        for i in 0..=size {
            ext_to_int.push(i);
            int_to_ext.push(i);
        }
        Self {
            ext_to_int,
            int_to_ext,
            allocated: size,
        }
    }

    /// Map an external index to its internal index.
    pub fn index(&self, external: usize) -> usize {
        if external == 0 || external > self.allocated {
            external
        } else {
            self.ext_to_int[external]
        }
    }

    /// Map an internal index back to its external index.
    pub fn reverse(&self, internal: usize) -> usize {
        if internal == 0 || internal > self.allocated {
            internal
        } else {
            self.int_to_ext[internal]
        }
    }

    /// Swap two internal indices, keeping the bijection intact.
    pub fn swap(&mut self, index1: usize, index2: usize) {
        let needed = index1.max(index2);
        if needed > self.allocated {
            self.expand(needed);
        }
        self.int_to_ext.swap(index1, index2);
        self.ext_to_int[self.int_to_ext[index1]] = index1;
        self.ext_to_int[self.int_to_ext[index2]] = index2;
    }

    /// Apply the permutation: `target[int(i)] = source[i]`.
    ///
    /// Both slices are 1-indexed; index 0 is untouched.
    pub fn scramble<T: Copy>(&self, source: &[T], target: &mut [T]) {
        debug_assert!(target.len() >= source.len());
        for i in 1..source.len() {
            target[self.index(i)] = source[i];
        }
    }

    /// Undo the permutation: `target[ext(i)] = source[i]`.
    pub fn unscramble<T: Copy>(&self, source: &[T], target: &mut [T]) {
        debug_assert!(target.len() >= source.len());
        for i in 1..source.len() {
            target[self.reverse(i)] = source[i];
        }
    }

    /// Highest explicitly allocated index.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    fn expand(&mut self, new_length: usize) {
        let target = new_length.max((self.allocated as f64 * EXPANSION_FACTOR) as usize);
        for i in self.allocated + 1..=target {
            self.ext_to_int.push(i);
            self.int_to_ext.push(i);
        }
        self.allocated = target;
    }
}

impl Default for Translation {
    fn default() -> Self {
        Self::new(0)
    }
}
