//! Named unknowns mapped to equation indices.

use indexmap::IndexMap;

/// Maps named circuit unknowns (node voltages, branch currents) to their
/// 1-based equation indices. Index 0 is the ground reference and is never
/// assigned to a name.
#[derive(Debug, Default, Clone)]
pub struct VariableMap {
    indices: IndexMap<String, usize>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self {
            indices: IndexMap::new(),
        }
    }

    /// Look up a name, assigning the next free index if it is new.
    pub fn index(&mut self, name: &str) -> usize {
        if let Some(&index) = self.indices.get(name) {
            return index;
        }
        let index = self.indices.len() + 1;
        self.indices.insert(name.to_string(), index);
        index
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// Name of an equation index, for diagnostics.
    pub fn name(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return Some("0");
        }
        self.indices
            .get_index(index.checked_sub(1)?)
            .map(|(name, _)| name.as_str())
    }

    /// Number of named unknowns, excluding ground.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.indices.iter().map(|(name, &index)| (name.as_str(), index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_one_based_and_stable() {
        let mut map = VariableMap::new();
        assert_eq!(map.index("n1"), 1);
        assert_eq!(map.index("n2"), 2);
        assert_eq!(map.index("n1"), 1, "existing name keeps its index");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_reverse_lookup() {
        let mut map = VariableMap::new();
        map.index("out");
        map.index("i(V1)");
        assert_eq!(map.name(0), Some("0"));
        assert_eq!(map.name(1), Some("out"));
        assert_eq!(map.name(2), Some("i(V1)"));
        assert_eq!(map.name(3), None);
    }
}
