use super::flavor_state::FlavorState;
use serde::{Deserialize, Serialize};

/// Owner of the per-flavor segment configurations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentStore {
    beta: f64,
    flavors: Vec<FlavorState>,
}

impl SegmentStore {
    /// Creates an empty configuration for `n_flavors` flavors.
    pub fn new(n_flavors: usize, beta: f64) -> Self {
        Self {
            beta,
            flavors: vec![FlavorState::new(); n_flavors],
        }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn n_flavors(&self) -> usize {
        self.flavors.len()
    }

    pub fn flavor(&self, f: usize) -> &FlavorState {
        &self.flavors[f]
    }

    pub fn flavor_mut(&mut self, f: usize) -> &mut FlavorState {
        &mut self.flavors[f]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlavorState> {
        self.flavors.iter()
    }

    /// Replaces all flavor states at once. Used by checkpoint restore.
    pub fn replace_flavors(&mut self, flavors: Vec<FlavorState>) {
        self.flavors = flavors;
    }

    /// Extracts the flavor states. Used by checkpoint capture.
    pub fn flavor_states(&self) -> Vec<FlavorState> {
        self.flavors.clone()
    }

    /// Checks the structural invariants of every flavor.
    pub fn invariants_hold(&self) -> bool {
        self.flavors.iter().all(|f| f.invariants_hold(self.beta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::segment::Segment;

    #[test]
    fn starts_empty_and_consistent() {
        let store = SegmentStore::new(3, 5.0);
        assert_eq!(store.n_flavors(), 3);
        assert!(store.iter().all(|f| f.is_empty() && !f.is_full_line()));
        assert!(store.invariants_hold());
    }

    #[test]
    fn flavors_are_independent() {
        let mut store = SegmentStore::new(2, 5.0);
        store.flavor_mut(0).insert(Segment::new(1.0, 2.0), 5.0);
        assert_eq!(store.flavor(0).len(), 1);
        assert!(store.flavor(1).is_empty());
    }
}
