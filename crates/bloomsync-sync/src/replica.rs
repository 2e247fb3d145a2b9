//! The set being reconciled.
//!
//! The set belongs to the surrounding application; reconciliation only
//! iterates it, tests membership and adds to it. Nothing is ever removed.

use std::collections::{BTreeSet, HashSet};
use std::hash::BuildHasher;

/// An insert-only (from the engine's perspective) collection of unique strings.
pub trait ReplicaSet {
    /// Number of elements.
    fn len(&self) -> usize;

    /// True if the set has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test.
    fn contains(&self, element: &str) -> bool;

    /// Add an element. Returns true if it was not already present.
    fn insert(&mut self, element: String) -> bool;

    /// Copy of the current elements, used as a round's pre-round view.
    fn snapshot(&self) -> Vec<String>;
}

impl<S: BuildHasher> ReplicaSet for HashSet<String, S> {
    fn len(&self) -> usize {
        HashSet::len(self)
    }

    fn contains(&self, element: &str) -> bool {
        HashSet::contains(self, element)
    }

    fn insert(&mut self, element: String) -> bool {
        HashSet::insert(self, element)
    }

    fn snapshot(&self) -> Vec<String> {
        self.iter().cloned().collect()
    }
}

impl ReplicaSet for BTreeSet<String> {
    fn len(&self) -> usize {
        BTreeSet::len(self)
    }

    fn contains(&self, element: &str) -> bool {
        BTreeSet::contains(self, element)
    }

    fn insert(&mut self, element: String) -> bool {
        BTreeSet::insert(self, element)
    }

    fn snapshot(&self) -> Vec<String> {
        self.iter().cloned().collect()
    }
}

impl<T: ReplicaSet + ?Sized> ReplicaSet for &mut T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn contains(&self, element: &str) -> bool {
        (**self).contains(element)
    }

    fn insert(&mut self, element: String) -> bool {
        (**self).insert(element)
    }

    fn snapshot(&self) -> Vec<String> {
        (**self).snapshot()
    }
}
