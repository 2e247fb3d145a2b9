//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::fixtures::SetPair;

/// Generate a single identifier.
pub fn element() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,16}".prop_map(String::from)
}

/// Generate a set of up to `max_len` identifiers.
pub fn id_set(max_len: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(element(), 0..=max_len)
}

/// False-positive rates inside the recommended operating range.
pub fn false_positive_rate() -> impl Strategy<Value = f64> {
    0.05f64..0.5
}

/// Shape of a pair of replicas.
#[derive(Debug, Clone)]
pub struct SetPairParams {
    pub shared: BTreeSet<String>,
    pub only_left: BTreeSet<String>,
    pub only_right: BTreeSet<String>,
}

impl SetPairParams {
    /// Build the two replicas.
    ///
    /// Private elements that collide with the other side's elements simply
    /// become shared.
    pub fn build(&self) -> SetPair {
        let mut left = self.shared.clone();
        left.extend(self.only_left.iter().cloned());
        let mut right = self.shared.clone();
        right.extend(self.only_right.iter().cloned());
        SetPair { left, right }
    }
}

impl Arbitrary for SetPairParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (id_set(60), id_set(30), id_set(30))
            .prop_map(|(shared, only_left, only_right)| SetPairParams {
                shared,
                only_left,
                only_right,
            })
            .boxed()
    }
}
