//! The cross-causal value (CCV): the unit of storage for every key in the
//! cache. A CCV pairs a vector clock identifying its version with a map of
//! one-level dependency versions and an opaque set-valued payload.
//!
//! Merging two CCVs is the only way new values enter any store. The merge
//! rule mirrors a join-semilattice: if one side's clock dominates, it wins
//! outright (replacing, not merging, `deps`/`payload` — an old concurrent
//! write does not get to keep contributing once a strictly newer version is
//! known); otherwise deps are pointwise-maxed and payloads are unioned.

use bytes::Bytes;
use causal_clock::{CausalOrdering, VectorClock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type Key = Box<str>;

/// An opaque set-valued payload. The payload itself is a join-semilattice
/// under union, so merging concurrent CCVs never loses a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSet(BTreeSet<Bytes>);

impl PayloadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(value: impl Into<Bytes>) -> Self {
        let mut set = BTreeSet::new();
        set.insert(value.into());
        Self(set)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn union(&mut self, other: &PayloadSet) {
        self.0.extend(other.0.iter().cloned());
    }
}

impl FromIterator<Bytes> for PayloadSet {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossCausalValue {
    pub vc: VectorClock,
    pub deps: FxHashMap<Key, VectorClock>,
    pub payload: PayloadSet,
}

impl CrossCausalValue {
    pub fn new(vc: VectorClock, deps: FxHashMap<Key, VectorClock>, payload: PayloadSet) -> Self {
        Self { vc, deps, payload }
    }

    /// A CCV with the empty vector clock is the cache's encoding of "this
    /// key does not exist" (see spec §4.1, §7): the empty clock compares as
    /// dominated by any non-empty clock, so it can never win a merge against
    /// a real value, and a `Dominated` empty value unambiguously started
    /// out empty rather than having been merged down.
    pub fn does_not_exist() -> Self {
        Self::default()
    }

    pub fn exists(&self) -> bool {
        !self.vc.is_empty()
    }

    pub fn causal_order(&self, other: &CrossCausalValue) -> CausalOrdering {
        self.vc.compare(&other.vc)
    }

    /// Merge `other` into `self` in place, following the three-way causal
    /// comparison: the dominating side's clock, deps and payload replace the
    /// dominated side wholesale; concurrent values have their deps
    /// pointwise-maxed and payloads unioned.
    pub fn merge(&mut self, other: &CrossCausalValue) {
        match self.causal_order(other) {
            CausalOrdering::DominatesOrEqual => {}
            CausalOrdering::Dominated => {
                self.vc = other.vc.clone();
                self.deps = other.deps.clone();
                self.payload = other.payload.clone();
            }
            CausalOrdering::Concurrent => {
                self.vc.merge(&other.vc);
                for (key, other_dep_vc) in other.deps.iter() {
                    let entry = self.deps.entry(key.clone()).or_default();
                    entry.merge(other_dep_vc);
                }
                self.payload.union(&other.payload);
            }
        }
    }

    pub fn merged(&self, other: &CrossCausalValue) -> CrossCausalValue {
        let mut out = self.clone();
        out.merge(other);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causal_clock::VectorClock;

    fn clock(pairs: &[(&str, u64)]) -> VectorClock {
        VectorClock::from_pairs(pairs.iter().map(|&(c, n)| (c.into(), n)))
    }

    fn value(vc: VectorClock, payload: &str) -> CrossCausalValue {
        CrossCausalValue::new(vc, FxHashMap::default(), PayloadSet::single(payload.as_bytes()))
    }

    #[test]
    fn dominating_write_replaces() {
        let mut a = value(clock(&[("c1", 1), ("c2", 0)]), "a");
        let b = value(clock(&[("c1", 2), ("c2", 0)]), "b");
        a.merge(&b);
        assert_eq!(a.vc.get("c1"), 2);
        assert_eq!(a.payload, PayloadSet::single("b".as_bytes()));
    }

    #[test]
    fn concurrent_writes_union_payloads() {
        let mut a = value(clock(&[("c1", 1), ("c2", 0)]), "a");
        let b = value(clock(&[("c1", 0), ("c2", 1)]), "b");
        a.merge(&b);
        assert_eq!(a.vc.get("c1"), 1);
        assert_eq!(a.vc.get("c2"), 1);
        assert_eq!(a.payload.len(), 2);
    }

    #[test]
    fn does_not_exist_is_dominated_by_any_real_value() {
        let dne = CrossCausalValue::does_not_exist();
        let real = value(clock(&[("c1", 1)]), "x");
        assert_eq!(dne.causal_order(&real), CausalOrdering::Dominated);
        assert!(!dne.exists());
        assert!(real.exists());
    }

    #[test]
    fn merge_is_idempotent() {
        let mut a = value(clock(&[("c1", 1)]), "a");
        let snapshot = a.clone();
        a.merge(&snapshot);
        assert_eq!(a.vc, snapshot.vc);
        assert_eq!(a.payload, snapshot.payload);
    }

    proptest::proptest! {
        #[test]
        fn merge_dominates_both_inputs(
            a in proptest::collection::vec(("[a-c]", 0u64..5), 0..4),
            b in proptest::collection::vec(("[a-c]", 0u64..5), 0..4),
            pa in "[a-z]{0,3}",
            pb in "[a-z]{0,3}",
        ) {
            let va = value(clock(&a.iter().map(|(c, n)| (c.as_str(), *n)).collect::<Vec<_>>()), &pa);
            let vb = value(clock(&b.iter().map(|(c, n)| (c.as_str(), *n)).collect::<Vec<_>>()), &pb);
            let merged = va.merged(&vb);
            prop_assert_ne!(merged.causal_order(&va), CausalOrdering::Dominated);
            prop_assert_ne!(merged.causal_order(&vb), CausalOrdering::Dominated);
        }

        #[test]
        fn merge_is_commutative_on_the_resulting_clock(
            a in proptest::collection::vec(("[a-c]", 0u64..5), 0..4),
            b in proptest::collection::vec(("[a-c]", 0u64..5), 0..4),
        ) {
            let va = value(clock(&a.iter().map(|(c, n)| (c.as_str(), *n)).collect::<Vec<_>>()), "a");
            let vb = value(clock(&b.iter().map(|(c, n)| (c.as_str(), *n)).collect::<Vec<_>>()), "b");
            prop_assert_eq!(va.merged(&vb).vc, vb.merged(&va).vc);
        }
    }
}
