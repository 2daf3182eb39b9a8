//! Vector-clock lattice used to order causally related versions of a key.
//!
//! A [`VectorClock`] maps client ids to monotonically non-decreasing
//! counters. Two clocks are compared by merging a copy of one into the
//! other and checking which side the merge landed on; this is the same
//! recipe used throughout version-vector code, generalized here into an
//! explicit three-way [`CausalOrdering`] because callers need to branch on
//! "concurrent" directly rather than infer it from a `None` partial order.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

pub type ClientId = Box<str>;

/// Result of comparing two [`VectorClock`]s under the causal order.
///
/// `DominatesOrEqual` intentionally folds equality into "dominates": every
/// caller in the dependency resolver treats "equal or newer" uniformly, so
/// keeping them distinct would just push an extra match arm onto every
/// call site without changing any behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrdering {
    DominatesOrEqual,
    Dominated,
    Concurrent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorClock(FxHashMap<ClientId, u64>);

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I: IntoIterator<Item = (ClientId, u64)>>(pairs: I) -> Self {
        Self(pairs.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, client: &str) -> u64 {
        self.0.get(client).copied().unwrap_or(0)
    }

    pub fn set(&mut self, client: ClientId, counter: u64) {
        self.0.insert(client, counter);
    }

    pub fn increment(&mut self, client: &str) {
        let next = self.get(client) + 1;
        self.0.insert(client.into(), next);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, &v)| (k.as_ref(), v))
    }

    /// Pointwise max merge, in place.
    pub fn merge(&mut self, other: &VectorClock) {
        for (client, &counter) in other.0.iter() {
            let entry = self.0.entry(client.clone()).or_insert(0);
            if *entry < counter {
                *entry = counter;
            }
        }
    }

    pub fn merged(&self, other: &VectorClock) -> VectorClock {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Three-way causal comparison of `self` against `other`.
    ///
    /// An empty clock on the `other` side is treated as dominated by
    /// anything (per spec: a dependency declared against the empty clock is
    /// satisfied by any stored value at all; this is how "the key exists"
    /// is distinguished from "no version required yet").
    pub fn compare(&self, other: &VectorClock) -> CausalOrdering {
        if other.is_empty() {
            return CausalOrdering::DominatesOrEqual;
        }
        let merged = self.merged(other);
        if merged.causally_eq(self) {
            CausalOrdering::DominatesOrEqual
        } else if merged.causally_eq(other) {
            CausalOrdering::Dominated
        } else {
            CausalOrdering::Concurrent
        }
    }

    pub fn dominates_or_equal(&self, other: &VectorClock) -> bool {
        matches!(self.compare(other), CausalOrdering::DominatesOrEqual)
    }

    fn causally_eq(&self, other: &VectorClock) -> bool {
        self.0.iter().all(|(c, &v)| other.get(c) == v)
            && other.0.iter().all(|(c, &v)| self.get(c) == v)
    }

    fn partial_cmp_std(&self, other: &VectorClock) -> Option<Ordering> {
        if self.causally_eq(other) {
            return Some(Ordering::Equal);
        }
        let merged = self.merged(other);
        if merged.causally_eq(self) {
            Some(Ordering::Greater)
        } else if merged.causally_eq(other) {
            Some(Ordering::Less)
        } else {
            None
        }
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.causally_eq(other)
    }
}
impl Eq for VectorClock {}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.partial_cmp_std(other)
    }
}

/// Hashes the extensional (zero-entries-stripped) form of the clock so that
/// clocks equal under [`PartialEq`] (which ignores absent-vs-zero entries)
/// always hash the same; this lets [`VectorClock`] key the cover map's
/// per-dependency-version index.
impl Hash for VectorClock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut pairs: Vec<(&str, u64)> = self
            .0
            .iter()
            .filter(|&(_, &v)| v != 0)
            .map(|(k, &v)| (k.as_ref(), v))
            .collect();
        pairs.sort_unstable();
        pairs.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vc(pairs: &[(&str, u64)]) -> VectorClock {
        VectorClock::from_pairs(pairs.iter().map(|&(c, n)| (c.into(), n)))
    }

    #[test]
    fn empty_equals_empty() {
        assert_eq!(VectorClock::new(), VectorClock::new());
    }

    #[test]
    fn dominates_or_equal_on_equal_clocks() {
        let a = vc(&[("c1", 1), ("c2", 2)]);
        let b = vc(&[("c1", 1), ("c2", 2)]);
        assert_eq!(a.compare(&b), CausalOrdering::DominatesOrEqual);
        assert_eq!(b.compare(&a), CausalOrdering::DominatesOrEqual);
    }

    #[test]
    fn dominated_when_strictly_behind() {
        let a = vc(&[("c1", 1), ("c2", 1)]);
        let b = vc(&[("c1", 2), ("c2", 1)]);
        assert_eq!(a.compare(&b), CausalOrdering::Dominated);
        assert_eq!(b.compare(&a), CausalOrdering::DominatesOrEqual);
    }

    #[test]
    fn concurrent_when_incomparable() {
        let a = vc(&[("c1", 1), ("c2", 0)]);
        let b = vc(&[("c1", 0), ("c2", 1)]);
        assert_eq!(a.compare(&b), CausalOrdering::Concurrent);
        assert_eq!(b.compare(&a), CausalOrdering::Concurrent);
    }

    #[test]
    fn empty_dependency_is_always_satisfied() {
        let a = vc(&[("c1", 5)]);
        assert_eq!(a.compare(&VectorClock::new()), CausalOrdering::DominatesOrEqual);
        assert_eq!(
            VectorClock::new().compare(&VectorClock::new()),
            CausalOrdering::DominatesOrEqual
        );
    }

    #[test]
    fn merge_is_pointwise_max() {
        let mut a = vc(&[("c1", 1), ("c2", 0)]);
        let b = vc(&[("c1", 0), ("c2", 1)]);
        a.merge(&b);
        assert_eq!(a.get("c1"), 1);
        assert_eq!(a.get("c2"), 1);
    }

    proptest::proptest! {
        #[test]
        fn merge_dominates_both_inputs(
            a in proptest::collection::vec(("[a-c]", 0u64..5), 0..4),
            b in proptest::collection::vec(("[a-c]", 0u64..5), 0..4),
        ) {
            let a = vc(&a.iter().map(|(c, n)| (c.as_str(), *n)).collect::<Vec<_>>());
            let b = vc(&b.iter().map(|(c, n)| (c.as_str(), *n)).collect::<Vec<_>>());
            let merged = a.merged(&b);
            prop_assert!(matches!(
                merged.compare(&a),
                CausalOrdering::DominatesOrEqual
            ));
            prop_assert!(matches!(
                merged.compare(&b),
                CausalOrdering::DominatesOrEqual
            ));
        }
    }
}
