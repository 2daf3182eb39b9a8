use crate::Key;
use causal_clock::VectorClock;
use causal_value::CrossCausalValue;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Dependency-closed, safe-to-read-at-cross-consistency store (spec §3).
///
/// Invariant upheld by every insertion: for every `k` in the store and every
/// `(d, vd)` in `C[k].deps`, `d` is also in the store with `C[d].vc`
/// dominating `vd`. Callers only ever insert a key after the resolver has
/// confirmed every dependency is already present (`merge_into_causal_cut`,
/// spec §4.5), so this module does not re-derive the closure itself.
#[derive(Debug, Default)]
pub struct CausalCutStore {
    map: FxHashMap<Key, Arc<CrossCausalValue>>,
}

impl CausalCutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<CrossCausalValue>> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Arc<CrossCausalValue>)> {
        self.map.iter()
    }

    /// True if some key is present locally and already dominates `vc` — the
    /// "locally available, no need to chase a remote" check used by both
    /// the classify step (§4.4c) and the frontier check.
    pub fn dominates(&self, key: &str, vc: &VectorClock) -> bool {
        self.map
            .get(key)
            .map(|ccv| ccv.vc.dominates_or_equal(vc))
            .unwrap_or(false)
    }

    /// Merge `value` into `C[key]`, inserting if absent.
    pub fn merge_in(&mut self, key: Key, value: &Arc<CrossCausalValue>) {
        match self.map.get(&key) {
            Some(existing) => {
                let merged = existing.merged(value);
                self.map.insert(key, Arc::new(merged));
            }
            None => {
                self.map.insert(key, value.clone());
            }
        }
    }

    /// Removes `key`, for use by an [`crate::eviction::EvictionPolicy`]
    /// caller. `cited_by_pending` must be false — a pending cross-consistency
    /// request's local payload still citing this key is safety rule 3 from
    /// [`crate::eviction`], and violating it would hand a client a response
    /// pointing at data this store no longer has.
    pub fn evict(&mut self, key: &str, cited_by_pending: bool) -> Option<Arc<CrossCausalValue>> {
        debug_assert!(!cited_by_pending, "evicting {key} while a pending request still cites it");
        self.map.remove(key)
    }

    /// Debug-only check of the closure invariant (spec §8, invariant 1):
    /// every dependency of every stored value is itself present and
    /// dominates the declared dependency version.
    #[cfg(debug_assertions)]
    pub fn assert_closed(&self) {
        for (key, ccv) in self.map.iter() {
            for (dep_key, dep_vc) in ccv.deps.iter() {
                let dep = self
                    .map
                    .get(dep_key.as_ref())
                    .unwrap_or_else(|| panic!("causal cut not closed: {key} depends on missing {dep_key}"));
                assert!(
                    dep.vc.dominates_or_equal(dep_vc),
                    "causal cut not closed: {key}'s dependency on {dep_key} is not dominated"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causal_value::PayloadSet;

    fn ccv(counter: u64, deps: &[(&str, u64)]) -> CrossCausalValue {
        let mut dep_map = rustc_hash::FxHashMap::default();
        for &(k, c) in deps {
            dep_map.insert(k.into(), VectorClock::from_pairs([("c1".into(), c)]));
        }
        CrossCausalValue::new(
            VectorClock::from_pairs([("c1".into(), counter)]),
            dep_map,
            PayloadSet::single(counter.to_string().into_bytes()),
        )
    }

    #[test]
    fn dominates_checks_local_version() {
        let mut store = CausalCutStore::new();
        store.merge_in("a".into(), &Arc::new(ccv(3, &[])));
        assert!(store.dominates("a", &VectorClock::from_pairs([("c1".into(), 2)])));
        assert!(!store.dominates("a", &VectorClock::from_pairs([("c1".into(), 4)])));
        assert!(!store.dominates("missing", &VectorClock::new()));
    }

    #[test]
    fn assert_closed_passes_for_a_valid_cut() {
        let mut store = CausalCutStore::new();
        store.merge_in("b".into(), &Arc::new(ccv(3, &[])));
        store.merge_in("a".into(), &Arc::new(ccv(1, &[("b", 2)])));
        store.assert_closed();
    }

    #[test]
    #[should_panic(expected = "causal cut not closed")]
    fn assert_closed_panics_on_missing_dependency() {
        let mut store = CausalCutStore::new();
        store.merge_in("a".into(), &Arc::new(ccv(1, &[("b", 2)])));
        store.assert_closed();
    }
}
