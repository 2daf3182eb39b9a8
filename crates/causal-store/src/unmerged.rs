use crate::Key;
use causal_value::CrossCausalValue;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Latest observed value per key, irrespective of whether its dependencies
/// are present (spec §3/§4.2). `U[k]` never goes backward: [`observe`]
/// always merges into whatever is already there.
#[derive(Debug, Default)]
pub struct UnmergedStore {
    map: FxHashMap<Key, Arc<CrossCausalValue>>,
}

impl UnmergedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<CrossCausalValue>> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Arc<CrossCausalValue>)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Removes `key`, for use by an [`crate::eviction::EvictionPolicy`]
    /// caller. `referenced_by_in_prep` must be false — safety rule 1 from
    /// [`crate::eviction`] forbids evicting a `U[key]` some in-preparation
    /// closure still references.
    pub fn evict(&mut self, key: &str, referenced_by_in_prep: bool) -> Option<Arc<CrossCausalValue>> {
        debug_assert!(!referenced_by_in_prep, "evicting {key} while an in-preparation closure still references it");
        self.map.remove(key)
    }

    /// Merge `value` into `U[key]`, inserting if absent. Returns the
    /// resulting (shared) value.
    pub fn observe(&mut self, key: Key, value: CrossCausalValue) -> Arc<CrossCausalValue> {
        match self.map.get(&key) {
            Some(existing) => {
                let merged = existing.merged(&value);
                let handle = Arc::new(merged);
                self.map.insert(key, handle.clone());
                handle
            }
            None => {
                let handle = Arc::new(value);
                self.map.insert(key, handle.clone());
                handle
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causal_clock::VectorClock;
    use causal_value::PayloadSet;

    fn value(counter: u64) -> CrossCausalValue {
        CrossCausalValue::new(
            VectorClock::from_pairs([("c1".into(), counter)]),
            Default::default(),
            PayloadSet::single(counter.to_string().into_bytes()),
        )
    }

    #[test]
    fn observe_is_monotone() {
        let mut store = UnmergedStore::new();
        store.observe("a".into(), value(1));
        let v1 = store.get("a").unwrap().vc.get("c1");
        store.observe("a".into(), value(2));
        let v2 = store.get("a").unwrap().vc.get("c1");
        assert!(v2 >= v1);
        assert_eq!(v2, 2);
    }

    #[test]
    fn observing_an_older_value_does_not_regress() {
        let mut store = UnmergedStore::new();
        store.observe("a".into(), value(5));
        store.observe("a".into(), value(1));
        assert_eq!(store.get("a").unwrap().vc.get("c1"), 5);
    }
}
