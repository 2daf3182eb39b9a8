use causal_clock::ClientId;
use causal_value::{CrossCausalValue, Key};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Per-client pinned snapshot (spec §3 `V`). Entries are created during
/// response assembly (§4.8 `save_versions`) and deleted wholesale when the
/// client sends a GC token.
#[derive(Debug, Default)]
pub struct VersionStore {
    map: FxHashMap<ClientId, FxHashMap<Key, Arc<CrossCausalValue>>>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `value` for `client_id` under `key`. Pinning never merges: the
    /// whole point is that once recorded, a pin does not change even if the
    /// causal-cut entry for the same key keeps advancing underneath it.
    pub fn pin(&mut self, client_id: &str, key: Key, value: Arc<CrossCausalValue>) {
        self.map
            .entry(client_id.into())
            .or_default()
            .insert(key, value);
    }

    pub fn get(&self, client_id: &str, key: &str) -> Option<&Arc<CrossCausalValue>> {
        self.map.get(client_id).and_then(|m| m.get(key))
    }

    pub fn versions_for(&self, client_id: &str) -> Option<&FxHashMap<Key, Arc<CrossCausalValue>>> {
        self.map.get(client_id)
    }

    /// Release every version pinned for `client_id` (spec §3, version-GC).
    pub fn gc(&mut self, client_id: &str) {
        self.map.remove(client_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causal_clock::VectorClock;
    use causal_value::PayloadSet;

    #[test]
    fn pin_then_gc_clears_everything_for_that_client() {
        let mut versions = VersionStore::new();
        let v = Arc::new(CrossCausalValue::new(
            VectorClock::from_pairs([("c1".into(), 1)]),
            Default::default(),
            PayloadSet::single("x".as_bytes()),
        ));
        versions.pin("client-1", "a".into(), v.clone());
        assert!(versions.get("client-1", "a").is_some());
        versions.gc("client-1");
        assert!(versions.get("client-1", "a").is_none());
    }

    #[test]
    fn pinning_does_not_disturb_other_clients() {
        let mut versions = VersionStore::new();
        let v = Arc::new(CrossCausalValue::new(
            VectorClock::from_pairs([("c1".into(), 1)]),
            Default::default(),
            PayloadSet::single("x".as_bytes()),
        ));
        versions.pin("client-1", "a".into(), v.clone());
        versions.pin("client-2", "a".into(), v);
        versions.gc("client-1");
        assert!(versions.get("client-2", "a").is_some());
    }
}
