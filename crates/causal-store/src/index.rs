use crate::Address;
use causal_clock::VectorClock;
use causal_value::Key;
use rustc_hash::{FxHashMap, FxHashSet};

/// Forward index: head key → set of dependency keys still missing from its
/// closure (spec §3 `F`). A head is ready to promote once its set is empty.
#[derive(Debug, Default)]
pub struct ToFetchMap {
    map: FxHashMap<Key, FxHashSet<Key>>,
}

impl ToFetchMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, head: Key) {
        self.map.entry(head).or_default();
    }

    pub fn add(&mut self, head: &str, dep: Key) {
        self.map.entry(head.into()).or_default().insert(dep);
    }

    pub fn remove(&mut self, head: &str, dep: &str) {
        if let Some(set) = self.map.get_mut(head) {
            set.remove(dep);
        }
    }

    pub fn is_empty_for(&self, head: &str) -> bool {
        self.map.get(head).map(|s| s.is_empty()).unwrap_or(true)
    }

    /// True if `head` has an entry at all (even an empty one), as opposed
    /// to never having been opened. Distinguishes "just opened, no
    /// dependencies registered yet" from "never seen" — needed to detect
    /// the KVS response for a directly-queried head, whose closure has not
    /// been walked yet when the response arrives.
    pub fn has_head(&self, head: &str) -> bool {
        self.map.contains_key(head)
    }

    pub fn contains(&self, head: &str, dep: &str) -> bool {
        self.map.get(head).map(|s| s.contains(dep)).unwrap_or(false)
    }

    pub fn close(&mut self, head: &str) {
        self.map.remove(head);
    }
}

/// Reverse index: dependency key → (required vector clock → set of heads
/// waiting on that exact version) (spec §3 `X`). Consulted whenever a KVS
/// response arrives for a key that some head is blocked on.
#[derive(Debug, Default)]
pub struct CoverMap {
    map: FxHashMap<Key, FxHashMap<VectorClock, FxHashSet<Key>>>,
}

impl CoverMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dep_key: Key, required: VectorClock, head: Key) {
        self.map
            .entry(dep_key)
            .or_default()
            .entry(required)
            .or_default()
            .insert(head);
    }

    pub fn entries_for(&self, dep_key: &str) -> Option<&FxHashMap<VectorClock, FxHashSet<Key>>> {
        self.map.get(dep_key)
    }

    pub fn remove_version(&mut self, dep_key: &str, required: &VectorClock) {
        if let Some(by_version) = self.map.get_mut(dep_key) {
            by_version.remove(required);
            if by_version.is_empty() {
                self.map.remove(dep_key);
            }
        }
    }

    pub fn is_empty_for(&self, dep_key: &str) -> bool {
        self.map.get(dep_key).map(|m| m.is_empty()).unwrap_or(true)
    }
}

/// Callbacks for SINGLE-consistency GETs blocked on a key missing from the
/// unmerged store (spec §4.3).
#[derive(Debug, Default)]
pub struct SingleCallbackMap {
    map: FxHashMap<Key, FxHashSet<Address>>,
}

impl SingleCallbackMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: Key, addr: Address) {
        self.map.entry(key).or_default().insert(addr);
    }

    pub fn take(&mut self, key: &str) -> FxHashSet<Address> {
        self.map.remove(key).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_fetch_map_tracks_completion() {
        let mut f = ToFetchMap::new();
        f.open("a".into());
        f.add("a", "b".into());
        assert!(!f.is_empty_for("a"));
        f.remove("a", "b");
        assert!(f.is_empty_for("a"));
    }

    #[test]
    fn cover_map_groups_heads_by_required_version() {
        let mut cover = CoverMap::new();
        let vc = VectorClock::from_pairs([("c1".into(), 3)]);
        cover.add("b".into(), vc.clone(), "a".into());
        cover.add("b".into(), vc.clone(), "a2".into());
        let entries = cover.entries_for("b").unwrap();
        assert_eq!(entries.get(&vc).unwrap().len(), 2);
        cover.remove_version("b", &vc);
        assert!(cover.is_empty_for("b"));
    }
}
