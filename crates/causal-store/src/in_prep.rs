use crate::Address;
use causal_clock::{CausalOrdering, VectorClock};
use causal_value::{CrossCausalValue, Key};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// One head key's in-flight dependency closure (spec §3): the set of
/// requesters waiting on it, and the partial map of (dependency key →
/// best-known value) assembled so far.
#[derive(Debug, Default)]
pub struct InPrepEntry {
    pub waiters: FxHashSet<Address>,
    pub closure: FxHashMap<Key, Arc<CrossCausalValue>>,
    /// Logical tick (caller-supplied, usually the migration/report tick
    /// counter) at which this head was first opened — used by the stuck
    /// diagnostic in the migration ticker (spec §7 Open Question).
    pub opened_at: u64,
}

/// Heads currently being assembled into a dependency-complete value before
/// promotion to the causal-cut store (spec §3, §4.4, §4.6).
#[derive(Debug, Default)]
pub struct InPreparationArea {
    heads: FxHashMap<Key, InPrepEntry>,
}

impl InPreparationArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, head: &str) -> bool {
        self.heads.contains_key(head)
    }

    pub fn get(&self, head: &str) -> Option<&InPrepEntry> {
        self.heads.get(head)
    }

    pub fn add_waiter(&mut self, head: &str, addr: Address) {
        if let Some(entry) = self.heads.get_mut(head) {
            entry.waiters.insert(addr);
        }
    }

    /// Opens a head entry if absent, seeding its closure with the head's own
    /// best-known value (spec §4.4c). Returns the entry for further
    /// mutation.
    pub fn open(&mut self, head: Key, root: Arc<CrossCausalValue>, tick: u64) -> &mut InPrepEntry {
        self.heads.entry(head.clone()).or_insert_with(|| {
            let mut closure = FxHashMap::default();
            closure.insert(head, root);
            InPrepEntry {
                waiters: FxHashSet::default(),
                closure,
                opened_at: tick,
            }
        })
    }

    /// Spec §4.6 `populate_in_preparation`: merge `value` for `dep_key` into
    /// `head`'s closure. Returns whether the closure changed, which callers
    /// use to decide whether to recurse into `value`'s own dependencies —
    /// this is what bounds the recursion, since the closure only grows in
    /// the lattice and the key/version space is finite.
    pub fn populate(&mut self, head: &str, dep_key: Key, value: Arc<CrossCausalValue>) -> bool {
        let Some(entry) = self.heads.get_mut(head) else {
            return false;
        };
        match entry.closure.get(dep_key.as_ref()) {
            None => {
                entry.closure.insert(dep_key, value);
                true
            }
            Some(current) => match current.causal_order(&value) {
                CausalOrdering::Dominated => {
                    entry.closure.insert(dep_key, value);
                    true
                }
                CausalOrdering::Concurrent => {
                    let merged = current.merged(&value);
                    entry.closure.insert(dep_key, Arc::new(merged));
                    true
                }
                CausalOrdering::DominatesOrEqual => false,
            },
        }
    }

    /// Spec §4.4d tie-break: scan every in-flight closure for a value at
    /// `dep_key` whose clock dominates `required`. The first match is
    /// returned — a non-maximal pick only costs extra resolver work, never
    /// correctness, since `populate` re-merges regardless.
    pub fn find_dominating(&self, dep_key: &str, required: &VectorClock) -> Option<Arc<CrossCausalValue>> {
        self.heads.values().find_map(|entry| {
            entry.closure.get(dep_key).and_then(|v| {
                v.vc.dominates_or_equal(required).then(|| v.clone())
            })
        })
    }

    pub fn remove(&mut self, head: &str) -> Option<InPrepEntry> {
        self.heads.remove(head)
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn heads(&self) -> impl Iterator<Item = &Key> {
        self.heads.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Key, &InPrepEntry)> {
        self.heads.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causal_value::PayloadSet;

    fn ccv(counter: u64) -> Arc<CrossCausalValue> {
        Arc::new(CrossCausalValue::new(
            VectorClock::from_pairs([("c1".into(), counter)]),
            Default::default(),
            PayloadSet::single(counter.to_string().into_bytes()),
        ))
    }

    #[test]
    fn populate_grows_closure_on_new_key() {
        let mut area = InPreparationArea::new();
        area.open("a".into(), ccv(1), 0);
        assert!(area.populate("a", "b".into(), ccv(2)));
        assert_eq!(area.get("a").unwrap().closure.len(), 2);
    }

    #[test]
    fn populate_returns_false_when_already_covered() {
        let mut area = InPreparationArea::new();
        area.open("a".into(), ccv(1), 0);
        area.populate("a", "b".into(), ccv(5));
        assert!(!area.populate("a", "b".into(), ccv(3)));
    }

    #[test]
    fn populate_merges_concurrent_values() {
        let mut area = InPreparationArea::new();
        area.open("a".into(), ccv(1), 0);
        let x = Arc::new(CrossCausalValue::new(
            VectorClock::from_pairs([("c1".into(), 1), ("c2".into(), 0)]),
            Default::default(),
            PayloadSet::single("x".as_bytes()),
        ));
        let y = Arc::new(CrossCausalValue::new(
            VectorClock::from_pairs([("c1".into(), 0), ("c2".into(), 1)]),
            Default::default(),
            PayloadSet::single("y".as_bytes()),
        ));
        area.populate("a", "b".into(), x);
        assert!(area.populate("a", "b".into(), y));
        let merged = area.get("a").unwrap().closure.get("b").unwrap();
        assert_eq!(merged.payload.len(), 2);
    }

    #[test]
    fn find_dominating_scans_all_heads() {
        let mut area = InPreparationArea::new();
        area.open("head1".into(), ccv(1), 0);
        area.populate("head1", "dep".into(), ccv(7));
        let required = VectorClock::from_pairs([("c1".into(), 5)]);
        assert!(area.find_dominating("dep", &required).is_some());
        assert!(area.find_dominating("missing", &required).is_none());
    }
}
