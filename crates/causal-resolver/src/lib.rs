//! Recursive dependency-closure resolution (spec §4.4–§4.6).
//!
//! Given a head key's cross-causal value, [`DependencyResolver::resolve`]
//! walks its one-level `deps` map and, for each dependency, classifies it as
//! already satisfied (causal cut), satisfiable from another in-flight
//! closure or the unmerged store, or genuinely missing. Satisfied
//! dependencies are folded into the head's closure and recursed into, since
//! they may carry their own further dependencies; missing ones are recorded
//! in the to-fetch/cover indices and returned to the caller, which owns all
//! KVS I/O.

use causal_clock::VectorClock;
use causal_store::{CausalCutStore, CoverMap, InPreparationArea, Key, ToFetchMap, UnmergedStore};
use causal_value::CrossCausalValue;
use std::sync::Arc;

pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Opens (or reuses) `head`'s in-preparation entry and walks its
    /// dependency closure. Returns the dependency keys that had to be sent
    /// to the KVS because no local store could satisfy them — the caller
    /// issues one async GET per returned key.
    pub fn resolve(
        &self,
        head: &Key,
        value: &Arc<CrossCausalValue>,
        causal_cut: &CausalCutStore,
        unmerged: &UnmergedStore,
        in_prep: &mut InPreparationArea,
        to_fetch: &mut ToFetchMap,
        cover: &mut CoverMap,
        tick: u64,
    ) -> Vec<Key> {
        in_prep.open(head.clone(), value.clone(), tick);
        to_fetch.open(head.clone());
        let mut fetches = Vec::new();
        self.check(head, value, causal_cut, unmerged, in_prep, to_fetch, cover, &mut fetches);
        fetches
    }

    /// Re-enters the walk for a dependency value that just arrived from the
    /// KVS (spec §4.9 `process_response`): any head waiting on exactly this
    /// version gets its closure populated and, if that changed anything,
    /// recursed into again.
    pub fn resume_for_arrival(
        &self,
        head: &Key,
        dep_key: &Key,
        dep_value: &Arc<CrossCausalValue>,
        causal_cut: &CausalCutStore,
        unmerged: &UnmergedStore,
        in_prep: &mut InPreparationArea,
        to_fetch: &mut ToFetchMap,
        cover: &mut CoverMap,
        fetches: &mut Vec<Key>,
    ) {
        if in_prep.populate(head, dep_key.clone(), dep_value.clone()) {
            self.check(head, dep_value, causal_cut, unmerged, in_prep, to_fetch, cover, fetches);
        }
    }

    fn check(
        &self,
        head: &Key,
        lattice: &Arc<CrossCausalValue>,
        causal_cut: &CausalCutStore,
        unmerged: &UnmergedStore,
        in_prep: &mut InPreparationArea,
        to_fetch: &mut ToFetchMap,
        cover: &mut CoverMap,
        fetches: &mut Vec<Key>,
    ) {
        for (dep_key, dep_vc) in lattice.deps.iter() {
            if causal_cut.dominates(dep_key, dep_vc) {
                continue;
            }
            if let Some(target) = in_prep.find_dominating(dep_key, dep_vc) {
                if in_prep.populate(head, dep_key.clone(), target.clone()) {
                    self.check(head, &target, causal_cut, unmerged, in_prep, to_fetch, cover, fetches);
                }
                continue;
            }
            if let Some(um) = unmerged.get(dep_key) {
                if um.vc.dominates_or_equal(dep_vc) {
                    let um = um.clone();
                    if in_prep.populate(head, dep_key.clone(), um.clone()) {
                        self.check(head, &um, causal_cut, unmerged, in_prep, to_fetch, cover, fetches);
                    }
                    continue;
                }
            }
            to_fetch.add(head, dep_key.clone());
            cover.add(dep_key.clone(), dep_vc.clone(), head.clone());
            fetches.push(dep_key.clone());
        }
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of folding a completed in-preparation closure into the causal cut
/// (spec §4.6 `merge_into_causal_cut`).
pub struct PromoteOutcome {
    /// True if any member of the closure turned out to not exist — per spec
    /// §7, this marks the *head* key as `dne` for the waiting clients, it
    /// does not propagate further through the dependency graph.
    pub head_does_not_exist: bool,
}

/// Merges every member of `head`'s completed in-preparation closure into the
/// causal-cut store and removes the closure. Callers must only invoke this
/// once [`ToFetchMap::is_empty_for`] is true for `head`.
pub fn promote(head: &str, in_prep: &mut InPreparationArea, causal_cut: &mut CausalCutStore) -> PromoteOutcome {
    let mut head_does_not_exist = false;
    if let Some(entry) = in_prep.get(head) {
        for (key, value) in entry.closure.iter() {
            if value.exists() {
                causal_cut.merge_in(key.clone(), value);
            } else if key.as_ref() == head {
                head_does_not_exist = true;
            }
        }
    }
    in_prep.remove(head);
    PromoteOutcome { head_does_not_exist }
}

/// Spec §4.7 `find_address`: scans a client's previously observed remote
/// causal chains for a version of `key` that dominates `local_vc`, meaning a
/// strictly newer copy is known to live on a remote node. Returns `None`
/// when the local copy (or no copy) is as good as it gets.
pub fn find_remote_with_newer_version<'a, I>(
    key: &str,
    local_vc: &VectorClock,
    prior_causal_chains: I,
) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a causal_store::Address, &'a VectorClock)>,
{
    for (chain_key, address, remote_vc) in prior_causal_chains {
        if chain_key == key && remote_vc.compare(local_vc) == causal_clock::CausalOrdering::Dominated {
            return Some(address.as_ref());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use causal_value::PayloadSet;
    use rustc_hash::FxHashMap;

    fn value(counter: u64, deps: &[(&str, u64)]) -> Arc<CrossCausalValue> {
        let mut dep_map = FxHashMap::default();
        for &(k, c) in deps {
            dep_map.insert(k.into(), VectorClock::from_pairs([("c1".into(), c)]));
        }
        Arc::new(CrossCausalValue::new(
            VectorClock::from_pairs([("c1".into(), counter)]),
            dep_map,
            PayloadSet::single(counter.to_string().into_bytes()),
        ))
    }

    #[test]
    fn dependency_already_in_causal_cut_needs_no_fetch() {
        let resolver = DependencyResolver::new();
        let mut causal_cut = CausalCutStore::new();
        causal_cut.merge_in("b".into(), &value(5, &[]));
        let unmerged = UnmergedStore::new();
        let mut in_prep = InPreparationArea::new();
        let mut to_fetch = ToFetchMap::new();
        let mut cover = CoverMap::new();

        let head_value = value(1, &[("b", 2)]);
        let fetches = resolver.resolve(
            &Key::from("a"),
            &head_value,
            &causal_cut,
            &unmerged,
            &mut in_prep,
            &mut to_fetch,
            &mut cover,
            0,
        );
        assert!(fetches.is_empty());
        assert!(to_fetch.is_empty_for("a"));
    }

    #[test]
    fn missing_dependency_is_recorded_for_fetch() {
        let resolver = DependencyResolver::new();
        let causal_cut = CausalCutStore::new();
        let unmerged = UnmergedStore::new();
        let mut in_prep = InPreparationArea::new();
        let mut to_fetch = ToFetchMap::new();
        let mut cover = CoverMap::new();

        let head_value = value(1, &[("b", 2)]);
        let fetches = resolver.resolve(
            &Key::from("a"),
            &head_value,
            &causal_cut,
            &unmerged,
            &mut in_prep,
            &mut to_fetch,
            &mut cover,
            0,
        );
        assert_eq!(fetches, vec![Key::from("b")]);
        assert!(!to_fetch.is_empty_for("a"));
        assert!(cover.entries_for("b").is_some());
    }

    #[test]
    fn transitive_dependency_already_satisfied_recurses_without_fetch() {
        let resolver = DependencyResolver::new();
        let mut causal_cut = CausalCutStore::new();
        causal_cut.merge_in("c".into(), &value(9, &[]));
        let unmerged = UnmergedStore::new();
        let mut in_prep = InPreparationArea::new();
        let mut to_fetch = ToFetchMap::new();
        let mut cover = CoverMap::new();

        // b is in the unmerged store and itself depends on c, which is
        // already in the causal cut.
        let mut unmerged = UnmergedStore::new();
        unmerged.observe("b".into(), (*value(4, &[("c", 1)])).clone());

        let head_value = value(1, &[("b", 2)]);
        let fetches = resolver.resolve(
            &Key::from("a"),
            &head_value,
            &causal_cut,
            &unmerged,
            &mut in_prep,
            &mut to_fetch,
            &mut cover,
            0,
        );
        assert!(fetches.is_empty());
        assert!(to_fetch.is_empty_for("a"));
        assert_eq!(in_prep.get("a").unwrap().closure.len(), 3);
    }

    #[test]
    fn promote_merges_closure_and_detects_does_not_exist() {
        let mut in_prep = InPreparationArea::new();
        in_prep.open("a".into(), Arc::new(CrossCausalValue::does_not_exist()), 0);
        let mut causal_cut = CausalCutStore::new();
        let outcome = promote("a", &mut in_prep, &mut causal_cut);
        assert!(outcome.head_does_not_exist);
        assert!(!in_prep.contains("a"));
    }

    #[test]
    fn promote_merges_real_values_into_causal_cut() {
        let mut in_prep = InPreparationArea::new();
        in_prep.open("a".into(), value(1, &[]), 0);
        in_prep.populate("a", "b".into(), value(3, &[]));
        let mut causal_cut = CausalCutStore::new();
        let outcome = promote("a", &mut in_prep, &mut causal_cut);
        assert!(!outcome.head_does_not_exist);
        assert!(causal_cut.contains_key("a"));
        assert!(causal_cut.contains_key("b"));
    }
}
