use crate::io::{KvsAsyncClient, Transport};
use crate::metadata::{ClientState, PendingClientMetadata};
use crate::wire::{CausalRequest, CausalResponse, CausalTuple, ConsistencyType};
use crate::CausalCache;
use causal_clock::VectorClock;
use causal_store::{Address, Key};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::error;

/// Folds `vc` for `key` into `frontier`, keeping only the antichain of
/// maximal versions cited so far (spec §4.4a `populate_causal_frontier`): a
/// dominated candidate is dropped, a dominating one replaces everything it
/// dominates, and incomparable versions all survive.
fn populate_causal_frontier(key: &Key, vc: VectorClock, frontier: &mut FxHashMap<Key, Vec<VectorClock>>) {
    let entry = frontier.entry(key.clone()).or_default();
    if entry.iter().any(|existing| existing.dominates_or_equal(&vc)) {
        return;
    }
    entry.retain(|existing| !vc.dominates_or_equal(existing));
    entry.push(vc);
}

impl CausalCache {
    pub fn handle_get(&mut self, request: CausalRequest, kvs: &mut dyn KvsAsyncClient, net: &mut dyn Transport) {
        match request.consistency {
            ConsistencyType::Single => self.handle_single_get(request, kvs, net),
            ConsistencyType::Cross => self.handle_cross_get(request, kvs, net),
        }
    }

    fn handle_single_get(&mut self, request: CausalRequest, kvs: &mut dyn KvsAsyncClient, net: &mut dyn Transport) {
        let mut covered_locally = true;
        let mut read_set = FxHashSet::default();
        let mut to_cover = FxHashSet::default();

        for tuple in &request.tuples {
            let key = tuple.key.clone();
            read_set.insert(key.clone());
            if !self.unmerged.contains_key(&key) {
                covered_locally = false;
                to_cover.insert(key.clone());
                self.single_callback.add(key.clone(), request.response_address.clone());
                let _ = kvs.get_async(&key);
            }
        }

        if !covered_locally {
            self.pending_single.insert(
                request.response_address.clone(),
                PendingClientMetadata::new(request.client_id.clone(), read_set, to_cover),
            );
            return;
        }

        let response = self.build_single_response(&read_set);
        self.send_response(&request.response_address, response, net);
    }

    pub(crate) fn build_single_response(&self, read_set: &FxHashSet<Key>) -> CausalResponse {
        let tuples = read_set
            .iter()
            .map(|key| match self.unmerged.get(key) {
                Some(value) => CausalTuple::found(key.clone(), (**value).clone()),
                None => CausalTuple::dne(key.clone()),
            })
            .collect();
        CausalResponse { tuples, ..Default::default() }
    }

    fn handle_cross_get(&mut self, request: CausalRequest, kvs: &mut dyn KvsAsyncClient, net: &mut dyn Transport) {
        let addr = request.response_address.clone();

        let mut frontier: FxHashMap<Key, Vec<VectorClock>> = FxHashMap::default();
        for keys in request.versioned_key_locations.values() {
            for vk in keys {
                populate_causal_frontier(&vk.key, vk.vector_clock.clone(), &mut frontier);
            }
        }

        let mut metadata = PendingClientMetadata::new(request.client_id.clone(), FxHashSet::default(), FxHashSet::default());
        for (remote_addr, keys) in request.versioned_key_locations.iter() {
            for vk in keys {
                if frontier.get(&vk.key).map(|f| f.contains(&vk.vector_clock)).unwrap_or(false) {
                    metadata
                        .prior_causal_chains
                        .entry(remote_addr.clone())
                        .or_default()
                        .insert(vk.key.clone(), vk.vector_clock.clone());
                }
            }
        }
        metadata.future_read_set = request.future_read_set.iter().cloned().collect();

        let mut read_set = FxHashSet::default();
        let mut to_cover = FxHashSet::default();

        self.pending_cross.insert(addr.clone(), metadata);

        for tuple in &request.tuples {
            let key = tuple.key.clone();
            read_set.insert(key.clone());

            if self.causal_cut.contains_key(&key) || frontier.contains_key(&key) {
                continue;
            }

            if self.in_prep.contains(&key) {
                to_cover.insert(key.clone());
                self.in_prep.add_waiter(&key, addr.clone());
                continue;
            }

            let root = self.in_prep.find_dominating(&key, &VectorClock::new()).or_else(|| self.unmerged.get(&key).cloned());

            if let Some(root) = root {
                let fetches = self.resolver.resolve(
                    &key,
                    &root,
                    &self.causal_cut,
                    &self.unmerged,
                    &mut self.in_prep,
                    &mut self.to_fetch,
                    &mut self.cover,
                    self.tick,
                );
                for dep in &fetches {
                    let _ = kvs.get_async(dep);
                }
                if self.to_fetch.is_empty_for(&key) {
                    self.to_fetch.close(&key);
                    self.promote_and_notify(&key, net);
                } else {
                    self.in_prep.add_waiter(&key, addr.clone());
                    to_cover.insert(key.clone());
                }
            } else {
                self.in_prep.add_waiter(&key, addr.clone());
                to_cover.insert(key.clone());
                let _ = kvs.get_async(&key);
            }
        }

        let ready = if let Some(meta) = self.pending_cross.get_mut(&addr) {
            meta.read_set = read_set;
            meta.to_cover_set = to_cover;
            if meta.to_cover_set.is_empty() {
                meta.state = ClientState::Ready;
                true
            } else {
                false
            }
        } else {
            false
        };
        if ready {
            self.finish_cross_request(&addr, net);
        }
    }

    /// Promotes `key`'s completed in-preparation closure into the causal
    /// cut and notifies every address that was waiting on it (spec §4.6
    /// `merge_into_causal_cut`), recursing into whichever of those requests
    /// just became fully covered.
    pub(crate) fn promote_and_notify(&mut self, key: &str, net: &mut dyn Transport) {
        let waiters: Vec<Address> = self.in_prep.get(key).map(|e| e.waiters.iter().cloned().collect()).unwrap_or_default();
        let outcome = causal_resolver::promote(key, &mut self.in_prep, &mut self.causal_cut);

        let mut newly_ready = Vec::new();
        for addr in waiters {
            if let Some(meta) = self.pending_cross.get_mut(&addr) {
                if outcome.head_does_not_exist {
                    meta.dne_set.insert(key.into());
                }
                meta.mark_covered(key);
                if meta.to_cover_set.is_empty() {
                    newly_ready.push(addr);
                }
            }
        }
        for addr in newly_ready {
            self.finish_cross_request(&addr, net);
        }
    }

    /// Spec §4.8: a request that just finished covering its read set either
    /// still needs peer data (`AwaitingRemote`, resolved later by
    /// [`Self::handle_versioned_key_response`]) or can be answered right
    /// away.
    fn finish_cross_request(&mut self, addr: &Address, net: &mut dyn Transport) {
        if self.fire_remote_read_requests(addr, net) {
            if let Some(metadata) = self.pending_cross.get_mut(addr) {
                metadata.state = ClientState::AwaitingRemote;
                self.client_id_to_address.entry(metadata.client_id.clone()).or_default().insert(addr.clone());
            }
        } else {
            self.respond_to_client(addr, net);
        }
    }

    pub(crate) fn send_response(&self, addr: &Address, response: CausalResponse, net: &mut dyn Transport) {
        match crate::wire::encode(&response) {
            Ok(bytes) => {
                if let Err(err) = net.send(addr, bytes) {
                    error!(%err, "failed to send response");
                }
            }
            Err(err) => error!(%err, "failed to encode response"),
        }
    }
}
