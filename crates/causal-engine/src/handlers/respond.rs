use crate::io::Transport;
use crate::metadata::ClientState;
use crate::wire::{CausalResponse, CausalTuple, VersionedKey, VersionedKeyRequest};
use crate::CausalCache;
use causal_clock::{CausalOrdering, VectorClock};
use causal_store::{Address, Key};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::error;

/// Spec §4.7 `find_address`: of the addresses a client previously cited a
/// version of `key` from, return one whose cited clock strictly dominates
/// `local_vc` — i.e. a remote cache is known to hold something newer than
/// what we have (or than nothing, if we have no local copy at all).
fn find_address_for(key: &Key, local_vc: &VectorClock, prior_causal_chains: &FxHashMap<Address, FxHashMap<Key, VectorClock>>) -> Option<Address> {
    for (addr, keys) in prior_causal_chains.iter() {
        if let Some(remote_vc) = keys.get(key) {
            if local_vc.compare(remote_vc) == CausalOrdering::Dominated {
                return Some(addr.clone());
            }
        }
    }
    None
}

impl CausalCache {
    /// Spec §4.7 `fire_remote_read_requests`: for every key in the read set
    /// that isn't already known to be `dne`, decide whether it can be
    /// answered locally or needs a round trip to whichever peer cache is
    /// known to hold a dominating version. Returns whether any remote
    /// request was sent.
    pub(crate) fn fire_remote_read_requests(&mut self, addr: &Address, net: &mut dyn Transport) -> bool {
        let Some(meta) = self.pending_cross.get(addr) else { return false };
        let client_id = meta.client_id.clone();
        let read_set = meta.read_set.clone();
        let dne_set = meta.dne_set.clone();
        let prior_causal_chains = meta.prior_causal_chains.clone();
        let future_read_set = meta.future_read_set.clone();

        let mut remote_request = false;
        let mut addr_request_map: FxHashMap<Address, Vec<Key>> = FxHashMap::default();
        let mut local_payload = FxHashMap::default();
        let mut remote_keys = FxHashSet::default();

        for key in read_set.iter() {
            if dne_set.contains(key) {
                continue;
            }
            let local_value = self.causal_cut.get(key).cloned();
            match local_value {
                None => {
                    remote_request = true;
                    let remote_addr = find_address_for(key, &VectorClock::new(), &prior_causal_chains);
                    match remote_addr {
                        Some(remote_addr) => {
                            addr_request_map.entry(remote_addr).or_default().push(key.clone());
                            remote_keys.insert(key.clone());
                        }
                        None => error!(%key, "cross-consistency key missing locally with no known remote holder"),
                    }
                }
                Some(value) => {
                    if let Some(remote_addr) = find_address_for(key, &value.vc, &prior_causal_chains) {
                        remote_request = true;
                        addr_request_map.entry(remote_addr).or_default().push(key.clone());
                        remote_keys.insert(key.clone());
                    } else {
                        local_payload.insert(key.clone(), (*value).clone());
                        let mut observed = FxHashSet::default();
                        self.save_versions(&client_id, key, &future_read_set, &mut observed);
                    }
                }
            }
        }

        for (remote_addr, keys) in addr_request_map {
            let request = VersionedKeyRequest {
                client_id: client_id.clone(),
                response_address: self.self_address.clone(),
                keys,
            };
            match crate::wire::encode(&request) {
                Ok(bytes) => {
                    if let Err(err) = net.send(&remote_addr, bytes) {
                        error!(%err, %remote_addr, "failed to send versioned-key request");
                    }
                }
                Err(err) => error!(%err, "failed to encode versioned-key request"),
            }
        }

        if let Some(meta) = self.pending_cross.get_mut(addr) {
            meta.local_payload.extend(local_payload);
            meta.remote_read_set.extend(remote_keys);
        }

        remote_request
    }

    /// Spec §4.8 `save_versions`: pins `key` (if it's in the client's
    /// future read set) and recurses into its dependency closure so a later
    /// read-your-writes GET can cite the exact version this response was
    /// built from. `observed` bounds the recursion against cycles in the
    /// dependency graph.
    pub(crate) fn save_versions(&mut self, client_id: &str, key: &Key, future_read_set: &FxHashSet<Key>, observed: &mut FxHashSet<Key>) {
        if observed.contains(key) {
            return;
        }
        observed.insert(key.clone());
        let Some(value) = self.causal_cut.get(key).cloned() else { return };
        if future_read_set.contains(key) {
            self.version_store.pin(client_id, key.clone(), value.clone());
        }
        let deps: Vec<Key> = value.deps.keys().cloned().collect();
        for dep in deps {
            self.save_versions(client_id, &dep, future_read_set, observed);
        }
    }

    /// Spec §4.8 `respond_to_client`: assembles the final `CausalResponse`
    /// from whatever local/remote payloads were gathered and removes the
    /// pending-request bookkeeping.
    pub(crate) fn respond_to_client(&mut self, addr: &Address, net: &mut dyn Transport) {
        let Some(meta) = self.pending_cross.remove(addr) else { return };
        debug_assert!(
            matches!(meta.state, ClientState::Ready | ClientState::AwaitingRemote),
            "responding to a request that never finished covering its read set"
        );

        let mut tuples = Vec::with_capacity(meta.read_set.len());
        for key in meta.read_set.iter() {
            if meta.dne_set.contains(key) {
                tuples.push(CausalTuple::dne(key.clone()));
            } else if let Some(value) = meta.local_payload.get(key) {
                tuples.push(CausalTuple::found(key.clone(), value.clone()));
            } else if let Some(value) = meta.remote_payload.get(key) {
                tuples.push(CausalTuple::found(key.clone(), value.clone()));
            }
        }

        let versioned_keys = self
            .version_store
            .versions_for(&meta.client_id)
            .map(|versions| versions.iter().map(|(k, v)| VersionedKey { key: k.clone(), vector_clock: v.vc.clone() }).collect())
            .unwrap_or_default();

        let response = CausalResponse {
            tuples,
            versioned_key_query_address: self.self_address.clone(),
            versioned_keys,
        };

        match crate::wire::encode(&response) {
            Ok(bytes) => {
                if let Err(err) = net.send(addr, bytes) {
                    error!(%err, "failed to send causal response");
                }
            }
            Err(err) => error!(%err, "failed to encode causal response"),
        }
    }
}
