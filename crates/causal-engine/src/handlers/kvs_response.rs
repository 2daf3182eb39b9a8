use crate::io::{KvsAsyncClient, Transport};
use crate::wire::{CausalResponse, CausalTuple, KvsGetResponse, KvsPutResponse};
use crate::CausalCache;

impl CausalCache {
    /// Spec §4.9 `process_response` (GET branch): folds the fetched value
    /// into the unmerged store, wakes up any SINGLE-consistency waiters,
    /// resumes the directly-queried head (if this was one), and checks
    /// whether this key's arrival completes any other head's dependency
    /// closure via the cover map.
    pub fn handle_kvs_get_response(&mut self, response: KvsGetResponse, kvs: &mut dyn KvsAsyncClient, net: &mut dyn Transport) {
        let key = response.key;
        let existed_before = self.unmerged.contains_key(&key);
        let merged = self.unmerged.observe(key.clone(), response.value);

        if !existed_before {
            self.notify_single_waiters(&key, net);
        }

        if self.to_fetch.has_head(&key) && self.to_fetch.is_empty_for(&key) {
            let fetches = self.resolver.resolve(
                &key,
                &merged,
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
            }
        }

        self.satisfy_cover_waiters(&key, &merged, kvs, net);
    }

    fn notify_single_waiters(&mut self, key: &causal_store::Key, net: &mut dyn Transport) {
        let waiters = self.single_callback.take(key);
        for addr in waiters {
            let Some(meta) = self.pending_single.get_mut(&addr) else { continue };
            meta.mark_covered(key);
            if meta.to_cover_set.is_empty() {
                let read_set = meta.read_set.clone();
                self.pending_single.remove(&addr);
                let response = self.build_single_response(&read_set);
                self.send_response(&addr, response, net);
            }
        }
    }

    /// Spec §4.9 cover-map sweep: `key` may be the exact version some other
    /// in-flight head was blocked on. Every satisfied group is resumed
    /// through the resolver, which may itself uncover further fetches or
    /// complete the head outright.
    fn satisfy_cover_waiters(&mut self, key: &causal_store::Key, arrived: &std::sync::Arc<causal_value::CrossCausalValue>, kvs: &mut dyn KvsAsyncClient, net: &mut dyn Transport) {
        let Some(groups) = self.cover.entries_for(key) else { return };
        let groups: Vec<(causal_clock::VectorClock, Vec<causal_store::Key>)> =
            groups.iter().map(|(vc, heads)| (vc.clone(), heads.iter().cloned().collect())).collect();

        for (required, heads) in groups {
            if !arrived.vc.dominates_or_equal(&required) {
                continue;
            }
            self.cover.remove_version(key, &required);
            for head in heads {
                let mut fetches = Vec::new();
                self.resolver.resume_for_arrival(
                    &head,
                    key,
                    arrived,
                    &self.causal_cut,
                    &self.unmerged,
                    &mut self.in_prep,
                    &mut self.to_fetch,
                    &mut self.cover,
                    &mut fetches,
                );
                for dep in &fetches {
                    let _ = kvs.get_async(dep);
                }
                self.to_fetch.remove(&head, key);
                if self.to_fetch.is_empty_for(&head) {
                    self.to_fetch.close(&head);
                    self.promote_and_notify(&head, net);
                }
            }
        }
    }

    /// Spec §4.9 (PUT branch): either retry the put (handled by the
    /// `KvsAsyncClient` impl on timeout, out of scope here) or forward the
    /// ack to whichever client originally issued it.
    pub fn handle_kvs_put_response(&mut self, response: KvsPutResponse, net: &mut dyn Transport) {
        let Some(addr) = self.request_id_to_address.remove(&response.request_id) else {
            tracing::error!(request_id = %response.request_id, "missing request id -> address entry for PUT response");
            return;
        };
        let ack = CausalResponse { tuples: vec![CausalTuple::ack(response.key)], ..Default::default() };
        self.send_response(&addr, ack, net);
    }
}
