use crate::io::{KvsAsyncClient, Transport};
use crate::CausalCache;
use causal_clock::VectorClock;
use causal_store::Key;
use causal_value::CrossCausalValue;
use std::sync::Arc;
use tracing::{debug, warn};

impl CausalCache {
    /// Spec §4.10 `periodic_migration_handler`: sweeps the unmerged store
    /// for keys that haven't made it into the causal cut and aren't
    /// already being resolved, and starts the same dependency-closure walk
    /// a direct GET would have triggered. Resolves Open Question 1 (spec
    /// §9): migration passes the unmerged store's own values into
    /// promotion rather than re-fetching them, since they're already
    /// locally known to be at least as new as anything the KVS would hand
    /// back.
    pub(crate) fn run_migration_tick(&mut self, kvs: &mut dyn KvsAsyncClient, net: &mut dyn Transport) {
        let candidates: Vec<(Key, Arc<CrossCausalValue>)> = self
            .unmerged
            .iter()
            .filter(|(key, value)| {
                !self.causal_cut.dominates(key, &value.vc) && self.in_prep.find_dominating(key, &VectorClock::new()).is_none()
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        debug!(candidates = candidates.len(), tick = self.tick, "running migration sweep");

        for (key, value) in candidates {
            if self.in_prep.contains(&key) {
                continue;
            }
            let fetches = self.resolver.resolve(
                &key,
                &value,
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

        self.warn_stuck_heads();
    }

    /// Spec §7 Open Question 4: a head that has sat in the in-preparation
    /// area longer than `stuck_after_ticks` almost certainly has a
    /// dependency the KVS will never produce a response for (evicted,
    /// lost, or a bad reference). `dne` does not propagate through
    /// dependencies, so nothing unblocks these heads automatically — this
    /// is diagnostic only, surfaced as a warning for an operator to chase.
    fn warn_stuck_heads(&self) {
        for (head, entry) in self.in_prep.entries() {
            let age = self.tick.saturating_sub(entry.opened_at);
            if age > self.config.stuck_after_ticks {
                warn!(%head, age, waiters = entry.waiters.len(), closure_len = entry.closure.len(), "head stuck in preparation");
            }
        }
    }
}
