use causal_clock::{ClientId, VectorClock};
use causal_store::{Address, Key};
use causal_value::CrossCausalValue;
use rustc_hash::{FxHashMap, FxHashSet};

/// Where a CROSS-consistency request sits in its lifecycle (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Still waiting on `to_cover_set` to drain via the dependency resolver.
    AwaitingCover,
    /// Locally resolved; waiting on one or more peer caches for keys whose
    /// causal cut lives elsewhere.
    AwaitingRemote,
    /// Every key is resolved and sourced; ready to respond.
    Ready,
}

/// Bookkeeping for one in-flight CROSS (or SINGLE) request while its read
/// set is still being assembled (spec §4.8, originally `PendingClientMetadata`).
#[derive(Debug, Clone)]
pub struct PendingClientMetadata {
    pub client_id: ClientId,
    pub read_set: FxHashSet<Key>,
    pub to_cover_set: FxHashSet<Key>,
    pub future_read_set: FxHashSet<Key>,
    /// address -> key -> vector clock, from the client's previous response.
    pub prior_causal_chains: FxHashMap<Address, FxHashMap<Key, VectorClock>>,
    pub dne_set: FxHashSet<Key>,
    pub remote_read_set: FxHashSet<Key>,
    pub local_payload: FxHashMap<Key, CrossCausalValue>,
    pub remote_payload: FxHashMap<Key, CrossCausalValue>,
    pub state: ClientState,
}

impl PendingClientMetadata {
    pub fn new(client_id: ClientId, read_set: FxHashSet<Key>, to_cover_set: FxHashSet<Key>) -> Self {
        Self {
            client_id,
            read_set,
            to_cover_set,
            future_read_set: FxHashSet::default(),
            prior_causal_chains: FxHashMap::default(),
            dne_set: FxHashSet::default(),
            remote_read_set: FxHashSet::default(),
            local_payload: FxHashMap::default(),
            remote_payload: FxHashMap::default(),
            state: ClientState::AwaitingCover,
        }
    }

    pub fn mark_covered(&mut self, key: &str) {
        self.to_cover_set.remove(key);
        if self.to_cover_set.is_empty() {
            self.state = ClientState::Ready;
        }
    }
}
