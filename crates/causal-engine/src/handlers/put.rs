use crate::io::KvsAsyncClient;
use crate::wire::{CausalRequest, ConsistencyType};
use crate::CausalCache;

impl CausalCache {
    /// Spec §4.2/§4.3 `put_request_handler`: every write updates the
    /// unmerged store unconditionally; a CROSS-consistency write also folds
    /// straight into the causal cut and gets a version pinned immediately,
    /// since the client that wrote it trivially causally depends on its own
    /// write. Every tuple is additionally mirrored to the backing KVS.
    pub fn handle_put(&mut self, request: CausalRequest, kvs: &mut dyn KvsAsyncClient) {
        for tuple in request.tuples {
            let Some(value) = tuple.payload else { continue };
            let key = tuple.key;

            let merged = self.unmerged.observe(key.clone(), value.clone());

            if request.consistency == ConsistencyType::Cross {
                self.causal_cut.merge_in(key.clone(), &merged);
                self.version_store.pin(&request.client_id, key.clone(), merged.clone());
            }

            if let Ok(request_id) = kvs.put_async(&key, &merged) {
                self.request_id_to_address.insert(request_id, request.response_address.clone());
            }
        }
    }
}
