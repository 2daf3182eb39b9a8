use crate::io::Transport;
use crate::metadata::ClientState;
use crate::wire::{CausalTuple, VersionedKeyRequest, VersionedKeyResponse};
use crate::CausalCache;
use tracing::error;

impl CausalCache {
    /// Spec §4.8 `versioned_key_request_handler`: another cache node wants
    /// the exact pinned versions this node promised a client it held.
    pub fn handle_versioned_key_request(&mut self, request: VersionedKeyRequest, net: &mut dyn Transport) {
        let mut tuples = Vec::with_capacity(request.keys.len());
        match self.version_store.versions_for(&request.client_id) {
            Some(versions) => {
                for key in &request.keys {
                    match versions.get(key) {
                        Some(value) => tuples.push(CausalTuple::found(key.clone(), (**value).clone())),
                        None => error!(client_id = %request.client_id, %key, "requested key not available in versioned store"),
                    }
                }
            }
            None => error!(client_id = %request.client_id, "client id not available in versioned store"),
        }

        let response = VersionedKeyResponse { client_id: request.client_id, tuples };
        match crate::wire::encode(&response) {
            Ok(bytes) => {
                if let Err(err) = net.send(&request.response_address, bytes) {
                    error!(%err, "failed to send versioned-key response");
                }
            }
            Err(err) => error!(%err, "failed to encode versioned-key response"),
        }
    }

    /// Spec §4.8 `versioned_key_response_handler`: a remote cache answered
    /// one of our `fire_remote_read_requests` queries. Once every address
    /// this client's request fanned out to has answered, the client's
    /// response is finally assembled and sent.
    pub fn handle_versioned_key_response(&mut self, response: VersionedKeyResponse, net: &mut dyn Transport) {
        let Some(addrs) = self.client_id_to_address.get(&response.client_id).cloned() else { return };

        let mut finished = Vec::new();
        for addr in addrs.iter() {
            let Some(meta) = self.pending_cross.get_mut(addr) else { continue };
            for tuple in &response.tuples {
                if meta.remote_read_set.remove(&tuple.key) {
                    if let Some(value) = &tuple.payload {
                        meta.remote_payload.insert(tuple.key.clone(), value.clone());
                    }
                }
            }
            if meta.remote_read_set.is_empty() {
                meta.state = ClientState::Ready;
                finished.push(addr.clone());
            }
        }

        for addr in &finished {
            self.respond_to_client(addr, net);
        }
        self.gc_client_id_to_address(&response.client_id, &finished);
    }

    fn gc_client_id_to_address(&mut self, client_id: &str, finished: &[causal_store::Address]) {
        if let Some(addrs) = self.client_id_to_address.get_mut(client_id) {
            for addr in finished {
                addrs.remove(addr);
            }
            if addrs.is_empty() {
                self.client_id_to_address.remove(client_id);
            }
        }
    }
}
