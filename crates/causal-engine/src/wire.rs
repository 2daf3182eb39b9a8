//! DTOs exchanged with clients, peer caches and the KVS (spec §6). These are
//! the `bincode`-encoded analogues of the original protobuf request/response
//! pairs, kept as plain structs since there is no cross-language wire
//! compatibility to preserve here.

use causal_clock::{ClientId, VectorClock};
use causal_store::{Address, Key};
use causal_value::CrossCausalValue;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyType {
    Single,
    Cross,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalTuple {
    pub key: Key,
    pub payload: Option<CrossCausalValue>,
    pub does_not_exist: bool,
}

impl CausalTuple {
    pub fn found(key: Key, payload: CrossCausalValue) -> Self {
        Self { key, payload: Some(payload), does_not_exist: false }
    }

    pub fn dne(key: Key) -> Self {
        Self { key, payload: None, does_not_exist: true }
    }

    /// A bare put-acknowledgement: the client only needs to know which key
    /// succeeded, not its resulting value.
    pub fn ack(key: Key) -> Self {
        Self { key, payload: None, does_not_exist: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedKey {
    pub key: Key,
    pub vector_clock: VectorClock,
}

/// A client's GET or PUT request (spec §6). `tuples` carries keys for a GET
/// and key/value pairs for a PUT; the two are kept on the same struct
/// because both travel the same response-address bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalRequest {
    pub client_id: ClientId,
    pub response_address: Address,
    pub consistency: ConsistencyType,
    pub tuples: Vec<CausalTuple>,
    /// Keys the client expects to read later in this session; used to pin
    /// extra versions beyond what was strictly requested (spec §4.8).
    pub future_read_set: Vec<Key>,
    /// Versioned-key citations from a previous response, grouped by the
    /// remote cache that served them (spec §4.7 prior causal chains).
    pub versioned_key_locations: FxHashMap<Address, Vec<VersionedKey>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CausalResponse {
    pub tuples: Vec<CausalTuple>,
    pub versioned_key_query_address: Address,
    pub versioned_keys: Vec<VersionedKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedKeyRequest {
    pub client_id: ClientId,
    pub response_address: Address,
    pub keys: Vec<Key>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedKeyResponse {
    pub client_id: ClientId,
    pub tuples: Vec<CausalTuple>,
}

/// KVS-facing DTOs (spec §6): the cache only ever stores cross-causal
/// lattices, so unlike the client-facing wire types there is no separate
/// lattice-type tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvsGetResponse {
    pub key: Key,
    pub value: CrossCausalValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvsPutResponse {
    pub request_id: Box<str>,
    pub key: Key,
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(value)
}

pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(bytes)
}
