use causal_store::Key;
use thiserror::Error;

/// Errors raised by the request lifecycle manager itself, as opposed to the
/// backing KVS (see [`KvsError`]).
#[derive(Debug, Error)]
pub enum CausalError {
    #[error("request carried an unrecognized consistency level")]
    UnknownConsistency,

    #[error("key {key} is registered under a non cross-causal lattice type")]
    LatticeTypeMismatch { key: Key },

    #[error("no response address on file for request {request_id}")]
    MissingAddressMapping { request_id: Box<str> },

    #[error("client {client_id} requested versioned key {key} we never pinned")]
    PeerKeyMiss { client_id: Box<str>, key: Key },

    #[error(transparent)]
    Kvs(#[from] KvsError),
}

/// Errors surfaced by a [`crate::io::KvsAsyncClient`] or
/// [`crate::io::Transport`] implementation.
#[derive(Debug, Error)]
pub enum KvsError {
    #[error("timed out waiting on key {key}")]
    Timeout { key: Key },

    #[error("transport error: {0}")]
    Transport(Box<str>),
}
