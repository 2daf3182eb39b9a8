//! Capability traits the cache needs from the outside world: an async KVS
//! client and a peer/client transport. Both are injected so the request
//! lifecycle manager can run against a fake in tests without a network
//! (spec §6, explicitly out of scope for the wire protocol itself).

use crate::error::KvsError;
use causal_store::{Address, Key};
use causal_value::CrossCausalValue;

/// Fire-and-forget KVS access. Responses arrive later through the engine's
/// own channels ([`crate::CausalCache::handle_kvs_get_response`] /
/// `handle_kvs_put_response`), not as a return value here — the KVS is
/// genuinely asynchronous and the event loop never blocks on it.
pub trait KvsAsyncClient {
    fn get_async(&mut self, key: &Key) -> Result<(), KvsError>;

    /// Returns the request id the eventual put response will carry, so the
    /// caller can map it back to a client response address.
    fn put_async(&mut self, key: &Key, value: &CrossCausalValue) -> Result<Box<str>, KvsError>;
}

/// Sends a serialized message to a client or peer-cache address.
pub trait Transport {
    fn send(&mut self, address: &Address, bytes: Vec<u8>) -> Result<(), KvsError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::collections::VecDeque;

    /// Records every call instead of doing real I/O, for use in handler unit
    /// tests and the crate's integration scenarios.
    #[derive(Debug, Default)]
    pub struct FakeKvs {
        pub gets: Vec<Key>,
        pub puts: Vec<(Key, CrossCausalValue)>,
        next_request_id: u64,
    }

    impl FakeKvs {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl KvsAsyncClient for FakeKvs {
        fn get_async(&mut self, key: &Key) -> Result<(), KvsError> {
            self.gets.push(key.clone());
            Ok(())
        }

        fn put_async(&mut self, key: &Key, value: &CrossCausalValue) -> Result<Box<str>, KvsError> {
            self.puts.push((key.clone(), value.clone()));
            self.next_request_id += 1;
            Ok(self.next_request_id.to_string().into_boxed_str())
        }
    }

    #[derive(Debug, Default)]
    pub struct FakeTransport {
        pub sent: VecDeque<(Address, Vec<u8>)>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Transport for FakeTransport {
        fn send(&mut self, address: &Address, bytes: Vec<u8>) -> Result<(), KvsError> {
            self.sent.push_back((address.clone(), bytes));
            Ok(())
        }
    }
}
