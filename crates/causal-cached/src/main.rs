use causal_engine::config::CausalCacheConfig;
use causal_engine::io::{KvsAsyncClient, Transport};
use causal_engine::{CausalCache, Turn};
use std::time::Duration;
use tracing::info;

/// Placeholder KVS/transport bindings until a concrete backend (ZeroMQ,
/// gRPC, whatever the deployment calls for) is wired in. The event loop
/// itself is fully functional against any implementation of these traits;
/// this crate only owns process bootstrap.
mod noop_io {
    use causal_engine::error::KvsError;
    use causal_engine::io::{KvsAsyncClient, Transport};
    use causal_store::{Address, Key};
    use causal_value::CrossCausalValue;
    use tracing::warn;

    #[derive(Default)]
    pub struct NoopKvs;

    impl KvsAsyncClient for NoopKvs {
        fn get_async(&mut self, key: &Key) -> Result<(), KvsError> {
            warn!(%key, "no KVS backend configured, dropping GET");
            Ok(())
        }

        fn put_async(&mut self, key: &Key, _value: &CrossCausalValue) -> Result<Box<str>, KvsError> {
            warn!(%key, "no KVS backend configured, dropping PUT");
            Ok(Box::from("noop"))
        }
    }

    #[derive(Default)]
    pub struct NoopTransport;

    impl Transport for NoopTransport {
        fn send(&mut self, address: &Address, bytes: Vec<u8>) -> Result<(), KvsError> {
            warn!(%address, bytes = bytes.len(), "no transport configured, dropping outbound message");
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config_path = std::env::var("CAUSAL_CACHE_CONFIG").unwrap_or_else(|_| "conf/causal-cache.yml".to_string());
    let config = CausalCacheConfig::load(&config_path).unwrap_or_else(|err| {
        tracing::warn!(%err, path = %config_path, "failed to load config, using defaults");
        CausalCacheConfig::default()
    });

    let self_address: Box<str> = std::env::var("CAUSAL_CACHE_SELF_ADDRESS").unwrap_or_else(|_| "tcp://127.0.0.1:6560".to_string()).into();

    let (mut cache, _channels) = CausalCache::new(config, self_address);
    let mut kvs = noop_io::NoopKvs::default();
    let mut net = noop_io::NoopTransport::default();

    info!("causal cache event loop starting");
    run_event_loop(&mut cache, &mut kvs, &mut net);
}

fn run_event_loop(cache: &mut CausalCache, kvs: &mut dyn KvsAsyncClient, net: &mut dyn Transport) {
    loop {
        match cache.run_once(kvs, net) {
            Turn::Processed => {}
            Turn::Idle => std::thread::sleep(Duration::from_millis(1)),
        }
    }
}
