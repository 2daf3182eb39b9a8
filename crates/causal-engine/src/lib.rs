//! Request lifecycle manager: the single-threaded event loop that ties the
//! stores and resolver together with the outside world (spec §5).

pub mod config;
pub mod error;
pub mod handlers;
pub mod io;
pub mod metadata;
pub mod migrate;
pub mod report;
pub mod wire;

use causal_clock::ClientId;
use causal_resolver::DependencyResolver;
use causal_store::{Address, CausalCutStore, CoverMap, InPreparationArea, Key, SingleCallbackMap, ToFetchMap, UnmergedStore, VersionStore};
use config::CausalCacheConfig;
use crossbeam_channel::{Receiver, Sender};
use metadata::PendingClientMetadata;
use rustc_hash::{FxHashMap, FxHashSet};
use std::time::Instant;
use wire::{CausalRequest, KvsGetResponse, KvsPutResponse, VersionedKeyRequest, VersionedKeyResponse};

/// One pass of the event loop: at most one message handled per input
/// channel, in a fixed priority order, with no blocking inside any handler
/// (spec §5). Returns whether any message was processed, so callers can
/// back off when the loop goes idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Processed,
    Idle,
}

pub struct CausalCacheChannels {
    pub get_tx: Sender<CausalRequest>,
    pub put_tx: Sender<CausalRequest>,
    pub kvs_get_tx: Sender<KvsGetResponse>,
    pub kvs_put_tx: Sender<KvsPutResponse>,
    pub version_gc_tx: Sender<ClientId>,
    pub peer_request_tx: Sender<VersionedKeyRequest>,
    pub peer_response_tx: Sender<VersionedKeyResponse>,
}

pub struct CausalCache {
    pub(crate) unmerged: UnmergedStore,
    pub(crate) causal_cut: CausalCutStore,
    pub(crate) in_prep: InPreparationArea,
    pub(crate) version_store: VersionStore,
    pub(crate) to_fetch: ToFetchMap,
    pub(crate) cover: CoverMap,
    pub(crate) single_callback: SingleCallbackMap,
    pub(crate) pending_single: FxHashMap<Address, PendingClientMetadata>,
    pub(crate) pending_cross: FxHashMap<Address, PendingClientMetadata>,
    pub(crate) client_id_to_address: FxHashMap<ClientId, FxHashSet<Address>>,
    pub(crate) request_id_to_address: FxHashMap<Box<str>, Address>,
    pub(crate) resolver: DependencyResolver,
    pub(crate) config: CausalCacheConfig,
    pub(crate) tick: u64,
    /// Wall-clock timestamps the migrate/report tickers last fired at
    /// (spec §6): cadence is measured in elapsed real time, never in
    /// event-loop turns, so it stays correct regardless of message
    /// throughput.
    pub(crate) last_migrate_at: Instant,
    pub(crate) last_report_at: Instant,
    /// This node's own address, handed to peers in outgoing
    /// `VersionedKeyRequest`s and echoed back in each `CausalResponse` so
    /// they know where to route follow-up versioned-key lookups.
    pub(crate) self_address: Address,

    get_rx: Receiver<CausalRequest>,
    put_rx: Receiver<CausalRequest>,
    kvs_get_rx: Receiver<KvsGetResponse>,
    kvs_put_rx: Receiver<KvsPutResponse>,
    version_gc_rx: Receiver<ClientId>,
    peer_request_rx: Receiver<VersionedKeyRequest>,
    peer_response_rx: Receiver<VersionedKeyResponse>,
}

impl CausalCache {
    pub fn new(config: CausalCacheConfig, self_address: Address) -> (Self, CausalCacheChannels) {
        let (get_tx, get_rx) = crossbeam_channel::unbounded();
        let (put_tx, put_rx) = crossbeam_channel::unbounded();
        let (kvs_get_tx, kvs_get_rx) = crossbeam_channel::unbounded();
        let (kvs_put_tx, kvs_put_rx) = crossbeam_channel::unbounded();
        let (version_gc_tx, version_gc_rx) = crossbeam_channel::unbounded();
        let (peer_request_tx, peer_request_rx) = crossbeam_channel::unbounded();
        let (peer_response_tx, peer_response_rx) = crossbeam_channel::unbounded();

        let now = Instant::now();
        let cache = Self {
            unmerged: UnmergedStore::new(),
            causal_cut: CausalCutStore::new(),
            in_prep: InPreparationArea::new(),
            version_store: VersionStore::new(),
            to_fetch: ToFetchMap::new(),
            cover: CoverMap::new(),
            single_callback: SingleCallbackMap::new(),
            pending_single: FxHashMap::default(),
            pending_cross: FxHashMap::default(),
            client_id_to_address: FxHashMap::default(),
            request_id_to_address: FxHashMap::default(),
            resolver: DependencyResolver::new(),
            config,
            tick: 0,
            last_migrate_at: now,
            last_report_at: now,
            self_address,
            get_rx,
            put_rx,
            kvs_get_rx,
            kvs_put_rx,
            version_gc_rx,
            peer_request_rx,
            peer_response_rx,
        };
        let channels = CausalCacheChannels {
            get_tx,
            put_tx,
            kvs_get_tx,
            kvs_put_tx,
            version_gc_tx,
            peer_request_tx,
            peer_response_tx,
        };
        (cache, channels)
    }

    /// Drives one turn of the event loop. Channels are polled in the fixed
    /// order GET, PUT, KVS get-response, version-GC, peer versioned-key
    /// request, peer versioned-key response, KVS put-response — matching
    /// the original handler dispatch order. Each handler runs to completion
    /// without blocking; `kvs`/`net` are the injected I/O capabilities. Once
    /// every channel is empty for this turn, the migrate/report tickers are
    /// checked against wall-clock elapsed time, not against how many turns
    /// have run, so their cadence holds regardless of message throughput.
    pub fn run_once(&mut self, kvs: &mut dyn io::KvsAsyncClient, net: &mut dyn io::Transport) -> Turn {
        self.tick += 1;

        if let Ok(request) = self.get_rx.try_recv() {
            self.handle_get(request, kvs, net);
            return Turn::Processed;
        }
        if let Ok(request) = self.put_rx.try_recv() {
            self.handle_put(request, kvs);
            return Turn::Processed;
        }
        if let Ok(response) = self.kvs_get_rx.try_recv() {
            self.handle_kvs_get_response(response, kvs, net);
            return Turn::Processed;
        }
        if let Ok(client_id) = self.version_gc_rx.try_recv() {
            self.version_store.gc(&client_id);
            return Turn::Processed;
        }
        if let Ok(request) = self.peer_request_rx.try_recv() {
            self.handle_versioned_key_request(request, net);
            return Turn::Processed;
        }
        if let Ok(response) = self.peer_response_rx.try_recv() {
            self.handle_versioned_key_response(response, net);
            return Turn::Processed;
        }
        if let Ok(response) = self.kvs_put_rx.try_recv() {
            self.handle_kvs_put_response(response, net);
            return Turn::Processed;
        }

        let now = Instant::now();
        if now.duration_since(self.last_migrate_at) >= self.config.migrate_interval() {
            self.last_migrate_at = now;
            self.run_migration_tick(kvs, net);
            return Turn::Processed;
        }
        if now.duration_since(self.last_report_at) >= self.config.report_interval() {
            self.last_report_at = now;
            return if self.run_report_tick() { Turn::Processed } else { Turn::Idle };
        }

        Turn::Idle
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn causal_cut_len(&self) -> usize {
        self.causal_cut.len()
    }

    pub fn unmerged_len(&self) -> usize {
        self.unmerged.len()
    }
}
