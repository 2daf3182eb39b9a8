//! The four stores and two indices the dependency resolver reads and writes.
//!
//! Every value handed out by a store is an `Arc<CrossCausalValue>` (Design
//! Notes §9: shared ownership, copy-on-merge). A merge never mutates a CCV
//! observers already hold a clone of; it always produces a new merged value
//! and swaps the `Arc` in the owning map. That makes a `VersionStore` pin
//! stable for as long as the pinning client keeps it, even if the same key
//! keeps changing in `CausalCutStore` underneath.

pub mod causal_cut;
pub mod eviction;
pub mod in_prep;
pub mod index;
pub mod unmerged;
pub mod version;

pub use causal_cut::CausalCutStore;
pub use eviction::{EvictionPolicy, LruEviction, NeverEvict};
pub use in_prep::{InPrepEntry, InPreparationArea};
pub use index::{CoverMap, SingleCallbackMap, ToFetchMap};
pub use unmerged::UnmergedStore;
pub use version::VersionStore;

pub use causal_value::Key;

/// An opaque, wire-level response address. Addresses are compared and
/// hashed as plain strings; nothing here interprets their contents.
pub type Address = Box<str>;
