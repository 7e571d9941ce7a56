//! Asset streaming under a memory budget.
//!
//! The [`AssetStreamManager`] diffs each new
//! [`DesiredState`](crate::lod::DesiredState) against what is loaded and in
//! flight, admits loads against a [`MemoryBudget`], evicts stale assets and
//! publishes completed loads atomically per region.
//!
//! # Guarantees
//!
//! - `used <= capacity` after every transaction
//! - at most one in-flight request per region
//! - the asset a region's target points at is never evicted
//! - a region stays visible at its previous level until its replacement is
//!   ready, then switches in one step
//! - loads for obsolete targets are cancelled and their results discarded

mod budget;
mod config;
mod eviction;
mod loader;
mod manager;
mod request;
mod retry;
mod snapshot;

pub use budget::MemoryBudget;
pub use config::{
    StreamConfig, DEFAULT_CAPACITY_BYTES, DEFAULT_LOAD_TIMEOUT, DEFAULT_MAX_DEFERRAL,
};
pub use loader::{
    sha256_hex, AssetLoader, BoxFuture, FileAssetLoader, HttpAssetLoader, LoadError,
    LoadProgress, RendererHandle, SimulatedLoader, DEFAULT_CHUNK_SIZE,
};
pub use manager::AssetStreamManager;
pub use request::StreamRequest;
pub use retry::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS,
};
pub use snapshot::{
    EvictionReason, MemoryUsage, PendingLoad, PendingState, ReconcileReport, RegionStatus,
    StreamEvent, StreamSnapshot,
};
