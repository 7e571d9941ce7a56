//! In-flight load bookkeeping.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::loader::{LoadError, LoadProgress, RendererHandle};
use crate::catalog::{AssetDescriptor, AssetKey, RegionId};
use crate::lod::RegionPriority;

/// A pending or in-flight load of one asset. At most one exists per region.
#[derive(Debug)]
pub struct StreamRequest {
    pub id: u64,
    pub asset: AssetDescriptor,
    pub priority: RegionPriority,
    /// Region generation at issue time. Only a completion carrying the
    /// region's current generation is published.
    pub generation: u64,
    pub cancel: CancellationToken,
    pub progress: LoadProgress,
    pub issued_at: Instant,
    /// Loading a coarser level because the desired one failed.
    pub fallback: bool,
}

impl StreamRequest {
    pub fn key(&self) -> AssetKey {
        self.asset.key()
    }

    pub fn size_bytes(&self) -> u64 {
        self.asset.size_bytes
    }
}

/// Message sent by a load task when it finishes.
#[derive(Debug)]
pub(crate) struct Completion {
    pub region: RegionId,
    pub request_id: u64,
    pub generation: u64,
    pub key: AssetKey,
    pub result: Result<RendererHandle, LoadError>,
}
