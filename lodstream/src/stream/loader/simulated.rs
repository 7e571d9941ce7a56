//! Latency-model loader for demos and soak runs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use super::{AssetLoader, BoxFuture, HandleAllocator, LoadError, LoadProgress, RendererHandle};
use crate::catalog::{AssetDescriptor, AssetKey};

/// Progress updates per simulated load.
const PROGRESS_STEPS: u32 = 8;

/// Simulates network/decode latency proportional to asset size.
///
/// `duration = latency + size / bytes_per_sec`. Keys registered with
/// [`fail`](Self::fail) always fail with a decode error. Live handles are
/// tracked so leaks show up in soak runs.
#[derive(Debug, Clone)]
pub struct SimulatedLoader {
    latency: Duration,
    bytes_per_sec: u64,
    failing: Arc<RwLock<HashSet<AssetKey>>>,
    live: Arc<DashMap<RendererHandle, AssetKey>>,
    handles: Arc<HandleAllocator>,
}

impl SimulatedLoader {
    pub fn new(latency: Duration, bytes_per_sec: u64) -> Self {
        Self {
            latency,
            bytes_per_sec: bytes_per_sec.max(1),
            failing: Arc::new(RwLock::new(HashSet::new())),
            live: Arc::new(DashMap::new()),
            handles: Arc::new(HandleAllocator::default()),
        }
    }

    /// Make every load of `key` fail.
    pub fn fail(&self, key: AssetKey) {
        self.failing.write().insert(key);
    }

    pub fn heal(&self, key: &AssetKey) {
        self.failing.write().remove(key);
    }

    /// Handles produced and not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    /// Simulated duration for an asset of `size` bytes.
    pub fn duration_for(&self, size: u64) -> Duration {
        let transfer = Duration::from_secs_f64(size as f64 / self.bytes_per_sec as f64);
        self.latency + transfer
    }
}

impl Default for SimulatedLoader {
    /// 40ms latency at 50 MB/s.
    fn default() -> Self {
        Self::new(Duration::from_millis(40), 50 * 1024 * 1024)
    }
}

impl AssetLoader for SimulatedLoader {
    fn load(
        &self,
        asset: AssetDescriptor,
        progress: LoadProgress,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<RendererHandle, LoadError>> {
        let step = self.duration_for(asset.size_bytes) / PROGRESS_STEPS;
        let fails = self.failing.read().contains(&asset.key());
        let live = Arc::clone(&self.live);
        let handles = Arc::clone(&self.handles);

        Box::pin(async move {
            for i in 1..=PROGRESS_STEPS {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LoadError::Cancelled),
                    _ = tokio::time::sleep(step) => {}
                }
                progress.set_loaded(asset.size_bytes * i as u64 / PROGRESS_STEPS as u64);
            }
            if fails {
                return Err(LoadError::Decode(format!(
                    "simulated decode failure for {}",
                    asset.key()
                )));
            }
            let handle = handles.allocate();
            live.insert(handle, asset.key());
            Ok(handle)
        })
    }

    fn release(&self, handle: RendererHandle) {
        self.live.remove(&handle);
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
