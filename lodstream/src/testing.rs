//! Test support: a scriptable loader and catalog builders.
//!
//! Compiled for this crate's unit tests and, behind the `testing` feature,
//! for integration tests and downstream test suites. Production builds do
//! not include it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use glam::Vec3;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::catalog::{
    AssetDescriptor, AssetKey, Catalog, DetailLevel, RegionDescriptor, RegionId, SystemTag,
};
use crate::stream::{AssetLoader, BoxFuture, LoadError, LoadProgress, RendererHandle};

/// One mebibyte.
pub const MB: u64 = 1024 * 1024;

#[derive(Debug, Default)]
struct Script {
    /// Remaining forced failures; `u32::MAX` fails forever.
    failures: u32,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
}

/// Loader whose behaviour is scripted per asset key.
///
/// Unscripted loads succeed immediately. Gated loads wait for
/// [`open`](Self::open) and ignore cancellation, which lets tests deliver
/// completions for requests that have since become obsolete.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLoader {
    scripts: Arc<DashMap<AssetKey, Script>>,
    loads: Arc<DashMap<AssetKey, u32>>,
    live: Arc<DashMap<RendererHandle, AssetKey>>,
    next_handle: Arc<AtomicU64>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` loads of `key`.
    pub fn fail_times(&self, key: AssetKey, times: u32) {
        self.scripts.entry(key).or_default().failures = times;
    }

    /// Fail every load of `key`.
    pub fn fail_always(&self, key: AssetKey) {
        self.fail_times(key, u32::MAX);
    }

    /// Delay loads of `key`. Cancellation ends the delay early.
    pub fn delay(&self, key: AssetKey, delay: Duration) {
        self.scripts.entry(key).or_default().delay = Some(delay);
    }

    /// Hold loads of `key` until [`open`](Self::open) is called.
    pub fn gate(&self, key: AssetKey) {
        self.scripts.entry(key).or_default().gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let one held load of `key` finish.
    pub fn open(&self, key: &AssetKey) {
        if let Some(script) = self.scripts.get(key) {
            if let Some(gate) = &script.gate {
                gate.add_permits(1);
            }
        }
    }

    /// Number of loads started for `key`.
    pub fn load_count(&self, key: &AssetKey) -> u32 {
        self.loads.get(key).map(|n| *n).unwrap_or(0)
    }

    /// Total loads started.
    pub fn total_loads(&self) -> u32 {
        self.loads.iter().map(|entry| *entry.value()).sum()
    }

    /// Handles produced and not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    /// Whether a live handle exists for `key`.
    pub fn is_live(&self, key: &AssetKey) -> bool {
        self.live.iter().any(|entry| entry.value() == key)
    }
}

impl AssetLoader for ScriptedLoader {
    fn load(
        &self,
        asset: AssetDescriptor,
        progress: LoadProgress,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<RendererHandle, LoadError>> {
        let key = asset.key();
        *self.loads.entry(key.clone()).or_insert(0) += 1;

        let (fail, delay, gate) = match self.scripts.get_mut(&key) {
            Some(mut script) => {
                let fail = script.failures > 0;
                if script.failures > 0 && script.failures != u32::MAX {
                    script.failures -= 1;
                }
                (fail, script.delay, script.gate.clone())
            }
            None => (false, None, None),
        };
        let live = Arc::clone(&self.live);
        let next_handle = Arc::clone(&self.next_handle);

        Box::pin(async move {
            if let Some(gate) = gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            } else if let Some(delay) = delay {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LoadError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            } else {
                tokio::task::yield_now().await;
            }

            if fail {
                return Err(LoadError::Decode(format!("scripted failure for {}", key)));
            }
            progress.set_loaded(progress.total());
            let handle = RendererHandle::new(next_handle.fetch_add(1, Ordering::Relaxed) + 1);
            live.insert(handle, key);
            Ok(handle)
        })
    }

    fn release(&self, handle: RendererHandle) {
        self.live.remove(&handle);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Region with one asset per listed level, each `size_bytes` large.
pub fn region(
    id: &str,
    system: &str,
    centroid: Vec3,
    levels: &[(DetailLevel, u64)],
) -> RegionDescriptor {
    let rid = RegionId::new(id);
    let assets = levels
        .iter()
        .map(|&(level, size_bytes)| {
            (
                level,
                AssetDescriptor {
                    region: rid.clone(),
                    level,
                    size_bytes,
                    locator: format!("{id}/{level}.glb"),
                    sha256: None,
                },
            )
        })
        .collect();
    RegionDescriptor {
        id: rid,
        system: SystemTag::new(system),
        centroid,
        assets,
    }
}

/// Region with all four loadable levels at the given sizes (coarsest first).
pub fn full_region(id: &str, system: &str, centroid: Vec3, sizes: [u64; 4]) -> RegionDescriptor {
    let levels: Vec<_> = DetailLevel::LOADABLE.into_iter().zip(sizes).collect();
    region(id, system, centroid, &levels)
}

pub fn catalog(regions: impl IntoIterator<Item = RegionDescriptor>) -> Arc<Catalog> {
    Arc::new(Catalog::from_regions(regions))
}

pub fn key(region: &str, level: DetailLevel) -> AssetKey {
    AssetKey::new(RegionId::new(region), level)
}
