//! Asset loader abstraction.
//!
//! The renderer backend is reached only through [`AssetLoader`]: it turns an
//! [`AssetDescriptor`] into an opaque [`RendererHandle`] and releases handles
//! the stream manager no longer needs.
//!
//! # Dyn Compatibility
//!
//! `load` returns a [`BoxFuture`] so loaders can be held as
//! `Arc<dyn AssetLoader>` and spawned onto the runtime.
//!
//! # Cancellation
//!
//! Loaders receive a [`CancellationToken`] and should stop early when it
//! fires. Honouring it is best effort: the manager discards any result that
//! arrives for an obsolete request.

mod file;
mod http;
mod simulated;

pub use file::{FileAssetLoader, DEFAULT_CHUNK_SIZE};
pub use http::HttpAssetLoader;
pub use simulated::SimulatedLoader;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::catalog::AssetDescriptor;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque reference to a renderer-side resource (GPU buffers, textures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RendererHandle(u64);

impl RendererHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RendererHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic handle allocator shared by the bundled loaders.
#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    next: AtomicU64,
}

impl HandleAllocator {
    pub(crate) fn allocate(&self) -> RendererHandle {
        RendererHandle::new(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Shared byte-progress counter for one load.
///
/// Cloning shares the counter: the loader writes, the manager reads.
#[derive(Debug, Clone)]
pub struct LoadProgress {
    loaded: Arc<AtomicU64>,
    total: u64,
}

impl LoadProgress {
    pub fn new(total: u64) -> Self {
        Self {
            loaded: Arc::new(AtomicU64::new(0)),
            total,
        }
    }

    /// Record the total number of bytes loaded so far.
    pub fn set_loaded(&self, bytes: u64) {
        self.loaded.store(bytes, Ordering::Relaxed);
    }

    pub fn add(&self, bytes: u64) {
        self.loaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn loaded(&self) -> u64 {
        self.loaded.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.loaded() as f64 / self.total as f64).clamp(0.0, 1.0) as f32
    }
}

/// Why a load failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bytes arrived but could not be turned into a renderer resource.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("Load timed out")]
    TimedOut,

    #[error("Load cancelled")]
    Cancelled,
}

impl LoadError {
    /// Cancellation is not a failure and never triggers a retry.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }
}

/// Produces and releases renderer resources for assets.
pub trait AssetLoader: Send + Sync + 'static {
    /// Load `asset`, reporting byte progress through `progress`.
    fn load(
        &self,
        asset: AssetDescriptor,
        progress: LoadProgress,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<RendererHandle, LoadError>>;

    /// Release a handle that is no longer referenced.
    fn release(&self, handle: RendererHandle);

    /// Loader name for logs.
    fn name(&self) -> &str {
        "loader"
    }
}

/// Check `bytes` against the descriptor's optional SHA-256 digest.
pub(crate) fn verify_digest(asset: &AssetDescriptor, hasher: Sha256) -> Result<(), LoadError> {
    let Some(expected) = asset.sha256.as_deref() else {
        return Ok(());
    };
    let actual = hex_string(&hasher.finalize());
    if actual == expected {
        Ok(())
    } else {
        Err(LoadError::DigestMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

pub(crate) fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex_string(&Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let progress = LoadProgress::new(200);
        let reader = progress.clone();
        progress.add(50);
        assert!((reader.fraction() - 0.25).abs() < 1e-6);
        progress.set_loaded(500);
        assert_eq!(reader.fraction(), 1.0);
    }

    #[test]
    fn test_empty_progress_is_zero() {
        assert_eq!(LoadProgress::new(0).fraction(), 0.0);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_handles_are_unique() {
        let alloc = HandleAllocator::default();
        assert_ne!(alloc.allocate(), alloc.allocate());
    }
}
