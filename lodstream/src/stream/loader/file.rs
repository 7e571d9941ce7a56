//! Local filesystem loader.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::{
    verify_digest, AssetLoader, BoxFuture, HandleAllocator, LoadError, LoadProgress, RendererHandle,
};
use crate::catalog::AssetDescriptor;

/// Read buffer size (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Loads asset files relative to a root directory.
///
/// Progress is reported per chunk, the cancellation token is checked between
/// chunks, and the SHA-256 digest is verified when the catalog declares one.
/// An empty file is a decode error.
#[derive(Debug, Clone)]
pub struct FileAssetLoader {
    root: PathBuf,
    chunk_size: usize,
    handles: Arc<HandleAllocator>,
}

impl FileAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            handles: Arc::new(HandleAllocator::default()),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        let path = Path::new(locator);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl AssetLoader for FileAssetLoader {
    fn load(
        &self,
        asset: AssetDescriptor,
        progress: LoadProgress,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<RendererHandle, LoadError>> {
        let path = self.resolve(&asset.locator);
        let chunk_size = self.chunk_size;
        let handles = Arc::clone(&self.handles);

        Box::pin(async move {
            let mut file = tokio::fs::File::open(&path).await?;
            let mut hasher = Sha256::new();
            let mut buf = vec![0u8; chunk_size];
            let mut total: u64 = 0;

            loop {
                if cancel.is_cancelled() {
                    return Err(LoadError::Cancelled);
                }
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                total += n as u64;
                progress.set_loaded(total);
            }

            if total == 0 {
                return Err(LoadError::Decode(format!("{} is empty", path.display())));
            }
            verify_digest(&asset, hasher)?;

            let handle = handles.allocate();
            tracing::trace!(
                asset = %asset.key(),
                path = %path.display(),
                bytes = total,
                handle = %handle,
                "Asset file loaded"
            );
            Ok(handle)
        })
    }

    fn release(&self, handle: RendererHandle) {
        tracing::trace!(handle = %handle, "Released file asset handle");
    }

    fn name(&self) -> &str {
        "file"
    }
}
