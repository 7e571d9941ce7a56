//! HTTP loader using reqwest.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use super::{
    verify_digest, AssetLoader, BoxFuture, HandleAllocator, LoadError, LoadProgress, RendererHandle,
};
use crate::catalog::AssetDescriptor;

/// Connect timeout for asset requests. The overall load is bounded by the
/// stream manager's load timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Streams assets over HTTP(S).
///
/// Relative locators are resolved against `base_url`. The response body is
/// read chunk by chunk so progress is reported and cancellation is honoured
/// mid-transfer.
#[derive(Debug, Clone)]
pub struct HttpAssetLoader {
    client: reqwest::Client,
    base_url: Option<String>,
    handles: Arc<HandleAllocator>,
}

impl HttpAssetLoader {
    pub fn new(base_url: Option<String>) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: Option<String>) -> Self {
        Self {
            client,
            base_url,
            handles: Arc::new(HandleAllocator::default()),
        }
    }

    /// Absolute URL for a locator.
    pub fn url_for(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return locator.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                locator.trim_start_matches('/')
            ),
            None => locator.to_string(),
        }
    }
}

impl AssetLoader for HttpAssetLoader {
    fn load(
        &self,
        asset: AssetDescriptor,
        progress: LoadProgress,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<RendererHandle, LoadError>> {
        let url = self.url_for(&asset.locator);
        let client = self.client.clone();
        let handles = Arc::clone(&self.handles);

        Box::pin(async move {
            let mut response = client.get(&url).send().await?.error_for_status()?;
            let mut hasher = Sha256::new();
            let mut total: u64 = 0;

            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => return Err(LoadError::Cancelled),
                    chunk = response.chunk() => chunk?,
                };
                let Some(chunk) = chunk else {
                    break;
                };
                hasher.update(&chunk);
                total += chunk.len() as u64;
                progress.set_loaded(total);
            }

            if total == 0 {
                return Err(LoadError::Decode(format!("empty response from {}", url)));
            }
            verify_digest(&asset, hasher)?;

            let handle = handles.allocate();
            tracing::trace!(asset = %asset.key(), url = %url, bytes = total, "Asset downloaded");
            Ok(handle)
        })
    }

    fn release(&self, handle: RendererHandle) {
        tracing::trace!(handle = %handle, "Released HTTP asset handle");
    }

    fn name(&self) -> &str {
        "http"
    }
}
