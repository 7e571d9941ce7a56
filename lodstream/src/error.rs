//! Top-level error taxonomy.

use thiserror::Error;

use crate::catalog::{AssetKey, CatalogError};
use crate::config::ConfigError;
use crate::stream::LoadError;

/// Errors surfaced by the LOD streaming subsystem.
///
/// Most of these are recovered locally and only reach callers through
/// [`StreamEvent`](crate::stream::StreamEvent)s and logs; the session never
/// crashes on them.
#[derive(Debug, Error)]
pub enum LodError {
    /// Device capability could not be determined.
    #[error("Device capability probe unavailable: {0}")]
    ProbeUnavailable(String),

    /// Catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An asset failed to load (I/O, decode, digest, timeout).
    #[error("Loading {key} failed: {source}")]
    LoadFailed {
        key: AssetKey,
        #[source]
        source: LoadError,
    },

    /// Admission could not free enough budget even after evicting
    /// everything evictable.
    #[error("Budget cannot admit {key}: needs {needed} bytes, limit {limit} bytes")]
    BudgetUnsatisfiable {
        key: AssetKey,
        needed: u64,
        limit: u64,
    },

    /// Renderer resources were lost (e.g. GPU context reset).
    #[error("Renderer resources lost; {invalidated} assets invalidated")]
    RendererResourceLoss { invalidated: usize },

    /// Logging could not be initialised.
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DetailLevel, RegionId};

    #[test]
    fn test_load_failed_display() {
        let err = LodError::LoadFailed {
            key: AssetKey::new(RegionId::new("heart"), DetailLevel::Organ),
            source: LoadError::Decode("bad header".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("heart/organ"));
        assert!(msg.contains("bad header"));
    }

    #[test]
    fn test_budget_unsatisfiable_display() {
        let err = LodError::BudgetUnsatisfiable {
            key: AssetKey::new(RegionId::new("lung"), DetailLevel::Body),
            needed: 10,
            limit: 5,
        };
        assert_eq!(
            err.to_string(),
            "Budget cannot admit lung/body: needs 10 bytes, limit 5 bytes"
        );
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        let err = LodError::LoadFailed {
            key: AssetKey::new(RegionId::new("a"), DetailLevel::Body),
            source: LoadError::TimedOut,
        };
        assert!(err.source().is_some());
    }
}
