//! Static region/asset catalog.
//!
//! The catalog maps every anatomical region to the assets available for it at
//! each [`DetailLevel`]. It is loaded once at startup from a JSON manifest and
//! never mutated afterwards; the LOD evaluator and the stream manager share it
//! through an `Arc<Catalog>`.
//!
//! # Example
//!
//! ```
//! use lodstream::catalog::{Catalog, DetailLevel};
//!
//! let json = r#"{
//!     "regions": [{
//!         "id": "heart",
//!         "system": "cardiovascular",
//!         "centroid": [0.0, 1.35, 0.05],
//!         "assets": {
//!             "body":  { "locator": "heart_body.glb",  "size_bytes": 1024 },
//!             "organ": { "locator": "heart_organ.glb", "size_bytes": 8192 }
//!         }
//!     }]
//! }"#;
//!
//! let catalog = Catalog::from_json_str(json).unwrap();
//! let heart = catalog.region("heart").unwrap();
//! assert_eq!(heart.asset_for(DetailLevel::Tissue).unwrap().level, DetailLevel::Organ);
//! ```

mod manifest;
mod types;

pub use manifest::{Manifest, ManifestAsset, ManifestRegion, MANIFEST_VERSION};
pub use types::{AssetDescriptor, AssetKey, DetailLevel, RegionDescriptor, RegionId, SystemTag};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glam::Vec3;
use thiserror::Error;

/// Errors raised while loading or validating a catalog manifest.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported manifest version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Duplicate region id '{0}'")]
    DuplicateRegion(String),

    #[error("Region '{0}' declares no assets")]
    EmptyRegion(String),

    #[error("Region '{region}' declares an asset for the 'unloaded' tier")]
    UnloadedAsset { region: String },

    #[error("Asset {region}/{level} declares a zero size")]
    ZeroSize { region: String, level: DetailLevel },

    #[error("Region '{0}' has a non-finite centroid")]
    InvalidCentroid(String),
}

/// Immutable catalog of regions and their per-level assets.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    regions: BTreeMap<RegionId, RegionDescriptor>,
}

impl Catalog {
    /// Build a catalog from already-validated region descriptors.
    pub fn from_regions(regions: impl IntoIterator<Item = RegionDescriptor>) -> Self {
        Self {
            regions: regions.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    /// Load and validate a manifest from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&text)?;
        tracing::info!(
            path = %path.display(),
            regions = catalog.len(),
            assets = catalog.asset_count(),
            "Loaded asset catalog"
        );
        Ok(catalog)
    }

    /// Parse and validate a manifest from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        Self::from_manifest(manifest)
    }

    /// Validate a parsed manifest.
    pub fn from_manifest(manifest: Manifest) -> Result<Self, CatalogError> {
        if manifest.version != MANIFEST_VERSION {
            return Err(CatalogError::UnsupportedVersion {
                found: manifest.version,
                expected: MANIFEST_VERSION,
            });
        }

        let mut regions = BTreeMap::new();
        for entry in manifest.regions {
            let id = RegionId::new(entry.id.clone());
            if regions.contains_key(&id) {
                return Err(CatalogError::DuplicateRegion(entry.id));
            }
            if entry.assets.is_empty() {
                return Err(CatalogError::EmptyRegion(entry.id));
            }
            let centroid = Vec3::from_array(entry.centroid);
            if !centroid.is_finite() {
                return Err(CatalogError::InvalidCentroid(entry.id));
            }

            let mut assets = BTreeMap::new();
            for (level, asset) in entry.assets {
                if !level.is_loadable() {
                    return Err(CatalogError::UnloadedAsset { region: entry.id });
                }
                if asset.size_bytes == 0 {
                    return Err(CatalogError::ZeroSize {
                        region: entry.id,
                        level,
                    });
                }
                assets.insert(
                    level,
                    AssetDescriptor {
                        region: id.clone(),
                        level,
                        size_bytes: asset.size_bytes,
                        locator: asset.locator,
                        sha256: asset.sha256.map(|d| d.to_ascii_lowercase()),
                    },
                );
            }

            regions.insert(
                id.clone(),
                RegionDescriptor {
                    id,
                    system: SystemTag::new(entry.system),
                    centroid,
                    assets,
                },
            );
        }

        Ok(Self { regions })
    }

    /// Convert back into the manifest representation.
    pub fn to_manifest(&self) -> Manifest {
        Manifest {
            version: MANIFEST_VERSION,
            regions: self
                .regions
                .values()
                .map(|r| ManifestRegion {
                    id: r.id.to_string(),
                    system: r.system.to_string(),
                    centroid: r.centroid.to_array(),
                    assets: r
                        .assets
                        .iter()
                        .map(|(level, a)| {
                            (
                                *level,
                                ManifestAsset {
                                    locator: a.locator.clone(),
                                    size_bytes: a.size_bytes,
                                    sha256: a.sha256.clone(),
                                },
                            )
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn region(&self, id: &str) -> Option<&RegionDescriptor> {
        self.regions.get(id)
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionDescriptor> {
        self.regions.values()
    }

    /// Descriptor for a specific asset key, if the catalog has that exact tier.
    pub fn asset(&self, key: &AssetKey) -> Option<&AssetDescriptor> {
        self.regions
            .get(&key.region)
            .and_then(|r| r.assets.get(&key.level))
    }

    /// All system tags referenced by the catalog.
    pub fn systems(&self) -> BTreeSet<SystemTag> {
        self.regions.values().map(|r| r.system.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn asset_count(&self) -> usize {
        self.regions.values().map(|r| r.assets.len()).sum()
    }

    /// Sum of declared sizes over every asset.
    pub fn total_bytes(&self) -> u64 {
        self.regions
            .values()
            .flat_map(|r| r.assets.values())
            .map(|a| a.size_bytes)
            .sum()
    }
}
