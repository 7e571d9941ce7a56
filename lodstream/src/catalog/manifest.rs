//! JSON manifest format for the region/asset catalog.
//!
//! ```json
//! {
//!   "version": 1,
//!   "regions": [
//!     {
//!       "id": "heart",
//!       "system": "cardiovascular",
//!       "centroid": [0.0, 1.35, 0.05],
//!       "assets": {
//!         "body":   { "locator": "models/heart_body.glb",   "size_bytes": 2097152 },
//!         "organ":  { "locator": "models/heart_organ.glb",  "size_bytes": 18874368,
//!                     "sha256": "9f86d0..." }
//!       }
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::DetailLevel;

/// Manifest format version understood by this crate.
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_version")]
    pub version: u32,
    pub regions: Vec<ManifestRegion>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRegion {
    pub id: String,
    pub system: String,
    pub centroid: [f32; 3],
    pub assets: BTreeMap<DetailLevel, ManifestAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestAsset {
    pub locator: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}
