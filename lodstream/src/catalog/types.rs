//! Core catalog types: region and asset identity, detail tiers.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Stable identifier of an anatomical region (e.g. `"heart"`, `"left_lung"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RegionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RegionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Anatomical system a region belongs to (e.g. `"skeletal"`, `"cardiovascular"`).
///
/// The viewer toggles whole systems on and off; disabled systems have their
/// regions unloaded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemTag(String);

impl SystemTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SystemTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SystemTag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Discrete fidelity tier of a region, ordered coarsest to finest.
///
/// `Unloaded` is the "no asset at all" target used for regions whose system
/// is disabled. It never has an asset in the catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    #[default]
    Unloaded,
    /// Whole-body coarse mesh.
    Body,
    /// Regional mesh.
    Region,
    /// Per-organ mesh.
    Organ,
    /// Tissue-level detail.
    Tissue,
}

impl DetailLevel {
    /// Every tier that can be backed by an asset, coarsest first.
    pub const LOADABLE: [DetailLevel; 4] = [
        DetailLevel::Body,
        DetailLevel::Region,
        DetailLevel::Organ,
        DetailLevel::Tissue,
    ];

    /// The finest tier.
    pub const FINEST: DetailLevel = DetailLevel::Tissue;

    /// One step finer, saturating at `Tissue`.
    pub fn finer(self) -> Self {
        match self {
            DetailLevel::Unloaded => DetailLevel::Body,
            DetailLevel::Body => DetailLevel::Region,
            DetailLevel::Region => DetailLevel::Organ,
            DetailLevel::Organ | DetailLevel::Tissue => DetailLevel::Tissue,
        }
    }

    /// One step coarser among loadable tiers, saturating at `Body`.
    ///
    /// `Unloaded` stays `Unloaded`.
    pub fn coarser(self) -> Self {
        match self {
            DetailLevel::Unloaded => DetailLevel::Unloaded,
            DetailLevel::Body | DetailLevel::Region => DetailLevel::Body,
            DetailLevel::Organ => DetailLevel::Region,
            DetailLevel::Tissue => DetailLevel::Organ,
        }
    }

    pub fn is_loadable(self) -> bool {
        self != DetailLevel::Unloaded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DetailLevel::Unloaded => "unloaded",
            DetailLevel::Body => "body",
            DetailLevel::Region => "region",
            DetailLevel::Organ => "organ",
            DetailLevel::Tissue => "tissue",
        }
    }

    /// Parse the lowercase name used in manifests and config files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unloaded" => Some(DetailLevel::Unloaded),
            "body" => Some(DetailLevel::Body),
            "region" => Some(DetailLevel::Region),
            "organ" => Some(DetailLevel::Organ),
            "tissue" => Some(DetailLevel::Tissue),
            _ => None,
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one loadable unit: a region at a detail level.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetKey {
    pub region: RegionId,
    pub level: DetailLevel,
}

impl AssetKey {
    pub fn new(region: RegionId, level: DetailLevel) -> Self {
        Self { region, level }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.level)
    }
}

/// Immutable metadata for one loadable asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub region: RegionId,
    pub level: DetailLevel,
    /// Approximate decoded size in bytes, charged against the memory budget.
    pub size_bytes: u64,
    /// Source locator (file path or URL).
    pub locator: String,
    /// Optional lowercase hex SHA-256 of the source bytes.
    pub sha256: Option<String>,
}

impl AssetDescriptor {
    pub fn key(&self) -> AssetKey {
        AssetKey::new(self.region.clone(), self.level)
    }
}

/// Static description of an anatomical region and its available assets.
#[derive(Debug, Clone)]
pub struct RegionDescriptor {
    pub id: RegionId,
    pub system: SystemTag,
    /// Representative point used for camera distance.
    pub centroid: Vec3,
    /// Available assets, one per detail level.
    pub assets: BTreeMap<DetailLevel, AssetDescriptor>,
}

impl RegionDescriptor {
    /// Asset for `level`, or the nearest coarser one, or the nearest finer one.
    ///
    /// Returns `None` for `Unloaded` or a region without assets.
    pub fn asset_for(&self, level: DetailLevel) -> Option<&AssetDescriptor> {
        if !level.is_loadable() {
            return None;
        }
        self.assets
            .range(..=level)
            .next_back()
            .or_else(|| self.assets.range(level..).next())
            .map(|(_, asset)| asset)
    }

    /// Nearest available asset strictly coarser than `level`.
    pub fn coarser_than(&self, level: DetailLevel) -> Option<&AssetDescriptor> {
        if level <= DetailLevel::Body {
            return None;
        }
        self.assets
            .range(DetailLevel::Body..level)
            .next_back()
            .map(|(_, asset)| asset)
    }

    /// The coarsest available asset.
    pub fn coarsest(&self) -> Option<&AssetDescriptor> {
        self.assets.values().next()
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.centroid.distance(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(levels: &[DetailLevel]) -> RegionDescriptor {
        let id = RegionId::new("heart");
        let assets = levels
            .iter()
            .map(|&level| {
                (
                    level,
                    AssetDescriptor {
                        region: id.clone(),
                        level,
                        size_bytes: 1024,
                        locator: format!("heart_{}.glb", level),
                        sha256: None,
                    },
                )
            })
            .collect();
        RegionDescriptor {
            id,
            system: SystemTag::new("cardiovascular"),
            centroid: Vec3::ZERO,
            assets,
        }
    }

    #[test]
    fn test_detail_level_ordering() {
        assert!(DetailLevel::Unloaded < DetailLevel::Body);
        assert!(DetailLevel::Body < DetailLevel::Region);
        assert!(DetailLevel::Organ < DetailLevel::Tissue);
    }

    #[test]
    fn test_detail_level_steps_saturate() {
        assert_eq!(DetailLevel::Tissue.finer(), DetailLevel::Tissue);
        assert_eq!(DetailLevel::Body.coarser(), DetailLevel::Body);
        assert_eq!(DetailLevel::Unloaded.coarser(), DetailLevel::Unloaded);
        assert_eq!(DetailLevel::Organ.coarser(), DetailLevel::Region);
    }

    #[test]
    fn test_detail_level_parse() {
        assert_eq!(DetailLevel::parse("Organ"), Some(DetailLevel::Organ));
        assert_eq!(DetailLevel::parse(" tissue "), Some(DetailLevel::Tissue));
        assert_eq!(DetailLevel::parse("cell"), None);
    }

    #[test]
    fn test_asset_for_exact_match() {
        let r = region(&[DetailLevel::Body, DetailLevel::Organ]);
        assert_eq!(r.asset_for(DetailLevel::Organ).unwrap().level, DetailLevel::Organ);
    }

    #[test]
    fn test_asset_for_falls_back_coarser_then_finer() {
        let r = region(&[DetailLevel::Body, DetailLevel::Organ]);
        assert_eq!(r.asset_for(DetailLevel::Region).unwrap().level, DetailLevel::Body);
        assert_eq!(r.asset_for(DetailLevel::Tissue).unwrap().level, DetailLevel::Organ);

        let only_fine = region(&[DetailLevel::Organ]);
        assert_eq!(
            only_fine.asset_for(DetailLevel::Body).unwrap().level,
            DetailLevel::Organ
        );
    }

    #[test]
    fn test_asset_for_unloaded_is_none() {
        let r = region(&[DetailLevel::Body]);
        assert!(r.asset_for(DetailLevel::Unloaded).is_none());
    }

    #[test]
    fn test_coarser_than() {
        let r = region(&[DetailLevel::Body, DetailLevel::Region, DetailLevel::Tissue]);
        assert_eq!(
            r.coarser_than(DetailLevel::Tissue).unwrap().level,
            DetailLevel::Region
        );
        assert!(r.coarser_than(DetailLevel::Body).is_none());
        assert_eq!(r.coarsest().unwrap().level, DetailLevel::Body);
    }
}
