//! Common types and utilities shared across CLI commands.

use clap::ValueEnum;
use lodstream::catalog::{AssetKey, DetailLevel, RegionId};
use lodstream::config::parse_size;
use lodstream::quality::QualityPreset;

use crate::error::CliError;

/// Quality preset selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum PresetArg {
    /// Reduced pixel density, no post effects, coarse detail
    Performance,
    /// Middle ground used on most hardware
    Balanced,
    /// Full density, MSAA, ambient occlusion, tissue detail
    Quality,
}

impl From<PresetArg> for QualityPreset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Performance => QualityPreset::Performance,
            PresetArg::Balanced => QualityPreset::Balanced,
            PresetArg::Quality => QualityPreset::Quality,
        }
    }
}

/// Parse a byte size argument such as `256MB`.
pub fn parse_size_arg(name: &str, value: &str) -> Result<u64, CliError> {
    parse_size(value).ok_or_else(|| {
        CliError::Config(format!(
            "Invalid size '{}' for --{}. Use bytes or units like 64KB, 256MB, 1GB.",
            value, name
        ))
    })
}

/// Parse an asset key written as `region/level`, e.g. `heart/organ`.
pub fn parse_asset_key(value: &str) -> Result<AssetKey, CliError> {
    let (region, level) = value.rsplit_once('/').ok_or_else(|| {
        CliError::Config(format!("Expected region/level, got '{}'", value))
    })?;
    let level = DetailLevel::parse(level)
        .filter(|l| l.is_loadable())
        .ok_or_else(|| {
            CliError::Config(format!(
                "Unknown detail level '{}'. Use body, region, organ or tissue.",
                level
            ))
        })?;
    Ok(AssetKey::new(RegionId::new(region), level))
}
