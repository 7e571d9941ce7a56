//! Catalog inspection commands.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use console::style;
use lodstream::catalog::{Catalog, DetailLevel, RegionDescriptor};
use lodstream::config::{format_size, ConfigFile};

use crate::error::CliError;

/// Catalog subcommands.
#[derive(Debug, Subcommand)]
pub enum CatalogAction {
    /// Load a catalog manifest and report problems
    Validate {
        /// Path to the catalog JSON manifest
        path: PathBuf,
    },

    /// Show the regions and assets in a catalog
    Show {
        /// Path to the catalog JSON manifest
        path: PathBuf,

        /// Only show this region
        #[arg(long)]
        region: Option<String>,
    },
}

/// Run a catalog subcommand.
pub fn run(action: CatalogAction) -> Result<(), CliError> {
    match action {
        CatalogAction::Validate { path } => run_validate(&path),
        CatalogAction::Show { path, region } => run_show(&path, region.as_deref()),
    }
}

fn run_validate(path: &Path) -> Result<(), CliError> {
    let catalog = Catalog::load(path)?;
    let config = ConfigFile::load().unwrap_or_default();

    println!("{} {}", style("✓").green(), path.display());
    println!("  Regions: {}", catalog.len());
    println!("  Assets:  {}", catalog.asset_count());
    println!("  Systems: {}", systems_line(&catalog));
    println!("  Total:   {}", format_size(catalog.total_bytes()));

    let warnings = budget_warnings(&catalog, config.stream.capacity);
    if !warnings.is_empty() {
        println!();
        for warning in &warnings {
            println!("{} {}", style("warning:").yellow().bold(), warning);
        }
    }
    Ok(())
}

fn run_show(path: &Path, only: Option<&str>) -> Result<(), CliError> {
    let catalog = Catalog::load(path)?;

    let regions: Vec<&RegionDescriptor> = match only {
        Some(id) => vec![catalog.region(id).ok_or_else(|| {
            CliError::Config(format!("Region '{}' is not in {}", id, path.display()))
        })?],
        None => catalog.regions().collect(),
    };

    for region in regions {
        let c = region.centroid;
        println!(
            "{} ({}) at [{:.2}, {:.2}, {:.2}]",
            style(&region.id).bold(),
            region.system,
            c.x,
            c.y,
            c.z
        );
        for level in DetailLevel::LOADABLE {
            match region.assets.get(&level) {
                Some(asset) => println!(
                    "  {:<7} {:>12}  {}{}",
                    level.as_str(),
                    format_size(asset.size_bytes),
                    asset.locator,
                    if asset.sha256.is_some() { "  [sha256]" } else { "" }
                ),
                None => println!("  {:<7} {:>12}", level.as_str(), style("-").dim()),
            }
        }
    }
    Ok(())
}

fn systems_line(catalog: &Catalog) -> String {
    catalog
        .systems()
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Regions that can never be shown, or only partially, under `capacity`.
fn budget_warnings(catalog: &Catalog, capacity: u64) -> Vec<String> {
    let mut warnings = Vec::new();
    for region in catalog.regions() {
        let Some(coarsest) = region.coarsest() else {
            continue;
        };
        if coarsest.size_bytes > capacity {
            warnings.push(format!(
                "{}: coarsest asset ({}) exceeds the memory budget ({})",
                region.id,
                format_size(coarsest.size_bytes),
                format_size(capacity)
            ));
            continue;
        }
        for asset in region.assets.values() {
            if asset.size_bytes > capacity {
                warnings.push(format!(
                    "{}: {} asset ({}) exceeds the memory budget and will not load",
                    region.id,
                    asset.level,
                    format_size(asset.size_bytes)
                ));
            }
        }
    }
    let coarsest_total: u64 = catalog
        .regions()
        .filter_map(|r| r.coarsest())
        .map(|a| a.size_bytes)
        .sum();
    if coarsest_total > capacity {
        warnings.push(format!(
            "all regions at their coarsest level need {}, more than the budget ({})",
            format_size(coarsest_total),
            format_size(capacity)
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodstream::testing::{catalog, full_region, region, MB};
    use glam::Vec3;

    #[test]
    fn test_budget_warnings() {
        let c = catalog([
            full_region("heart", "cardio", Vec3::ZERO, [MB, 2 * MB, 4 * MB, 8 * MB]),
            region("skull", "skeletal", Vec3::Y, &[(DetailLevel::Body, 12 * MB)]),
        ]);
        let warnings = budget_warnings(&c, 6 * MB);
        assert_eq!(warnings.len(), 3, "{warnings:?}");
        assert!(warnings[0].starts_with("heart: tissue"));
        assert!(warnings[1].starts_with("skull: coarsest"));
        assert!(budget_warnings(&c, 64 * MB).is_empty());
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_validate(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, CliError::Catalog(_)));
    }
}
