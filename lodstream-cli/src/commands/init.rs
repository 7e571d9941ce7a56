//! Init command - initialize configuration file.

use lodstream::config::{config_file_path, format_size, ConfigFile};

use crate::error::CliError;

/// Run the init command.
///
/// Existing values are kept unless `reset` is set.
pub fn run(reset: bool) -> Result<(), CliError> {
    let path = config_file_path();
    let existed = path.exists();

    let config = if reset {
        ConfigFile::default()
    } else {
        ConfigFile::load().unwrap_or_default()
    };
    config.save()?;

    if existed && !reset {
        println!("Updated configuration file: {}", path.display());
    } else {
        println!("Configuration file: {}", path.display());
    }
    println!();
    println!("  Memory budget: {}", format_size(config.stream.capacity));
    match &config.stream.asset_source {
        Some(source) => println!("  Asset source:  {}", source),
        None => {
            println!("  Asset source:  (not set, simulations use a synthetic loader)");
            println!();
            println!("Set one with: lodstream config set stream.asset_source <dir-or-url>");
        }
    }
    println!();
    println!("Edit this file to customize LOD thresholds, quality control and streaming.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
