//! `lodstream config`: read and edit `config.ini` without opening an editor.
//!
//! Keys are addressed as `section.key`. Writes go through [`ConfigKey::set`],
//! so a value is validated before the file is touched.

use clap::Subcommand;
use lodstream::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Actions on the config file.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of one key
    Get {
        /// Configuration key in format section.key (e.g., stream.capacity)
        key: String,
    },

    /// Validate and store a value
    Set {
        /// Configuration key in format section.key (e.g., stream.capacity)
        key: String,

        /// Value to set (sizes accept units, e.g. 256MB)
        value: String,
    },

    /// Print every key grouped by section
    List,

    /// Print where config.ini lives
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'lodstream config list' to see available keys.",
            key
        ))
    })
}

fn run_get(key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load().unwrap_or_default();
    println!("{}", display_value(&config_key.get(&config)));
    Ok(())
}

fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let mut config = ConfigFile::load().unwrap_or_default();
    config_key.set(&mut config, value)?;
    config.save()?;

    println!("Set {} = {}", config_key.name(), display_value(&config_key.get(&config)));
    Ok(())
}

fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();

    println!("{}\n", config_file_path().display());
    print!("{}", render_list(&config));
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// Every key grouped under its section header.
fn render_list(config: &ConfigFile) -> String {
    let mut out = String::new();
    let mut open: Option<&str> = None;

    for key in ConfigKey::all() {
        if open != Some(key.section()) {
            if open.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", key.section()));
            open = Some(key.section());
        }
        out.push_str(&format!(
            "  {} = {}\n",
            key.key_name(),
            display_value(&key.get(config))
        ));
    }
    out
}
