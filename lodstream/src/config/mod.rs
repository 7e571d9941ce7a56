//! INI configuration file.
//!
//! Settings live in `~/.config/lodstream/config.ini` (platform equivalent)
//! and map onto the runtime configs of each subsystem:
//!
//! ```ini
//! [lod]
//! tissue_distance = 1.5
//!
//! [stream]
//! capacity = 256MB
//! asset_source = https://assets.example.org/anatomy
//!
//! [logging]
//! level = info
//! ```
//!
//! Missing sections and keys fall back to the built-in defaults. Individual
//! keys can be read and written through [`ConfigKey`].

mod file;
mod keys;
mod size;

use std::path::PathBuf;

use thiserror::Error;

pub use file::{
    ConfigFile, LodSettings, LoggingSettings, ProfilerSettings, QualityControlSettings,
    SessionSettings, StreamSettings, DEFAULT_LOG_LEVEL,
};
pub use keys::ConfigKey;
pub use size::{format_size, parse_size};

/// Directory name under the platform config dir.
const APP_DIR: &str = "lodstream";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors from reading, writing or interpreting the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Directory holding the configuration file.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Full path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_path_layout() {
        let path = config_file_path();
        assert!(path.ends_with("lodstream/config.ini"));
        assert_eq!(path.parent(), Some(config_dir().as_path()));
    }

    #[test]
    fn test_invalid_value_message() {
        let err = ConfigError::InvalidValue {
            key: "stream.capacity".to_string(),
            value: "huge".to_string(),
            reason: "expected a size such as 256MB".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value 'huge' for stream.capacity: expected a size such as 256MB"
        );
    }
}
