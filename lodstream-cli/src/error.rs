//! CLI error type.

use std::fmt;

use lodstream::catalog::CatalogError;
use lodstream::config::ConfigError;
use lodstream::stream::LoadError;
use lodstream::LodError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration problem (bad key, bad value, unwritable file).
    Config(String),
    /// Catalog could not be loaded or failed validation.
    Catalog(CatalogError),
    /// Asset loader could not be created.
    Loader(LoadError),
    /// Logging or runtime setup failed.
    Setup(String),
    /// A simulated session reported unavailable regions.
    Simulation(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Catalog(e) => write!(f, "Catalog error: {}", e),
            CliError::Loader(e) => write!(f, "Loader error: {}", e),
            CliError::Setup(msg) => write!(f, "Setup error: {}", msg),
            CliError::Simulation(msg) => write!(f, "Simulation error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Catalog(e) => Some(e),
            CliError::Loader(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        CliError::Loader(e)
    }
}

impl From<LodError> for CliError {
    fn from(e: LodError) -> Self {
        match e {
            LodError::Catalog(e) => CliError::Catalog(e),
            LodError::Config(e) => e.into(),
            other => CliError::Setup(other.to_string()),
        }
    }
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Catalog(_) => 3,
            CliError::Loader(_) | CliError::Setup(_) => 1,
            CliError::Simulation(_) => 4,
        }
    }
}
