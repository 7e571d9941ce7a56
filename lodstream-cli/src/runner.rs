//! Shared setup for commands that run the library: configuration, logging
//! and the async runtime.

use lodstream::config::{config_file_path, ConfigFile};
use lodstream::logging::{init_logging, LoggingGuard};
use tokio::runtime::Runtime;

use crate::error::CliError;

/// Loaded configuration plus the resources a long-running command needs.
pub struct CliRunner {
    config: ConfigFile,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load the config file (defaults when absent) and start logging.
    ///
    /// A config file that exists but cannot be parsed is an error.
    pub fn new() -> Result<Self, CliError> {
        let path = config_file_path();
        let config = if path.exists() {
            ConfigFile::load_from(&path)?
        } else {
            ConfigFile::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: ConfigFile) -> Result<Self, CliError> {
        let logging = init_logging(&config.logging)?;
        Ok(Self {
            config,
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Record the command being run and where settings came from.
    pub fn log_startup(&self, command: &str) {
        tracing::info!(
            version = lodstream::VERSION,
            command,
            config = %config_file_path().display(),
            "lodstream starting"
        );
    }

    /// Multi-threaded runtime for streaming loads.
    pub fn runtime(&self) -> Result<Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("lodstream-io")
            .build()
            .map_err(|e| CliError::Setup(format!("Failed to start async runtime: {}", e)))
    }
}
