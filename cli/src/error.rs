//! Unified error handling for the CLI.

use crate::config::ConfigError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Engine error: {0}")]
    Engine(#[from] pathwise_engine::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot read {source_name}: {error}")]
    Read {
        source_name: String,
        #[source]
        error: std::io::Error,
    },

    #[error("Invalid JSON in {source_name}: {error}")]
    Parse {
        source_name: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("Cannot write output: {0}")]
    Write(#[from] std::io::Error),

    #[error("Cannot encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    pub fn usage(message: impl Into<String>) -> Self {
        CliError::Usage(message.into())
    }
}

/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, CliError>;
