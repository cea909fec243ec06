//! Error types for the pathwise engine.

use thiserror::Error;

/// All possible errors from the pathwise engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Path errors
    #[error("invalid object path: '{0}'")]
    InvalidPath(String),

    #[error("{0}")]
    InvalidOperation(String),

    // Protocol errors
    #[error("invalid updates: {0}")]
    InvalidUpdates(String),

    #[error("json error: {0}")]
    Json(String),

    // Filter/sort spec errors
    #[error("invalid spec: {0}")]
    InvalidSpec(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
