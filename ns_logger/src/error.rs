//! Error types for the logger

use thiserror::Error;

/// Errors surfaced by [`Logger`](crate::Logger) and [`LoggerConfig`](crate::LoggerConfig)
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("{dependency} is not available: the logger was built without a datastore")]
    BackendUnavailable { dependency: &'static str },
    #[error("Invalid logger configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Failed to read logger configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl LoggerError {
    pub(crate) fn no_datastore() -> Self {
        LoggerError::BackendUnavailable { dependency: "datastore" }
    }
}
