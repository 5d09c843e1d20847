//! Hub error types.

use thiserror::Error;

/// Result type for Hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors from the dataset host.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request failed with {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }
}
