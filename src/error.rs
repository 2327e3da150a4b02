//! Error types for the relay pipeline

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while capturing, encoding or serving frames
#[derive(Debug, Error)]
pub enum RelayError {
    /// Upstream could not be opened with any pipeline configuration
    #[error("Failed to open upstream {url}: {reason}")]
    SessionOpen { url: String, reason: String },

    /// A single frame pull failed
    #[error("Failed to read frame: {0}")]
    Read(String),

    /// Frame bytes do not match the advertised dimensions
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// JPEG encoding failed for one frame
    #[error("Failed to encode frame: {0}")]
    Encode(String),

    /// Invalid relay configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file or environment could not be parsed
    #[error("Configuration error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for RelayError {
    fn from(err: image::ImageError) -> Self {
        RelayError::Encode(err.to_string())
    }
}
