//! Error types for the video mesh node

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Camera, clip and frame errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Clip could not be opened: {0}")]
    ClipOpen(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Invalid frame dimensions: {width}x{height} with {len} bytes")]
    InvalidFrame { width: u32, height: u32, len: usize },

    #[error("Thread spawn failed: {0}")]
    Spawn(String),
}

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid quality: {0} (expected 1-100)")]
    InvalidQuality(u8),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Socket setup failed: {0}")]
    SocketSetup(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
