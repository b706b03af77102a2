//! Error types for quarry-startup.

/// Errors from configuration handling and workspace hashing.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// IO error reading or writing startup state.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration rejected before save.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// Workspace content hash could not be computed.
    #[error("content hash failed: {0}")]
    Hash(String),
}

/// Result type alias using `StartupError`.
pub type Result<T> = std::result::Result<T, StartupError>;
