//! Error types for quarry-embed.

/// Errors from embedding backends.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the embedding API.
    #[error("embedding API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Result type alias using `EmbedError`.
pub type Result<T> = std::result::Result<T, EmbedError>;
