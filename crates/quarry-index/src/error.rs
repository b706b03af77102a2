//! Error types for quarry-index.

/// Errors that can occur during an indexing run.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File enumeration failed below the workspace root.
    #[error("enumeration failed: {0}")]
    Enumeration(String),

    /// Embedding service error.
    #[error("embedding error: {0}")]
    Embed(#[from] quarry_embed::EmbedError),

    /// Vector store rejected or failed an operation.
    #[error("store error: {0}")]
    Store(String),

    /// Chunk extraction failed for a file.
    #[error("parse failed: {0}")]
    Parse(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
