//! Error types for quarry-store.

/// Errors produced by vector store backends.
///
/// The public [`crate::VectorStoreClient`] surface is fail-soft and converts
/// these into `false`/empty return values after logging; the error type is
/// still exposed for backends and integration code.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or the connection dropped.
    #[error("connection error: {0}")]
    Connection(String),

    /// Collection lifecycle operation failed.
    #[error("collection error: {0}")]
    Collection(String),

    /// Point upsert failed.
    #[error("upsert error: {0}")]
    Upsert(String),

    /// Similarity search failed.
    #[error("search error: {0}")]
    Search(String),

    /// Collection or point deletion failed.
    #[error("delete error: {0}")]
    Delete(String),

    /// Input rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Payload serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying Qdrant client error.
    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),
}

/// Result type alias using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;
