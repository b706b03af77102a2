//! Error types for quarry-search.

/// Errors a context query can return.
///
/// Store-side failures never surface here; the store client degrades to an
/// empty result set on its own.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Query text was empty or whitespace.
    #[error("query must not be empty")]
    EmptyQuery,

    /// Requested result count outside the accepted range.
    #[error("max_results must be between 1 and {max}, got {got}")]
    InvalidLimit { got: usize, max: usize },

    /// Embedding service failed on the query text.
    #[error(transparent)]
    Embed(#[from] quarry_embed::EmbedError),

    /// Embedding service answered without a vector for the query.
    #[error("embedding service returned no vector for the query")]
    MissingQueryVector,
}

/// Result type alias using `SearchError`.
pub type Result<T> = std::result::Result<T, SearchError>;
