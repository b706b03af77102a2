//! Vector store substrate for quarry: a Qdrant backend behind a transport
//! trait, wrapped by a fail-soft client that owns validation, batching,
//! deterministic point ids, retry/backoff, and health-check caching.

pub mod backend;
pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod qdrant;
pub(crate) mod retry;
pub mod types;

pub use backend::{CollectionInfo, FieldCondition, FieldFilter, FilterValue, VectorBackend};
pub use client::{StoreConfig, VectorStoreClient};
pub use error::{Result, StoreError};
#[cfg(any(test, feature = "mock"))]
pub use memory::InMemoryBackend;
pub use qdrant::QdrantBackend;
pub use retry::RetryPolicy;
pub use types::{CodeChunk, SearchResult};
