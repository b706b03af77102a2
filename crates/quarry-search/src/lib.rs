//! Read side of quarry: semantic context queries over the indexed store.

pub mod engine;
pub mod error;

pub use engine::{ContextQueryEngine, QueryHit, QueryRequest, QueryResponse};
pub use error::{Result, SearchError};
