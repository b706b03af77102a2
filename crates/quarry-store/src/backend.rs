//! Backend abstraction over collection-oriented vector stores.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stored `{id, vector, payload}` record.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// A scored point returned by similarity search.
#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Structured equality predicates over payload fields.
#[derive(Debug, Clone, Default)]
pub struct FieldFilter {
    pub must: Vec<FieldCondition>,
}

impl FieldFilter {
    /// Filter requiring `field == value` for a text payload field.
    #[must_use]
    pub fn matches_text(field: &str, value: &str) -> Self {
        Self {
            must: vec![FieldCondition {
                field: field.into(),
                value: FilterValue::Text(value.into()),
            }],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldCondition {
    pub field: String,
    pub value: FilterValue,
}

#[derive(Debug, Clone)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
}

/// Summary of a collection as reported by the store.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: u64,
    pub vector_size: Option<u64>,
}

/// Request/response interface to one vector store backend.
///
/// Implementations do plain transport: no retries, no validation, no result
/// shaping. Policy lives in [`crate::VectorStoreClient`].
pub trait VectorBackend: Send + Sync {
    /// Ping the store.
    fn health(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Create `collection` with the given vector dimension if it does not
    /// already exist. Idempotent.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>>;

    /// `None` when the collection does not exist.
    fn collection_info(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, Result<Option<CollectionInfo>, StoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), StoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<FieldFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, StoreError>>;
}
