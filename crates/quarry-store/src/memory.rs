//! In-memory [`VectorBackend`] for tests. Cosine scoring, equality filters.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use crate::backend::{
    CollectionInfo, FieldFilter, FilterValue, ScoredVectorPoint, VectorBackend, VectorPoint,
};
use crate::error::{Result, StoreError};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct Collection {
    vector_size: u64,
    points: HashMap<String, StoredPoint>,
}

/// Process-local vector store used by unit tests and the `mock` feature.
pub struct InMemoryBackend {
    collections: RwLock<HashMap<String, Collection>>,
    healthy: std::sync::atomic::AtomicBool,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            healthy: std::sync::atomic::AtomicBool::new(true),
        }
    }

    /// Make subsequent operations fail as if the store were unreachable.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy
            .store(healthy, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of points currently stored in `collection`.
    #[must_use]
    pub fn point_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, |col| col.points.len()))
            .unwrap_or(0)
    }

    fn check_healthy(&self) -> Result<()> {
        if self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Connection("connection refused".into()))
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend").finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(payload: &HashMap<String, serde_json::Value>, filter: &FieldFilter) -> bool {
    filter.must.iter().all(|cond| {
        payload.get(&cond.field).is_some_and(|v| match &cond.value {
            FilterValue::Text(s) => v.as_str() == Some(s.as_str()),
            FilterValue::Integer(i) => v.as_i64() == Some(*i),
        })
    })
}

impl VectorBackend for InMemoryBackend {
    fn health(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { self.check_healthy() })
    }

    fn ensure_collection(&self, collection: &str, vector_size: u64) -> BoxFuture<'_, Result<()>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.check_healthy()?;
            let mut collections = self
                .collections
                .write()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            collections.entry(collection).or_insert_with(|| Collection {
                vector_size,
                points: HashMap::new(),
            });
            Ok(())
        })
    }

    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async {
            self.check_healthy()?;
            let collections = self
                .collections
                .read()
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            Ok(collections.keys().cloned().collect())
        })
    }

    fn collection_info(&self, collection: &str) -> BoxFuture<'_, Result<Option<CollectionInfo>>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.check_healthy()?;
            let collections = self
                .collections
                .read()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            Ok(collections.get(&collection).map(|c| CollectionInfo {
                name: collection.clone(),
                points_count: c.points.len() as u64,
                vector_size: Some(c.vector_size),
            }))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<()>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.check_healthy()?;
            let mut collections = self
                .collections
                .write()
                .map_err(|e| StoreError::Delete(e.to_string()))?;
            collections.remove(&collection);
            Ok(())
        })
    }

    fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> BoxFuture<'_, Result<()>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.check_healthy()?;
            let mut collections = self
                .collections
                .write()
                .map_err(|e| StoreError::Upsert(e.to_string()))?;
            let col = collections
                .get_mut(&collection)
                .ok_or_else(|| StoreError::Upsert(format!("collection {collection} not found")))?;
            for point in points {
                col.points.insert(
                    point.id,
                    StoredPoint {
                        vector: point.vector,
                        payload: point.payload,
                    },
                );
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<FieldFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.check_healthy()?;
            let collections = self
                .collections
                .read()
                .map_err(|e| StoreError::Search(e.to_string()))?;
            let col = collections
                .get(&collection)
                .ok_or_else(|| StoreError::Search(format!("collection {collection} not found")))?;

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .filter(|(_, p)| {
                    filter
                        .as_ref()
                        .is_none_or(|f| matches_filter(&p.payload, f))
                })
                .map(|(id, p)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &p.vector),
                    payload: p.payload.clone(),
                })
                .collect();

            scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }
}
