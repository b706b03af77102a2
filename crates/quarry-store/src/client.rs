//! Fail-soft vector store client: validation, batching, retries, health cache.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::backend::{CollectionInfo, FieldFilter, VectorBackend, VectorPoint};
use crate::retry::{RetryPolicy, with_retry};
use crate::types::{CodeChunk, SearchResult};

/// Maximum accepted collection vector dimension.
const MAX_DIMENSION: u64 = 65_536;
/// Maximum accepted search limit.
const MAX_SEARCH_LIMIT: usize = 10_000;

/// Client tuning knobs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Dimension of vectors accepted by `upsert_chunks`.
    pub vector_size: u64,
    /// Points per upsert batch.
    pub batch_size: usize,
    /// How long a health check result stays cached.
    pub health_check_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            vector_size: 768,
            batch_size: 32,
            health_check_interval: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HealthProbe {
    healthy: bool,
    checked_at: Instant,
}

/// Policy layer over a [`VectorBackend`].
///
/// All operations are fail-soft: invalid input or an exhausted retry budget
/// produces `false` or an empty result with the cause logged, never a panic
/// or an error crossing the component boundary.
pub struct VectorStoreClient {
    backend: Arc<dyn VectorBackend>,
    config: StoreConfig,
    health: Mutex<Option<HealthProbe>>,
}

impl std::fmt::Debug for VectorStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VectorStoreClient {
    #[must_use]
    pub fn new(backend: Arc<dyn VectorBackend>, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            health: Mutex::new(None),
        }
    }

    /// Configured upsert vector dimension.
    #[must_use]
    pub fn vector_size(&self) -> u64 {
        self.config.vector_size
    }

    /// Ping the store, caching the result for the configured interval.
    ///
    /// `force` bypasses the cache. Returns `false` on any failure.
    pub async fn health_check(&self, force: bool) -> bool {
        if !force
            && let Ok(guard) = self.health.lock()
            && let Some(probe) = *guard
            && probe.checked_at.elapsed() < self.config.health_check_interval
        {
            return probe.healthy;
        }

        let healthy = with_retry("health_check", &self.config.retry, || self.backend.health())
            .await
            .is_ok();

        if let Ok(mut guard) = self.health.lock() {
            *guard = Some(HealthProbe {
                healthy,
                checked_at: Instant::now(),
            });
        }
        healthy
    }

    /// Create `name` with the given dimension unless it already exists.
    ///
    /// Fails closed: returns `false` on invalid input or any store failure.
    pub async fn create_collection_if_not_exists(&self, name: &str, dimension: u64) -> bool {
        if !valid_collection_name(name) {
            tracing::warn!(collection = name, "rejected invalid collection name");
            return false;
        }
        if dimension == 0 || dimension > MAX_DIMENSION {
            tracing::warn!(collection = name, dimension, "rejected invalid dimension");
            return false;
        }

        with_retry("ensure_collection", &self.config.retry, || {
            self.backend.ensure_collection(name, dimension)
        })
        .await
        .is_ok()
    }

    /// Upsert `chunks` with their paired `vectors` in fixed-size batches.
    ///
    /// Validates everything up front; nothing is sent unless all pairs pass.
    /// Batches go out sequentially under deterministic point ids, so repeated
    /// runs overwrite prior points. A batch that fails after retries aborts
    /// the call; earlier batches stay persisted.
    pub async fn upsert_chunks(
        &self,
        collection: &str,
        chunks: &[CodeChunk],
        vectors: &[Vec<f32>],
    ) -> bool {
        if chunks.len() != vectors.len() {
            tracing::warn!(
                chunks = chunks.len(),
                vectors = vectors.len(),
                "chunk/vector length mismatch",
            );
            return false;
        }
        if chunks.is_empty() {
            return true;
        }

        for (chunk, vector) in chunks.iter().zip(vectors) {
            if let Err(reason) = validate_pair(chunk, vector, self.config.vector_size) {
                tracing::warn!(file = %chunk.file_path, %reason, "rejected chunk");
                return false;
            }
        }

        let points: Vec<VectorPoint> = match chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                Ok(VectorPoint {
                    id: chunk.point_id(),
                    vector: vector.clone(),
                    payload: chunk.to_payload()?,
                })
            })
            .collect::<Result<_, serde_json::Error>>()
        {
            Ok(points) => points,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode chunk payload");
                return false;
            }
        };

        for batch in points.chunks(self.config.batch_size.max(1)) {
            let sent = with_retry("upsert", &self.config.retry, || {
                self.backend.upsert(collection, batch.to_vec())
            })
            .await;
            if let Err(e) = sent {
                tracing::error!(collection, batch_len = batch.len(), error = %e, "batch upsert failed");
                return false;
            }
        }

        tracing::debug!(collection, points = points.len(), "upsert complete");
        true
    }

    /// Similarity search returning decoded chunks, best score first.
    ///
    /// Verifies the collection exists via a listing. An empty `vector` is
    /// accepted only when a `filter` selects results on its own. Returns `[]`
    /// on any failure.
    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<FieldFilter>,
    ) -> Vec<SearchResult> {
        if limit == 0 || limit > MAX_SEARCH_LIMIT {
            tracing::warn!(limit, "rejected search limit");
            return Vec::new();
        }
        if vector.is_empty() && filter.is_none() {
            tracing::warn!("rejected search with neither vector nor filter");
            return Vec::new();
        }
        if vector.iter().any(|v| !v.is_finite()) {
            tracing::warn!("rejected search vector with non-finite values");
            return Vec::new();
        }

        let collections = match with_retry("list_collections", &self.config.retry, || {
            self.backend.list_collections()
        })
        .await
        {
            Ok(names) => names,
            Err(_) => return Vec::new(),
        };
        if !collections.iter().any(|c| c == collection) {
            tracing::warn!(collection, "search against missing collection");
            return Vec::new();
        }

        let limit = limit as u64;
        let hits = match with_retry("search", &self.config.retry, || {
            self.backend
                .search(collection, vector.clone(), limit, filter.clone())
        })
        .await
        {
            Ok(hits) => hits,
            Err(_) => return Vec::new(),
        };

        hits.into_iter()
            .filter_map(|hit| {
                let chunk = CodeChunk::from_payload(&hit.payload)?;
                Some(SearchResult {
                    id: hit.id,
                    score: hit.score,
                    chunk,
                })
            })
            .collect()
    }

    /// Whether `name` appears in the store's collection listing.
    pub async fn collection_exists(&self, name: &str) -> bool {
        match with_retry("list_collections", &self.config.retry, || {
            self.backend.list_collections()
        })
        .await
        {
            Ok(names) => names.iter().any(|c| c == name),
            Err(_) => false,
        }
    }

    /// Collection summary, or `None` when missing or on any failure.
    pub async fn collection_info(&self, name: &str) -> Option<CollectionInfo> {
        with_retry("collection_info", &self.config.retry, || {
            self.backend.collection_info(name)
        })
        .await
        .ok()
        .flatten()
    }

    /// All collection names, or `[]` on failure.
    pub async fn list_collections(&self) -> Vec<String> {
        with_retry("list_collections", &self.config.retry, || {
            self.backend.list_collections()
        })
        .await
        .unwrap_or_default()
    }

    /// Delete `name`. Returns `false` on failure.
    pub async fn delete_collection(&self, name: &str) -> bool {
        with_retry("delete_collection", &self.config.retry, || {
            self.backend.delete_collection(name)
        })
        .await
        .is_ok()
    }
}

fn valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn validate_pair(chunk: &CodeChunk, vector: &[f32], dimension: u64) -> Result<(), String> {
    if chunk.file_path.is_empty() {
        return Err("chunk has empty file_path".into());
    }
    if chunk.end_line < chunk.start_line {
        return Err(format!(
            "chunk line range inverted: {}..{}",
            chunk.start_line, chunk.end_line
        ));
    }
    if vector.len() as u64 != dimension {
        return Err(format!(
            "vector length {} does not match collection dimension {dimension}",
            vector.len()
        ));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err("vector contains NaN or infinite values".into());
    }
    Ok(())
}
