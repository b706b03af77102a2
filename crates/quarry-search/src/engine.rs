//! Context query engine: embed the query, search the store with headroom,
//! collapse to one hit per file, rank, and optionally attach file contents.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use quarry_embed::Embedder;
use quarry_store::{FieldFilter, SearchResult, VectorStoreClient};

use crate::error::{Result, SearchError};

/// Largest accepted `max_results`.
const MAX_RESULTS_CAP: usize = 1_000;
/// Ceiling on the widened store-side limit.
const MAX_STORE_LIMIT: usize = 10_000;
/// Floor for the widened store-side limit, so dedup has room to collapse
/// same-file hits even for small requests.
const MIN_STORE_HEADROOM: usize = 50;

/// One context query.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub max_results: usize,
    /// Attach the full current file content to each hit.
    pub include_content: bool,
    /// Restrict hits to one payload language tag.
    pub language: Option<String>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 10,
            include_content: false,
            language: None,
        }
    }
}

impl QueryRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// One ranked hit. `content` is the stored chunk text, replaced by the full
/// current on-disk file when content augmentation is requested and the read
/// succeeds.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub file_path: String,
    pub score: f32,
    pub start_line: u32,
    pub end_line: u32,
    pub language: String,
    pub kind: String,
    pub content: String,
}

/// Full query outcome.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub results: Vec<QueryHit>,
    /// Always equals `results.len()`.
    pub total_results: usize,
    pub query: String,
    pub processing_time_ms: u64,
}

/// Read-side engine over an embedder and the vector store client.
pub struct ContextQueryEngine<E> {
    embedder: Arc<E>,
    store: Arc<VectorStoreClient>,
    collection: String,
}

impl<E> std::fmt::Debug for ContextQueryEngine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextQueryEngine")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl<E: Embedder> ContextQueryEngine<E> {
    #[must_use]
    pub fn new(embedder: Arc<E>, store: Arc<VectorStoreClient>, collection: String) -> Self {
        Self {
            embedder,
            store,
            collection,
        }
    }

    /// Run one query end to end.
    ///
    /// Store outages degrade to an empty result set; only input validation
    /// and the query-side embedding can fail.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty query, an out-of-range `max_results`,
    /// or an embedding failure.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let start = Instant::now();

        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if request.max_results == 0 || request.max_results > MAX_RESULTS_CAP {
            return Err(SearchError::InvalidLimit {
                got: request.max_results,
                max: MAX_RESULTS_CAP,
            });
        }

        let vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or(SearchError::MissingQueryVector)?;

        let filter = request
            .language
            .as_deref()
            .map(|lang| FieldFilter::matches_text("language", lang));
        let store_limit = store_limit(request.max_results);
        let hits = self
            .store
            .search(&self.collection, vector, store_limit, filter)
            .await;

        let mut ranked = rank(dedup_by_file(hits));
        ranked.truncate(request.max_results);

        let mut results = Vec::with_capacity(ranked.len());
        for hit in ranked {
            // On a failed read the indexed chunk text stands in; a stale
            // snippet beats losing the hit.
            let content = if request.include_content {
                read_file_content(&hit.chunk.file_path)
                    .await
                    .unwrap_or(hit.chunk.content)
            } else {
                hit.chunk.content
            };
            results.push(QueryHit {
                file_path: hit.chunk.file_path,
                score: hit.score,
                start_line: hit.chunk.start_line,
                end_line: hit.chunk.end_line,
                language: hit.chunk.language,
                kind: hit.chunk.kind,
                content,
            });
        }

        let response = QueryResponse {
            total_results: results.len(),
            results,
            query: query.to_string(),
            processing_time_ms: start.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        };
        tracing::debug!(
            query,
            returned = response.results.len(),
            total = response.total_results,
            ms = response.processing_time_ms,
            "query complete",
        );
        Ok(response)
    }
}

/// Widened store-side limit: enough headroom for dedup to collapse files.
fn store_limit(max_results: usize) -> usize {
    max_results
        .saturating_mul(3)
        .max(MIN_STORE_HEADROOM)
        .min(MAX_STORE_LIMIT)
}

/// Keep one hit per file path, the highest-scored one. On a tie the earlier
/// hit wins; a strictly greater score replaces.
fn dedup_by_file(hits: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();
    for hit in hits {
        if let Some(&i) = by_path.get(&hit.chunk.file_path) {
            if hit.score > kept[i].score {
                kept[i] = hit;
            }
        } else {
            by_path.insert(hit.chunk.file_path.clone(), kept.len());
            kept.push(hit);
        }
    }
    kept
}

/// Stable sort, best score first. Ties keep their incoming order.
fn rank(mut hits: Vec<SearchResult>) -> Vec<SearchResult> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits
}

async fn read_file_content(path: &str) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::debug!(file = path, error = %e, "content augmentation skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_embed::MockEmbedder;
    use quarry_store::{CodeChunk, InMemoryBackend, StoreConfig};

    use super::*;

    fn result(path: &str, score: f32) -> SearchResult {
        SearchResult {
            id: format!("{path}:{score}"),
            score,
            chunk: CodeChunk {
                file_path: path.into(),
                content: format!("chunk of {path}"),
                start_line: 1,
                end_line: 3,
                kind: "block".into(),
                language: "rust".into(),
                name: None,
                signature: None,
            },
        }
    }

    #[test]
    fn dedup_keeps_best_score_per_file() {
        let hits = vec![
            result("a.rs", 0.9),
            result("b.rs", 0.8),
            result("a.rs", 0.85),
        ];
        let kept = rank(dedup_by_file(hits));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].chunk.file_path, "a.rs");
        assert!((kept[0].score - 0.9).abs() < f32::EPSILON);
        assert_eq!(kept[1].chunk.file_path, "b.rs");
    }

    #[test]
    fn dedup_tie_keeps_first_seen() {
        let mut first = result("a.rs", 0.7);
        first.id = "first".into();
        let mut second = result("a.rs", 0.7);
        second.id = "second".into();
        let kept = dedup_by_file(vec![first, second]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "first");
    }

    #[test]
    fn rank_is_descending_and_stable() {
        let hits = vec![
            result("a.rs", 0.5),
            result("b.rs", 0.9),
            result("c.rs", 0.5),
        ];
        let ranked = rank(hits);
        assert_eq!(ranked[0].chunk.file_path, "b.rs");
        assert_eq!(ranked[1].chunk.file_path, "a.rs");
        assert_eq!(ranked[2].chunk.file_path, "c.rs");
    }

    #[test]
    fn store_limit_headroom() {
        assert_eq!(store_limit(1), 50);
        assert_eq!(store_limit(10), 50);
        assert_eq!(store_limit(100), 300);
        assert_eq!(store_limit(1_000), 3_000);
    }

    fn chunk(path: &str, content: &str) -> CodeChunk {
        CodeChunk {
            file_path: path.into(),
            content: content.into(),
            start_line: 1,
            end_line: 2,
            kind: "block".into(),
            language: "rust".into(),
            name: None,
            signature: None,
        }
    }

    async fn seeded_engine(
        files: &[(&str, &str)],
    ) -> (Arc<MockEmbedder>, ContextQueryEngine<MockEmbedder>) {
        let embedder = Arc::new(MockEmbedder::default());
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(VectorStoreClient::new(
            backend,
            StoreConfig {
                vector_size: 8,
                ..StoreConfig::default()
            },
        ));
        assert!(store.create_collection_if_not_exists("chunks", 8).await);

        let chunks: Vec<CodeChunk> = files.iter().map(|(p, c)| chunk(p, c)).collect();
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert!(store.upsert_chunks("chunks", &chunks, &vectors).await);

        let engine = ContextQueryEngine::new(embedder.clone(), store, "chunks".into());
        (embedder, engine)
    }

    #[tokio::test]
    async fn rejects_empty_query() {
        let (_, engine) = seeded_engine(&[]).await;
        let err = engine.query(QueryRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, SearchError::EmptyQuery));
    }

    #[tokio::test]
    async fn rejects_bad_limits() {
        let (_, engine) = seeded_engine(&[]).await;
        let mut request = QueryRequest::new("anything");
        request.max_results = 0;
        assert!(matches!(
            engine.query(request.clone()).await,
            Err(SearchError::InvalidLimit { .. })
        ));
        request.max_results = 1_001;
        assert!(matches!(
            engine.query(request).await,
            Err(SearchError::InvalidLimit { .. })
        ));
    }

    #[tokio::test]
    async fn query_returns_ranked_deduped_hits() {
        let (_, engine) = seeded_engine(&[
            ("src/auth.rs", "fn verify_token(token: &str) -> bool"),
            ("src/db.rs", "fn open_connection(url: &str)"),
        ])
        .await;

        let response = engine
            .query(QueryRequest::new("verify_token token"))
            .await
            .unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].file_path, "src/auth.rs");
        assert!(response.results[0].score >= response.results[1].score);
        assert_eq!(response.total_results, 2);
        assert_eq!(
            response.results[0].content,
            "fn verify_token(token: &str) -> bool"
        );
    }

    #[tokio::test]
    async fn max_results_truncates_after_dedup() {
        let (_, engine) = seeded_engine(&[
            ("a.rs", "alpha"),
            ("b.rs", "beta"),
            ("c.rs", "gamma"),
        ])
        .await;

        let mut request = QueryRequest::new("alpha");
        request.max_results = 2;
        let response = engine.query(request).await.unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.total_results, 2);
    }

    #[tokio::test]
    async fn missing_collection_degrades_to_empty() {
        let embedder = Arc::new(MockEmbedder::default());
        let store = Arc::new(VectorStoreClient::new(
            Arc::new(InMemoryBackend::new()),
            StoreConfig {
                vector_size: 8,
                ..StoreConfig::default()
            },
        ));
        let engine = ContextQueryEngine::new(embedder, store, "absent".into());

        let response = engine.query(QueryRequest::new("anything")).await.unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.total_results, 0);
    }

    #[tokio::test]
    async fn embedder_failure_surfaces_as_error() {
        let embedder = Arc::new(MockEmbedder::failing_on("doomed"));
        let store = Arc::new(VectorStoreClient::new(
            Arc::new(InMemoryBackend::new()),
            StoreConfig::default(),
        ));
        let engine = ContextQueryEngine::new(embedder, store, "chunks".into());

        let err = engine
            .query(QueryRequest::new("doomed query"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Embed(_)));
    }

    #[tokio::test]
    async fn include_content_reads_current_file_and_falls_back_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let on_disk = dir.path().join("real.rs");
        std::fs::write(&on_disk, "fn current() {} // edited since indexing\n").unwrap();

        let (_, engine) = seeded_engine(&[
            (on_disk.to_str().unwrap(), "fn current() {}"),
            ("gone/away.rs", "fn current() {} fn too() {}"),
        ])
        .await;

        let mut request = QueryRequest::new("fn current");
        request.include_content = true;
        let response = engine.query(request).await.unwrap();
        assert_eq!(response.results.len(), 2);

        let by_path: HashMap<&str, &QueryHit> = response
            .results
            .iter()
            .map(|h| (h.file_path.as_str(), h))
            .collect();
        assert_eq!(
            by_path[on_disk.to_str().unwrap()].content,
            "fn current() {} // edited since indexing\n"
        );
        // Unreadable file keeps the indexed chunk text.
        assert_eq!(by_path["gone/away.rs"].content, "fn current() {} fn too() {}");
    }

    #[tokio::test]
    async fn language_filter_narrows_results() {
        let embedder = Arc::new(MockEmbedder::default());
        let store = Arc::new(VectorStoreClient::new(
            Arc::new(InMemoryBackend::new()),
            StoreConfig {
                vector_size: 8,
                ..StoreConfig::default()
            },
        ));
        store.create_collection_if_not_exists("chunks", 8).await;

        let mut rust = chunk("lib.rs", "shared identifier");
        rust.language = "rust".into();
        let mut python = chunk("lib.py", "shared identifier");
        python.language = "python".into();
        let chunks = vec![rust, python];
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert!(store.upsert_chunks("chunks", &chunks, &vectors).await);

        let engine = ContextQueryEngine::new(embedder, store, "chunks".into());
        let mut request = QueryRequest::new("shared identifier");
        request.language = Some("python".into());
        let response = engine.query(request).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].file_path, "lib.py");
    }
}
