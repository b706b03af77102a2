//! Indexing orchestrator: enumerate → parse → embed → store across a
//! bounded worker pool, with per-file error isolation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use quarry_embed::Embedder;
use quarry_store::{CodeChunk, VectorStoreClient};

use crate::error::{IndexError, Result};
use crate::progress::{
    FileError, IndexPhase, IndexingProgress, IndexingResult, ProgressCallback, emit,
};
use crate::source::ChunkSource;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub collection: String,
    /// Worker pool bound; `0` means one worker per available core.
    pub max_workers: usize,
    /// When true, files whose parse reported errors still contribute their
    /// partial chunk set; when false they are excluded and recorded.
    pub skip_syntax_errors: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            collection: "quarry_chunks".into(),
            max_workers: 0,
            skip_syntax_errors: true,
        }
    }
}

enum FileOutcome {
    Indexed(Vec<CodeChunk>),
    Failed(FileError),
    Skipped,
}

/// Shared run state: the processed counter and the serialized progress sink.
struct RunContext {
    processed: AtomicUsize,
    total: usize,
    callback: Option<ProgressCallback>,
    // Serializes callback invocations so observed processed_files counts
    // never decrease across interleaved workers.
    emit_lock: std::sync::Mutex<()>,
}

impl RunContext {
    fn emit(&self, phase: IndexPhase, current_file: Option<String>) {
        let _guard = self.emit_lock.lock();
        emit(
            self.callback.as_ref(),
            IndexingProgress {
                phase,
                processed_files: self.processed.load(Ordering::SeqCst),
                total_files: self.total,
                current_file,
            },
        );
    }
}

/// Coordinates one indexing run over a workspace tree.
pub struct IndexingOrchestrator<S, E> {
    source: Arc<S>,
    embedder: Arc<E>,
    store: Arc<VectorStoreClient>,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl<S, E> IndexingOrchestrator<S, E>
where
    S: ChunkSource + 'static,
    E: Embedder + 'static,
{
    #[must_use]
    pub fn new(
        source: Arc<S>,
        embedder: Arc<E>,
        store: Arc<VectorStoreClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            source,
            embedder,
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Request cancellation: in-flight files finish, queued files do not
    /// start. Skipped files are not counted as errors.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Release run resources. Idempotent; safe before, during, or after a
    /// run.
    pub fn cleanup(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
        }
        tracing::debug!("orchestrator cleaned up");
    }

    /// Run the full pipeline over `root`.
    ///
    /// Never returns an error: fatal conditions produce a well-formed result
    /// with `success = false`, per-file failures are collected in `errors`.
    pub async fn start_indexing(
        &self,
        root: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> IndexingResult {
        let start = Instant::now();
        let mut result = IndexingResult::default();

        emit(
            on_progress.as_ref(),
            IndexingProgress {
                phase: IndexPhase::Discovering,
                processed_files: 0,
                total_files: 0,
                current_file: None,
            },
        );

        // Nothing to do is not a failure.
        if !root.exists() {
            tracing::info!(root = %root.display(), "workspace root does not exist, nothing to index");
            result.success = true;
            result.duration_ms = duration_ms(start);
            return result;
        }

        let files = match self.source.enumerate_files(root) {
            Ok(files) => files,
            Err(e) => {
                result.errors.push(FileError {
                    path: root.display().to_string(),
                    message: format!("file enumeration failed: {e}"),
                });
                result.duration_ms = duration_ms(start);
                return result;
            }
        };
        result.total_files = files.len();

        if files.is_empty() {
            result.success = true;
            result.duration_ms = duration_ms(start);
            return result;
        }

        if !self.embedder.is_available().await {
            result.errors.push(FileError {
                path: root.display().to_string(),
                message: "embedding service is not available".into(),
            });
            result.duration_ms = duration_ms(start);
            return result;
        }

        let dimension = self.embedder.dimensions() as u64;
        if !self
            .store
            .create_collection_if_not_exists(&self.config.collection, dimension)
            .await
        {
            result.errors.push(FileError {
                path: root.display().to_string(),
                message: format!(
                    "could not ensure collection {:?} (dimension {dimension})",
                    self.config.collection
                ),
            });
            result.duration_ms = duration_ms(start);
            return result;
        }

        let ctx = Arc::new(RunContext {
            processed: AtomicUsize::new(0),
            total: files.len(),
            callback: on_progress,
            emit_lock: std::sync::Mutex::new(()),
        });
        ctx.emit(IndexPhase::Discovering, None);

        let workers = self.worker_count(files.len());
        tracing::info!(total = files.len(), workers, "indexing started");

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut pool: JoinSet<(String, FileOutcome)> = JoinSet::new();

        for path in files {
            let display_path = path.display().to_string();
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();
            let ctx = ctx.clone();
            let source = self.source.clone();
            let embedder = self.embedder.clone();
            let store = self.store.clone();
            let collection = self.config.collection.clone();
            let skip_syntax_errors = self.config.skip_syntax_errors;

            pool.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (display_path, FileOutcome::Skipped);
                };
                if cancel.is_cancelled() {
                    return (display_path, FileOutcome::Skipped);
                }

                let unit_phase = AtomicU8::new(IndexPhase::Parsing as u8);
                let work = process_file(
                    source,
                    embedder,
                    store,
                    collection,
                    skip_syntax_errors,
                    path,
                    &ctx,
                    &unit_phase,
                );
                let outcome = match std::panic::AssertUnwindSafe(work).catch_unwind().await {
                    Ok(Ok(chunks)) => FileOutcome::Indexed(chunks),
                    Ok(Err(e)) => FileOutcome::Failed(FileError {
                        path: display_path.clone(),
                        message: e.to_string(),
                    }),
                    Err(_) => FileOutcome::Failed(FileError {
                        path: display_path.clone(),
                        message: "worker panicked".into(),
                    }),
                };

                ctx.processed.fetch_add(1, Ordering::SeqCst);
                // A failed unit reports the phase it reached, not Storing.
                ctx.emit(
                    phase_from(unit_phase.load(Ordering::SeqCst)),
                    Some(display_path.clone()),
                );
                (display_path, outcome)
            });
        }

        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok((_, FileOutcome::Indexed(chunks))) => {
                    result.processed_files += 1;
                    result.chunks.extend(chunks);
                }
                Ok((path, FileOutcome::Failed(error))) => {
                    result.processed_files += 1;
                    tracing::warn!(file = %path, error = %error.message, "file failed, continuing");
                    result.errors.push(error);
                }
                Ok((_, FileOutcome::Skipped)) => {}
                Err(e) => {
                    // Panics are caught inside the task; this is abort only.
                    tracing::warn!(error = %e, "worker task did not complete");
                }
            }
        }

        result.success = true;
        result.duration_ms = duration_ms(start);
        tracing::info!(
            processed = result.processed_files,
            chunks = result.chunks.len(),
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "indexing finished",
        );
        result
    }

    fn worker_count(&self, files: usize) -> usize {
        let cores = std::thread::available_parallelism().map_or(4, |n| n.get());
        let bound = if self.config.max_workers == 0 {
            cores
        } else {
            self.config.max_workers.min(cores)
        };
        bound.min(files).max(1)
    }
}

fn phase_from(value: u8) -> IndexPhase {
    match value {
        0 => IndexPhase::Discovering,
        1 => IndexPhase::Parsing,
        2 => IndexPhase::Embedding,
        _ => IndexPhase::Storing,
    }
}

/// One file's pipeline: read → parse → embed → store, strictly sequential.
/// `unit_phase` tracks the last phase entered, surviving errors and panics.
#[allow(clippy::too_many_arguments)]
async fn process_file<S, E>(
    source: Arc<S>,
    embedder: Arc<E>,
    store: Arc<VectorStoreClient>,
    collection: String,
    skip_syntax_errors: bool,
    path: PathBuf,
    ctx: &RunContext,
    unit_phase: &AtomicU8,
) -> Result<Vec<CodeChunk>>
where
    S: ChunkSource,
    E: Embedder,
{
    let display_path = path.display().to_string();
    let enter = |phase: IndexPhase| {
        unit_phase.store(phase as u8, Ordering::SeqCst);
        ctx.emit(phase, Some(display_path.clone()));
    };

    let content = tokio::fs::read_to_string(&path).await?;
    let language = source.language_for(&path);

    enter(IndexPhase::Parsing);
    let outcome = source.parse(&path, &content, &language);
    if !outcome.errors.is_empty() && !skip_syntax_errors {
        return Err(IndexError::Parse(outcome.errors.join("; ")));
    }
    if outcome.chunks.is_empty() {
        return Ok(Vec::new());
    }

    enter(IndexPhase::Embedding);
    let texts: Vec<String> = outcome.chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;

    enter(IndexPhase::Storing);
    if !store.upsert_chunks(&collection, &outcome.chunks, &vectors).await {
        return Err(IndexError::Store(format!(
            "upsert of {} chunks rejected",
            outcome.chunks.len()
        )));
    }

    Ok(outcome.chunks)
}

fn duration_ms(start: Instant) -> u64 {
    start.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}
