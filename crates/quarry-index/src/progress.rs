//! Progress and result types for an indexing run.

use std::sync::Arc;

use quarry_store::CodeChunk;

/// Pipeline stage a work unit is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexPhase {
    Discovering,
    Parsing,
    Embedding,
    Storing,
}

impl IndexPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Parsing => "parsing",
            Self::Embedding => "embedding",
            Self::Storing => "storing",
        }
    }
}

/// Observational snapshot emitted during a run; never read back.
#[derive(Debug, Clone)]
pub struct IndexingProgress {
    pub phase: IndexPhase,
    pub processed_files: usize,
    pub total_files: usize,
    pub current_file: Option<String>,
}

/// One file that failed without aborting the run.
#[derive(Debug, Clone)]
pub struct FileError {
    pub path: String,
    pub message: String,
}

/// Terminal summary of an indexing run.
///
/// `success` reflects only fatal, run-level conditions; per-file failures
/// live in `errors` and do not clear it.
#[derive(Debug, Default)]
pub struct IndexingResult {
    pub success: bool,
    pub total_files: usize,
    pub processed_files: usize,
    pub chunks: Vec<CodeChunk>,
    pub errors: Vec<FileError>,
    pub duration_ms: u64,
}

/// Caller-supplied progress observer. Invoked zero or more times per run;
/// panics inside the callback are swallowed.
pub type ProgressCallback = Arc<dyn Fn(IndexingProgress) + Send + Sync>;

/// Invoke `callback` shielded from its own panics.
pub(crate) fn emit(callback: Option<&ProgressCallback>, progress: IndexingProgress) {
    if let Some(cb) = callback {
        let guarded = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(progress)));
        if guarded.is_err() {
            tracing::warn!("progress callback panicked; continuing");
        }
    }
}
