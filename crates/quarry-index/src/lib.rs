//! Workspace indexing pipeline.
//!
//! A bounded worker pool runs each file through enumerate → parse → embed →
//! store. Failures are isolated per file; only run-level conditions (broken
//! enumeration, unreachable embedder or store) are fatal.

pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod source;

pub use error::{IndexError, Result};
pub use orchestrator::{IndexingOrchestrator, OrchestratorConfig};
pub use progress::{
    FileError, IndexPhase, IndexingProgress, IndexingResult, ProgressCallback,
};
pub use source::{ChunkSource, FsChunkSource, ParseOutcome, detect_language, is_indexable};
