//! Startup state for quarry: persisted configuration, workspace content
//! hashing, and the staleness decision that gates indexing.

pub mod config;
pub mod error;
pub mod gitignore;
pub mod hash;
pub mod reconciler;

pub use config::{
    ConfigSource, Configuration, EmbeddingSettings, IndexInfo, ParsingSettings,
    VectorStoreSettings, CONFIG_DIR, CONFIG_FILE, DEFAULT_COLLECTION,
};
pub use error::{Result, StartupError};
pub use gitignore::ensure_gitignore_entry;
pub use hash::workspace_content_hash;
pub use reconciler::{StalenessReconciler, StartupAction, StartupDecision};
