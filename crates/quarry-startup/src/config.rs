//! Persisted workspace configuration.
//!
//! Stored as JSON under a hidden directory at the workspace root. Loading
//! merges field-by-field with defaults so older or partial files keep
//! working; loading never writes anything back. Saving validates first and
//! replaces the file atomically.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StartupError};

/// Hidden directory holding quarry state, relative to the workspace root.
pub const CONFIG_DIR: &str = ".quarry";
/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";
/// Default collection chunks are indexed into.
pub const DEFAULT_COLLECTION: &str = "quarry_chunks";

/// Metadata about the last completed indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub collection_name: String,
    /// Unix seconds at the time indexing finished.
    pub last_indexed_timestamp: u64,
    /// Workspace content hash at the time indexing finished.
    pub content_hash: String,
}

/// Vector store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub host: String,
    pub port: u16,
    pub index_info: Option<IndexInfo>,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6334,
            index_info: None,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// OpenAI-compatible base URL.
    pub endpoint: String,
    pub model: String,
    /// Vector dimension the provider/model pair produces.
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".into(),
            model: "nomic-embed-text".into(),
            dimensions: 768,
        }
    }
}

/// Chunk extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingSettings {
    /// Whether partial chunk sets from files with syntax errors are usable.
    pub skip_syntax_errors: bool,
}

impl Default for ParsingSettings {
    fn default() -> Self {
        Self {
            skip_syntax_errors: true,
        }
    }
}

/// How a configuration came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file on disk; defaults in use.
    Missing,
    /// File existed and parsed.
    Loaded,
    /// File existed but did not parse; defaults in use.
    Malformed,
}

/// Per-workspace configuration, single-owner, passed by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub vector_store: VectorStoreSettings,
    pub embedding: EmbeddingSettings,
    pub parsing: ParsingSettings,
}

impl Configuration {
    /// Path of the config file for `root`.
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load the configuration for `root`, merged with defaults.
    ///
    /// A missing file yields defaults, as does a malformed one; the
    /// distinction is carried in the returned [`ConfigSource`]. Never writes.
    #[must_use]
    pub fn load(root: &Path) -> (Self, ConfigSource) {
        let path = Self::path(root);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return (Self::default(), ConfigSource::Missing);
        };
        match serde_json::from_str(&raw) {
            Ok(config) => (config, ConfigSource::Loaded),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed configuration, using defaults");
                (Self::default(), ConfigSource::Malformed)
            }
        }
    }

    /// Reject a configuration that must not be persisted.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty store host, a zero port, or
    /// an embedding endpoint that is not an http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if self.vector_store.host.trim().is_empty() {
            return Err(StartupError::Validation("vector store host is empty".into()));
        }
        if self.vector_store.port == 0 {
            return Err(StartupError::Validation("vector store port is 0".into()));
        }
        let endpoint = url::Url::parse(&self.embedding.endpoint)
            .map_err(|e| StartupError::Validation(format!("embedding endpoint: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StartupError::Validation(format!(
                "embedding endpoint scheme {:?} is not http(s)",
                endpoint.scheme()
            )));
        }
        Ok(())
    }

    /// Validate and persist atomically (write-then-rename). All-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the file cannot be written.
    pub fn save(&self, root: &Path) -> Result<()> {
        self.validate()?;
        let path = Self::path(root);
        let dir = path
            .parent()
            .ok_or_else(|| StartupError::Validation("config path has no parent".into()))?;
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// gRPC URL of the configured store.
    #[must_use]
    pub fn store_url(&self) -> String {
        format!("http://{}:{}", self.vector_store.host, self.vector_store.port)
    }

    /// Collection the index lives in, falling back to the default name.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        self.vector_store
            .index_info
            .as_ref()
            .map_or(DEFAULT_COLLECTION, |info| info.collection_name.as_str())
    }

    /// Record a completed indexing run.
    pub fn mark_indexed(&mut self, collection_name: &str, content_hash: &str) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        self.vector_store.index_info = Some(IndexInfo {
            collection_name: collection_name.to_string(),
            last_indexed_timestamp: now,
            content_hash: content_hash.to_string(),
        });
    }

    /// Forget the last indexing run. Used by explicit re-index resets.
    pub fn clear_index_info(&mut self) {
        self.vector_store.index_info = None;
    }
}
