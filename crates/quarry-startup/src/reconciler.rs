//! Startup staleness reconciliation.
//!
//! Decides, once per startup, whether the workspace needs setup, can go
//! straight to search, or must be re-indexed. The decision is a strict
//! first-match ladder: configuration presence, store connectivity, collection
//! existence, content hash comparison.

use std::path::Path;
use std::sync::Arc;

use quarry_store::VectorStoreClient;

use crate::config::{ConfigSource, Configuration};
use crate::gitignore::ensure_gitignore_entry;
use crate::hash::workspace_content_hash;

/// What the host should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupAction {
    ShowSetup,
    ProceedToSearch,
    TriggerReindexing,
}

/// Outcome of one startup evaluation.
#[derive(Debug, Clone)]
pub struct StartupDecision {
    pub action: StartupAction,
    pub reason: &'static str,
    pub configuration_loaded: bool,
    pub store_connected: bool,
    pub index_valid: bool,
    pub reindexing_needed: bool,
}

/// Owns the per-workspace [`Configuration`] and gates indexing behind the
/// startup decision ladder.
pub struct StalenessReconciler {
    store: Arc<VectorStoreClient>,
}

impl std::fmt::Debug for StalenessReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StalenessReconciler").finish_non_exhaustive()
    }
}

impl StalenessReconciler {
    #[must_use]
    pub fn new(store: Arc<VectorStoreClient>) -> Self {
        Self { store }
    }

    /// Evaluate the decision ladder for `root`.
    ///
    /// Returns the configuration in effect (persisted, or defaults when
    /// missing or malformed) together with the decision. Loading defaults
    /// never writes the config file; the only side effect is keeping the
    /// state directory ignored by version control.
    pub async fn execute_startup_flow(&self, root: &Path) -> (Configuration, StartupDecision) {
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "workspace root inaccessible");
            return (
                Configuration::default(),
                StartupDecision {
                    action: StartupAction::ShowSetup,
                    reason: "No configuration found",
                    configuration_loaded: false,
                    store_connected: false,
                    index_valid: false,
                    reindexing_needed: false,
                },
            );
        }

        if let Err(e) = ensure_gitignore_entry(root) {
            tracing::warn!(error = %e, "could not update ignore file");
        }

        let (config, source) = Configuration::load(root);
        if source == ConfigSource::Missing {
            return (
                config,
                StartupDecision {
                    action: StartupAction::ShowSetup,
                    reason: "No configuration found",
                    configuration_loaded: false,
                    store_connected: false,
                    index_valid: false,
                    reindexing_needed: false,
                },
            );
        }
        let configuration_loaded = true;

        if !self.store.health_check(true).await {
            return (
                config,
                StartupDecision {
                    action: StartupAction::ShowSetup,
                    reason: "Qdrant connection failed",
                    configuration_loaded,
                    store_connected: false,
                    index_valid: false,
                    reindexing_needed: false,
                },
            );
        }

        let collection = config.collection_name().to_string();
        let index_exists = config.vector_store.index_info.is_some()
            && self.store.collection_exists(&collection).await;
        if !index_exists {
            return (
                config,
                StartupDecision {
                    action: StartupAction::TriggerReindexing,
                    reason: "Index collection does not exist",
                    configuration_loaded,
                    store_connected: true,
                    index_valid: false,
                    reindexing_needed: true,
                },
            );
        }

        let persisted_hash = config
            .vector_store
            .index_info
            .as_ref()
            .map(|info| info.content_hash.clone())
            .unwrap_or_default();
        let current_hash = match workspace_content_hash(root) {
            Ok(hash) => hash,
            Err(e) => {
                // An uncomputable hash cannot confirm freshness.
                tracing::warn!(error = %e, "content hash failed, forcing re-index");
                String::new()
            }
        };
        if persisted_hash != current_hash {
            return (
                config,
                StartupDecision {
                    action: StartupAction::TriggerReindexing,
                    reason: "Content has changed since last indexing",
                    configuration_loaded,
                    store_connected: true,
                    index_valid: false,
                    reindexing_needed: true,
                },
            );
        }

        (
            config,
            StartupDecision {
                action: StartupAction::ProceedToSearch,
                reason: "Configuration valid and index exists",
                configuration_loaded,
                store_connected: true,
                index_valid: true,
                reindexing_needed: false,
            },
        )
    }
}
