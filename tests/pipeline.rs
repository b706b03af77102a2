//! End-to-end pipeline over in-process backends: index a workspace, query
//! it, and run the startup decision against the resulting state.

use std::path::Path;
use std::sync::Arc;

use quarry_embed::MockEmbedder;
use quarry_index::{FsChunkSource, IndexingOrchestrator, OrchestratorConfig};
use quarry_search::{ContextQueryEngine, QueryRequest};
use quarry_startup::{
    Configuration, StalenessReconciler, StartupAction, workspace_content_hash,
};
use quarry_store::{InMemoryBackend, StoreConfig, VectorStoreClient};

const COLLECTION: &str = "quarry_chunks";

fn store() -> Arc<VectorStoreClient> {
    Arc::new(VectorStoreClient::new(
        Arc::new(InMemoryBackend::new()),
        StoreConfig {
            vector_size: 8,
            ..StoreConfig::default()
        },
    ))
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("auth.rs"),
        "fn verify_token(token: &str) -> bool {\n    !token.is_empty()\n}\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("db.py"),
        "def open_connection(url):\n    return connect(url)\n",
    )
    .unwrap();
    dir
}

async fn index(root: &Path, store: Arc<VectorStoreClient>) {
    let orchestrator = IndexingOrchestrator::new(
        Arc::new(FsChunkSource::default()),
        Arc::new(MockEmbedder::default()),
        store,
        OrchestratorConfig {
            collection: COLLECTION.into(),
            max_workers: 2,
            skip_syntax_errors: true,
        },
    );
    let result = orchestrator.start_indexing(root, None).await;
    assert!(result.success, "indexing failed: {:?}", result.errors);
    assert_eq!(result.processed_files, 2);
}

#[tokio::test]
async fn index_then_search_finds_relevant_file() {
    let dir = workspace();
    let store = store();
    index(dir.path(), store.clone()).await;

    let engine = ContextQueryEngine::new(
        Arc::new(MockEmbedder::default()),
        store,
        COLLECTION.into(),
    );
    let response = engine
        .query(QueryRequest::new("fn verify_token(token: &str)"))
        .await
        .unwrap();

    assert!(!response.results.is_empty());
    assert!(response.results[0].file_path.ends_with("auth.rs"));
    // One hit per file, ever.
    let mut paths: Vec<&str> = response.results.iter().map(|h| h.file_path.as_str()).collect();
    paths.sort_unstable();
    paths.dedup();
    assert_eq!(paths.len(), response.results.len());
}

#[tokio::test]
async fn startup_flow_settles_after_indexing() {
    let dir = workspace();
    let store = store();
    let reconciler = StalenessReconciler::new(store.clone());

    let (_, decision) = reconciler.execute_startup_flow(dir.path()).await;
    assert_eq!(decision.action, StartupAction::ShowSetup);

    index(dir.path(), store.clone()).await;
    let mut config = Configuration::default();
    let hash = workspace_content_hash(dir.path()).unwrap();
    config.mark_indexed(COLLECTION, &hash);
    config.save(dir.path()).unwrap();

    let (_, decision) = reconciler.execute_startup_flow(dir.path()).await;
    assert_eq!(decision.action, StartupAction::ProceedToSearch);

    std::fs::write(dir.path().join("new.rs"), "fn fresh() {}\n").unwrap();
    let (_, decision) = reconciler.execute_startup_flow(dir.path()).await;
    assert_eq!(decision.action, StartupAction::TriggerReindexing);
    assert_eq!(decision.reason, "Content has changed since last indexing");
}
