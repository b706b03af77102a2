use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use quarry_embed::HttpEmbedder;
use quarry_index::{
    FsChunkSource, IndexingOrchestrator, IndexingResult, OrchestratorConfig, ProgressCallback,
};
use quarry_search::{ContextQueryEngine, QueryRequest};
use quarry_startup::{
    Configuration, StalenessReconciler, StartupAction, workspace_content_hash,
};
use quarry_store::{QdrantBackend, StoreConfig, VectorStoreClient};

#[derive(Parser)]
#[command(name = "quarry", version, about = "Workspace code indexing and semantic search")]
struct Cli {
    /// Workspace root.
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Qdrant gRPC URL; overrides the configured host and port.
    #[arg(long, global = true)]
    qdrant_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the startup decision for this workspace.
    Status,
    /// Index the workspace (runs only when stale unless forced).
    Index {
        /// Re-index even when the content hash is unchanged.
        #[arg(long)]
        force: bool,
    },
    /// Query the index.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        max_results: usize,
        /// Attach current on-disk file contents to each hit.
        #[arg(long)]
        content: bool,
        /// Restrict hits to one language tag.
        #[arg(long)]
        language: Option<String>,
        /// Emit the response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Drop the index collection and forget index metadata.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let root = cli.root.canonicalize().unwrap_or(cli.root.clone());

    let (config, _) = Configuration::load(&root);
    let store_url = cli.qdrant_url.clone().unwrap_or_else(|| config.store_url());
    let backend = Arc::new(QdrantBackend::new(&store_url).context("qdrant client")?);
    let store = Arc::new(VectorStoreClient::new(
        backend,
        StoreConfig {
            vector_size: config.embedding.dimensions as u64,
            ..StoreConfig::default()
        },
    ));

    match cli.command {
        Command::Status => status(&root, store).await,
        Command::Index { force } => index(&root, store, force).await,
        Command::Search {
            query,
            max_results,
            content,
            language,
            json,
        } => {
            search(&root, store, query, max_results, content, language, json).await
        }
        Command::Reset => reset(&root, store).await,
    }
}

async fn status(root: &Path, store: Arc<VectorStoreClient>) -> anyhow::Result<()> {
    let reconciler = StalenessReconciler::new(store);
    let (config, decision) = reconciler.execute_startup_flow(root).await;

    println!("action:       {:?}", decision.action);
    println!("reason:       {}", decision.reason);
    println!("config:       {}", if decision.configuration_loaded { "loaded" } else { "missing" });
    println!("store:        {}", if decision.store_connected { "connected" } else { "unreachable" });
    println!("collection:   {}", config.collection_name());
    if let Some(info) = &config.vector_store.index_info {
        println!("last indexed: {} (unix)", info.last_indexed_timestamp);
    }
    Ok(())
}

async fn index(root: &Path, store: Arc<VectorStoreClient>, force: bool) -> anyhow::Result<()> {
    let reconciler = StalenessReconciler::new(store.clone());
    let (mut config, decision) = reconciler.execute_startup_flow(root).await;

    match decision.action {
        StartupAction::ShowSetup if decision.configuration_loaded => {
            bail!("cannot index: {}", decision.reason);
        }
        StartupAction::ShowSetup => {
            // First run: defaults are good enough to index with; they are
            // persisted below only once indexing succeeds.
            tracing::info!("no configuration yet, indexing with defaults");
        }
        StartupAction::ProceedToSearch if !force => {
            println!("index is up to date ({})", decision.reason);
            return Ok(());
        }
        _ => {}
    }

    let collection = config.collection_name().to_string();
    let result = run_indexing(root, store, &config, &collection).await?;

    for error in &result.errors {
        tracing::warn!(file = %error.path, "{}", error.message);
    }
    if !result.success {
        let cause = result
            .errors
            .first()
            .map_or_else(|| "unknown".to_string(), |e| e.message.clone());
        bail!("indexing failed: {cause}");
    }

    let hash = workspace_content_hash(root)?;
    config.mark_indexed(&collection, &hash);
    config.save(root)?;

    println!(
        "indexed {} of {} files, {} chunks, {} errors in {} ms",
        result.processed_files,
        result.total_files,
        result.chunks.len(),
        result.errors.len(),
        result.duration_ms,
    );
    Ok(())
}

async fn run_indexing(
    root: &Path,
    store: Arc<VectorStoreClient>,
    config: &Configuration,
    collection: &str,
) -> anyhow::Result<IndexingResult> {
    let embedder = Arc::new(
        HttpEmbedder::new(
            &config.embedding.endpoint,
            config.embedding.model.clone(),
            config.embedding.dimensions,
            std::env::var("QUARRY_EMBED_API_KEY").ok(),
            Duration::from_secs(30),
        )
        .context("embedding client")?,
    );

    let orchestrator = Arc::new(IndexingOrchestrator::new(
        Arc::new(FsChunkSource::default()),
        embedder,
        store,
        OrchestratorConfig {
            collection: collection.to_string(),
            max_workers: 0,
            skip_syntax_errors: config.parsing.skip_syntax_errors,
        },
    ));

    let canceller = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, finishing in-flight files");
            canceller.stop();
        }
    });

    let on_progress: ProgressCallback = Arc::new(|p| {
        tracing::info!(
            phase = p.phase.as_str(),
            processed = p.processed_files,
            total = p.total_files,
            file = p.current_file.as_deref().unwrap_or(""),
            "progress",
        );
    });

    let result = orchestrator.start_indexing(root, Some(on_progress)).await;
    orchestrator.cleanup();
    Ok(result)
}

async fn search(
    root: &Path,
    store: Arc<VectorStoreClient>,
    query: String,
    max_results: usize,
    content: bool,
    language: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (config, _) = Configuration::load(root);
    let embedder = Arc::new(
        HttpEmbedder::new(
            &config.embedding.endpoint,
            config.embedding.model.clone(),
            config.embedding.dimensions,
            std::env::var("QUARRY_EMBED_API_KEY").ok(),
            Duration::from_secs(30),
        )
        .context("embedding client")?,
    );

    let engine = ContextQueryEngine::new(embedder, store, config.collection_name().to_string());
    let response = engine
        .query(QueryRequest {
            query,
            max_results,
            include_content: content,
            language,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("no results for {:?}", response.query);
        return Ok(());
    }
    for hit in &response.results {
        println!(
            "{:.3}  {}:{}-{}  [{}]",
            hit.score, hit.file_path, hit.start_line, hit.end_line, hit.language,
        );
    }
    println!(
        "{} results in {} ms",
        response.total_results, response.processing_time_ms,
    );
    Ok(())
}

async fn reset(root: &Path, store: Arc<VectorStoreClient>) -> anyhow::Result<()> {
    let (mut config, _) = Configuration::load(root);
    let collection = config.collection_name().to_string();

    if store.collection_exists(&collection).await && !store.delete_collection(&collection).await {
        bail!("could not delete collection {collection:?}");
    }
    if config.vector_store.index_info.is_some() {
        config.clear_index_info();
        config.save(root)?;
    }
    println!("index reset; collection {collection:?} removed");
    Ok(())
}
