//! CodeSearch CLI - incremental code indexer and hybrid retriever.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::Commands;
use codesearch_core::{
    CancellationToken, DeleteProjectUseCase, DuckdbVectorStore, EmbeddingProvider, EngineConfig,
    FileSnapshotStore, HybridRetriever, HybridRetrieverConfig, IncrementalIndexer, IndexerConfig,
    ListProjectsUseCase, MockEmbedding, SearchCodeUseCase, SearchQuery, SnapshotKey, SnapshotStore,
    TreeSitterParser, VectorStore,
};
use codesearch_core::{Bm25Index, BudgetParams, ChunkWithEmbedding, EmbeddingCache, EmbeddingCacheConfig};

const CONFIG_FILE_NAME: &str = "codesearch.toml";

#[derive(Parser)]
#[command(name = "codesearch-core")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Index { path, name, force } => run_index(&path, name, force).await,
        Commands::Search {
            path,
            query,
            num,
            min_score,
            language,
            budget,
        } => run_search(&path, &query, num, min_score, language, budget).await,
        Commands::List => run_list().await,
        Commands::Delete { user_id, branch } => run_delete(&user_id, &branch).await,
        Commands::Stats => run_stats().await,
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn vector_store_path(cache_dir: &std::path::Path) -> PathBuf {
    cache_dir.join("vectors.duckdb")
}

/// DuckDB schema name isolating one (user, branch) snapshot's vectors from
/// others sharing the same `vectors.duckdb` file.
fn vector_namespace(key: &SnapshotKey) -> String {
    let raw = format!("ns_{}_{}", key.user_id, key.branch);
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

async fn run_index(path: &str, name: Option<String>, force: bool) -> Result<()> {
    let root = PathBuf::from(path)
        .canonicalize()
        .with_context(|| format!("project path does not exist: {path}"))?;
    let project_name = name.unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    });

    let config = EngineConfig::load(&root, &root.join(CONFIG_FILE_NAME))?;
    let snapshot_store = FileSnapshotStore::new(&root);
    let git = codesearch_core::read_git_info(&root);
    let key = SnapshotKey::new(config.user_id.clone(), git.branch.clone());

    let mut index = if force {
        None
    } else {
        snapshot_store.load_index(&key).await.unwrap_or(None)
    }
    .unwrap_or_else(|| {
        codesearch_core::ProjectIndex::new(project_name.clone(), root.to_string_lossy().to_string(), git.clone(), now())
    });

    if IncrementalIndexer::branch_changed(&index, &git) {
        info!("branch changed from {} to {}, starting fresh index", index.git.branch, git.branch);
        index = codesearch_core::ProjectIndex::new(project_name.clone(), root.to_string_lossy().to_string(), git.clone(), now());
    }

    let parser = Arc::new(TreeSitterParser::new());
    let indexer_config = IndexerConfig {
        max_file_size: config.max_file_size,
        extra_ignore_patterns: config.ignore_patterns.clone(),
        ..IndexerConfig::default()
    };
    let indexer = IncrementalIndexer::new(root.as_path(), parser, indexer_config);

    info!("indexing {}", root.display());
    indexer.full_refresh(&mut index, &CancellationToken::new()).await?;

    snapshot_store.save_index(&key, &index).await?;

    let embedding_provider: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbedding::new());
    let vector_store = DuckdbVectorStore::new_with_namespace(
        &vector_store_path(snapshot_store.cache_dir()),
        &vector_namespace(&key),
    )?;
    let chunks = IncrementalIndexer::all_chunks(&index);

    let mut embedding_cache = snapshot_store
        .load_embedding_cache()
        .await
        .unwrap_or(None)
        .unwrap_or_else(|| {
            EmbeddingCache::new(EmbeddingCacheConfig {
                max_size_mb: config.embeddings.cache_max_size_mb,
                max_age_days: config.embeddings.cache_max_age_days,
            })
        });
    embedding_cache.purge_stale(now());

    let provider_name = &config.embeddings.provider;
    let model_name = embedding_provider.config().model_name();
    let mut embedded = Vec::with_capacity(chunks.len());
    for chunk in chunks.values() {
        let cached = embedding_cache.get(provider_name, model_name, chunk.content(), now());
        let embedding = match cached {
            Some(vector) => codesearch_core::Embedding::new(chunk.id().to_string(), vector, model_name.to_string()),
            None => match embedding_provider.embed_chunk(chunk).await {
                Ok(embedding) => {
                    embedding_cache.put(provider_name, model_name, chunk.content(), embedding.vector().to_vec(), now());
                    embedding
                }
                Err(e) => {
                    warn!("failed to embed chunk {}: {}", chunk.id(), e);
                    continue;
                }
            },
        };
        embedded.push(ChunkWithEmbedding {
            chunk: chunk.clone(),
            embedding,
        });
    }
    vector_store.add(&embedded).await?;
    snapshot_store.save_embedding_cache(&embedding_cache).await?;

    let state = codesearch_core::EngineState::from_index(
        &index,
        env!("CARGO_PKG_VERSION"),
        vector_store.count().await.unwrap_or(0),
        Some(build_bm25(&chunks, &config).vocab_size()),
    );
    snapshot_store.save_state(&key, &state).await?;

    println!(
        "Indexed {} ({} files, {} chunks, branch {})",
        index.name, index.stats.file_count, index.stats.chunk_count, index.git.branch
    );
    Ok(())
}

fn budget_params(config: &EngineConfig) -> BudgetParams {
    BudgetParams {
        max_tokens: config.budget.max_tokens,
        system_reserve: config.budget.system_reserve,
        response_reserve: config.budget.response_reserve,
        min_score: config.budget.min_score,
        diversity_weight: config.budget.diversity_weight,
    }
}

fn build_bm25(chunks: &std::collections::HashMap<String, codesearch_core::Chunk>, config: &EngineConfig) -> Bm25Index {
    let mut bm25 = Bm25Index::new(config.bm25.k1, config.bm25.b, config.bm25.min_df, config.bm25.max_df_ratio);
    for chunk in chunks.values() {
        bm25.add(chunk.id(), chunk.content());
    }
    bm25
}

async fn run_search(
    path: &str,
    query: &str,
    num: usize,
    min_score: Option<f32>,
    language: Option<Vec<String>>,
    budget: Option<u32>,
) -> Result<()> {
    let root = PathBuf::from(path)
        .canonicalize()
        .with_context(|| format!("project path does not exist: {path}"))?;
    let config = EngineConfig::load(&root, &root.join(CONFIG_FILE_NAME))?;
    let snapshot_store = FileSnapshotStore::new(&root);
    let git = codesearch_core::read_git_info(&root);
    let key = SnapshotKey::new(config.user_id.clone(), git.branch.clone());

    let index = snapshot_store
        .load_index(&key)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no index found for {}; run `index` first", root.display()))?;

    let chunks = IncrementalIndexer::all_chunks(&index);
    let bm25 = build_bm25(&chunks, &config);

    let embedding_provider: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbedding::new());
    let vector_store: Arc<dyn VectorStore> = Arc::new(DuckdbVectorStore::new_with_namespace(
        &vector_store_path(snapshot_store.cache_dir()),
        &vector_namespace(&key),
    )?);

    let retriever =
        HybridRetriever::new(HybridRetrieverConfig::default()).with_dense(vector_store, embedding_provider);
    let search_use_case = SearchCodeUseCase::new(retriever, budget_params(&config));

    let mut search_query = SearchQuery::new(query).with_limit(num);
    if let Some(score) = min_score {
        search_query = search_query.with_min_score(score);
    }
    if let Some(langs) = language {
        search_query = search_query.with_languages(langs);
    }

    let results = search_use_case.execute(&index, &bm25, &search_query).await?;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    if let Some(max_tokens) = budget {
        let mut params = budget_params(&config);
        params.max_tokens = max_tokens;
        let use_case = SearchCodeUseCase::new(
            HybridRetriever::new(HybridRetrieverConfig::default()),
            params,
        );
        let selection = use_case.apply_budget(&results)?;
        println!(
            "Selected {} of {} results within {} tokens ({} used):\n",
            selection.selected.len(),
            results.len(),
            max_tokens,
            selection.total_tokens
        );
        for candidate in &selection.selected {
            println!("  {} (score: {:.3}, tokens: {})", candidate.file, candidate.score, candidate.token_count);
        }
        return Ok(());
    }

    println!("Found {} results:\n", results.len());
    for (i, result) in results.iter().enumerate() {
        let chunk = result.chunk();
        println!(
            "{}. {}:{}-{} (score: {:.3})",
            i + 1,
            chunk.file(),
            chunk.start_line(),
            chunk.end_line(),
            result.score()
        );
        if let Some(name) = chunk.primary_symbol() {
            println!("   Symbol: {}", name);
        }
        let preview: String = chunk
            .content()
            .lines()
            .take(3)
            .map(|l| format!("   | {}", l))
            .collect::<Vec<_>>()
            .join("\n");
        println!("{}", preview);
        println!();
    }
    Ok(())
}

async fn run_list() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let snapshot_store = FileSnapshotStore::new(&cwd);
    let use_case = ListProjectsUseCase::new(Arc::new(snapshot_store));
    let projects = use_case.execute().await?;

    if projects.is_empty() {
        println!("No projects indexed.");
        return Ok(());
    }

    println!("Indexed projects:\n");
    for project in projects {
        println!("  {} ({}@{})", project.name, project.key.user_id, project.key.branch);
        println!("    Root:  {}", project.root);
        println!("    Files: {}, Chunks: {}", project.file_count, project.chunk_count);
        println!();
    }
    Ok(())
}

async fn run_delete(user_id: &str, branch: &str) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let snapshot_store = Arc::new(FileSnapshotStore::new(&cwd));
    let key = SnapshotKey::new(user_id, branch);

    let mut use_case = DeleteProjectUseCase::new(snapshot_store.clone());
    let vectors_path = vector_store_path(snapshot_store.cache_dir());
    if vectors_path.exists() {
        let vector_store = DuckdbVectorStore::new_with_namespace(&vectors_path, &vector_namespace(&key))?;
        use_case = use_case.with_vector_store(Arc::new(vector_store));
    }
    use_case.execute(&key).await?;

    println!("Deleted project {}@{}", user_id, branch);
    Ok(())
}

async fn run_stats() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let snapshot_store = FileSnapshotStore::new(&cwd);
    let use_case = ListProjectsUseCase::new(Arc::new(snapshot_store));
    let projects = use_case.execute().await?;

    let total_projects = projects.len();
    let total_files: u64 = projects.iter().map(|p| p.file_count).sum();
    let total_chunks: u64 = projects.iter().map(|p| p.chunk_count).sum();

    println!("CodeSearch Statistics");
    println!("=====================");
    println!("Projects:     {}", total_projects);
    println!("Total Files:  {}", total_files);
    println!("Total Chunks: {}", total_chunks);
    Ok(())
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
