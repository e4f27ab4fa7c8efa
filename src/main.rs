//! CodeAtlas CLI - semantic codebase indexing and retrieval.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use codeatlas::{
    spawn_memory_tracker, DeleteRepositoryUseCase, DuckdbStorage, EmbeddingConfig,
    EmbeddingService, HostEmbeddingService, IndexRepositoryUseCase, IndexingOptions,
    LlmSummaryService, ListRepositoriesUseCase, MockEmbeddingService, OllamaClient,
    PerformanceMonitor, QueryEmbeddingCache, RepoType, RuleBasedSummaryService, SearchCodeUseCase,
    SearchOptions, SearchResultCache, SummaryService, TreeSitterParser, VectorRepository,
    DEFAULT_MAX_AGE_DAYS,
};

/// CodeAtlas - semantic codebase indexing and retrieval
#[derive(Parser)]
#[command(name = "codeatlas")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the data directory
    #[arg(short, long, global = true, default_value = "~/.codeatlas")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a code repository
    Index {
        /// Path to the repository to index
        path: String,

        /// Repository id (defaults to a generated UUID)
        #[arg(long)]
        repo_id: Option<String>,

        /// Repository type (monolithic, monorepo, microservice, library,
        /// reference, documentation)
        #[arg(long, default_value = "monolithic")]
        repo_type: String,

        /// Version string recorded in repository metadata
        #[arg(long)]
        repo_version: Option<String>,

        /// Force full re-index, ignoring stored file hashes
        #[arg(short, long)]
        force: bool,

        /// Index markdown files beyond the root README
        #[arg(long)]
        include_markdown: bool,
    },

    /// Search indexed code
    Search {
        /// The search query
        query: String,

        /// Maximum files retrieved in the first stage
        #[arg(long, default_value = "15")]
        max_files: usize,

        /// Maximum code snippets returned
        #[arg(long, default_value = "25")]
        max_snippets: usize,

        /// Minimum file-stage similarity (0.0 to 1.0)
        #[arg(short, long, default_value = "0.5")]
        similarity_threshold: f32,

        /// Restrict to repository ids
        #[arg(short, long)]
        repository: Option<Vec<String>>,

        /// Skip import-chain expansion
        #[arg(long)]
        no_imports: bool,

        /// Import expansion depth (1 to 3)
        #[arg(long, default_value = "2")]
        import_depth: u32,
    },

    /// List indexed repositories
    List,

    /// Delete an indexed repository
    Delete {
        /// Repository id or root path to delete
        id_or_path: String,
    },

    /// Show statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let data_dir = expand_tilde(&cli.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let memory_tracker = spawn_memory_tracker();
    let monitor = PerformanceMonitor::new();

    let dimension: usize = std::env::var("CODEATLAS_EMBEDDING_DIM")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(768);

    let db_path = PathBuf::from(&data_dir).join("codeatlas.db");
    let storage = DuckdbStorage::open(&db_path, dimension)?;
    storage.health_check().await?;
    storage.verify_database("codeatlas").await?;

    let catalog = Arc::new(storage.catalog());
    let vectors: Arc<dyn VectorRepository> = Arc::new(storage.vectors());
    let parser = Arc::new(TreeSitterParser::new());

    let use_mock = std::env::var("CODEATLAS_MOCK_EMBEDDINGS").is_ok();
    let mut host_client = OllamaClient::from_env();
    if let Some(num_ctx) = std::env::var("CODEATLAS_NUM_CTX")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        host_client = host_client.with_num_ctx(num_ctx);
    }
    let host = Arc::new(host_client);
    let embedder: Arc<dyn EmbeddingService> = if use_mock {
        Arc::new(MockEmbeddingService::with_dimension(dimension))
    } else {
        let config = EmbeddingConfig::new(host.embed_model().to_string(), dimension);
        Arc::new(HostEmbeddingService::new(host.clone(), config))
    };
    let summarizer: Arc<dyn SummaryService> =
        if std::env::var("CODEATLAS_SUMMARY_MODE").as_deref() == Ok("llm") {
            Arc::new(LlmSummaryService::new(host.clone()))
        } else {
            Arc::new(RuleBasedSummaryService::new())
        };

    let query_cache = Arc::new(QueryEmbeddingCache::new());
    let result_cache = Arc::new(SearchResultCache::new());

    match cli.command {
        Commands::Index {
            path,
            repo_id,
            repo_type,
            repo_version,
            force,
            include_markdown,
        } => {
            if !use_mock {
                host.verify_models().await?;
            }
            let started = std::time::Instant::now();
            let use_case = IndexRepositoryUseCase::new(
                catalog.clone(),
                vectors.clone(),
                parser,
                embedder,
                summarizer,
            )
            .with_result_cache(result_cache.clone());

            let options = IndexingOptions {
                repo_id,
                repo_type: RepoType::parse(&repo_type),
                version: repo_version,
                force_reindex: force,
                include_markdown,
                ..Default::default()
            };

            let report = use_case.execute(&path, options).await?;
            println!("Repository Indexing Complete");
            println!(
                "  {} ({}): {} files indexed, {} chunks, {} symbols",
                report.repository.name(),
                report.repository.id(),
                report.files_indexed,
                report.chunks_created,
                report.symbols_created
            );
            println!("  Changes: {}", report.changes.summary());
            if report.fallback_parses > 0 {
                println!("  {} files parsed via regex fallback", report.fallback_parses);
            }
            for warning in report.warnings.iter().take(10) {
                println!("  warning: {}", warning);
            }
            monitor.record("index", started.elapsed().as_millis() as u64);
        }

        Commands::Search {
            query,
            max_files,
            max_snippets,
            similarity_threshold,
            repository,
            no_imports,
            import_depth,
        } => {
            let use_case = SearchCodeUseCase::new(
                catalog.clone(),
                vectors.clone(),
                embedder,
                query_cache,
                result_cache,
            );

            let options = SearchOptions {
                max_files,
                max_snippets,
                similarity_threshold,
                include_imports: !no_imports,
                import_depth,
                repo_filter: repository.unwrap_or_default(),
                ..Default::default()
            };

            let result = use_case.execute(&query, &options).await?;

            if result.code_locations.is_empty() && result.relevant_files.is_empty() {
                println!("No results found.");
            } else {
                println!(
                    "Found {} chunks across {} files ({} ms):\n",
                    result.code_locations.len(),
                    result.relevant_files.len(),
                    result.metadata.query_time_ms
                );
                for (i, location) in result.code_locations.iter().enumerate() {
                    println!(
                        "{}. {} (score: {:.3})",
                        i + 1,
                        location.location(),
                        location.similarity
                    );
                    let preview: String = location
                        .content
                        .lines()
                        .take(3)
                        .map(|l| format!("   | {}", l))
                        .collect::<Vec<_>>()
                        .join("\n");
                    println!("{}\n", preview);
                }
                for warning in &result.warnings {
                    println!("warning: {}", warning.message);
                }
            }
        }

        Commands::List => {
            let use_case = ListRepositoriesUseCase::new(catalog.clone());
            let repos = use_case.execute().await?;

            if repos.is_empty() {
                println!("No repositories indexed.");
            } else {
                println!("Indexed repositories:\n");
                for repo in repos {
                    let staleness = if repo.is_outdated(DEFAULT_MAX_AGE_DAYS) {
                        " [outdated]"
                    } else {
                        ""
                    };
                    println!("  {} ({}){}", repo.name(), repo.id(), staleness);
                    println!("    Type:  {}", repo.repo_type());
                    println!("    Path:  {}", repo.root_path());
                    println!(
                        "    Files: {}, Chunks: {}",
                        repo.file_count(),
                        repo.chunk_count()
                    );
                    println!();
                }
            }
        }

        Commands::Delete { id_or_path } => {
            let use_case = DeleteRepositoryUseCase::new(catalog.clone(), vectors.clone())
                .with_result_cache(result_cache);
            use_case.execute(&id_or_path).await?;
            println!("Repository deleted successfully.");
        }

        Commands::Stats => {
            let list_use_case = ListRepositoriesUseCase::new(catalog.clone());
            let repos = list_use_case.execute().await?;

            let total_repos = repos.len();
            let total_files: u64 = repos.iter().map(|r| r.file_count()).sum();
            let total_chunks: u64 = repos.iter().map(|r| r.chunk_count()).sum();

            // Symbol counts fan out concurrently across repositories.
            let counts = futures_util::future::join_all(
                repos.iter().map(|r| vectors.count_symbols(r.id())),
            )
            .await;
            let total_symbols: u64 = counts.into_iter().filter_map(|c| c.ok()).sum();

            info!("Collected statistics for {} repositories", total_repos);
            println!("CodeAtlas Statistics");
            println!("====================");
            println!("Repositories:  {}", total_repos);
            println!("Total Files:   {}", total_files);
            println!("Total Chunks:  {}", total_chunks);
            println!("Total Symbols: {}", total_symbols);
            println!("Data Dir:      {}", data_dir);
        }
    }

    if cli.verbose {
        for timing in monitor.timings() {
            info!("{} took {} ms", timing.stage, timing.duration_ms);
        }
    }
    memory_tracker.abort();

    Ok(())
}

/// Expand ~ to home directory.
fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
