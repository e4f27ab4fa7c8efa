use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::{
    with_timeout, CatalogRepository, EmbeddingService, ParserService, SummaryService,
    VectorRepository, DEFAULT_FILE_TIMEOUT_MS,
};
use crate::connector::cache::SearchResultCache;
use crate::connector::detect::{detect_services, detect_workspaces, ServiceDetection, WorkspaceDetection};
use crate::connector::walker::FileWalker;
use crate::domain::{
    extract_symbols, AtlasError, ChangeSet, Chunker, CrossRepoDependency, DiscoveredFile,
    Embedding, IndexingOptions, MetadataContext, Repository, SourceFile, WalkStats,
};

use super::{ReindexController, ReindexDecision};

/// Outcome of one indexing run.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub repository: Repository,
    pub decision: ReindexDecision,
    pub walk_stats: WalkStats,
    pub changes: ChangeSet,
    pub files_indexed: u64,
    pub chunks_created: u64,
    pub symbols_created: u64,
    pub fallback_parses: u64,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

pub struct IndexRepositoryUseCase {
    catalog: Arc<dyn CatalogRepository>,
    vectors: Arc<dyn VectorRepository>,
    parser: Arc<dyn ParserService>,
    embedder: Arc<dyn EmbeddingService>,
    summarizer: Arc<dyn SummaryService>,
    reindex: ReindexController,
    result_cache: Option<Arc<SearchResultCache>>,
}

impl IndexRepositoryUseCase {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        vectors: Arc<dyn VectorRepository>,
        parser: Arc<dyn ParserService>,
        embedder: Arc<dyn EmbeddingService>,
        summarizer: Arc<dyn SummaryService>,
    ) -> Self {
        let reindex = ReindexController::new(catalog.clone(), vectors.clone());
        Self {
            catalog,
            vectors,
            parser,
            embedder,
            summarizer,
            reindex,
            result_cache: None,
        }
    }

    /// Attach the search-result cache so indexing invalidates stale
    /// entries for the repository.
    pub fn with_result_cache(mut self, cache: Arc<SearchResultCache>) -> Self {
        self.result_cache = Some(cache);
        self
    }

    pub async fn execute(
        &self,
        path: &str,
        options: IndexingOptions,
    ) -> Result<IndexReport, AtlasError> {
        let start_time = Instant::now();
        let absolute_path = Path::new(path).canonicalize().map_err(|e| {
            AtlasError::validation("repo_path", format!("invalid path '{}': {}", path, e))
        })?;
        let path_str = absolute_path.to_string_lossy().to_string();

        // Locate any prior index of this repository, by id first.
        let existing = match options.repo_id.as_deref() {
            Some(repo_id) => self.catalog.find_repository(repo_id).await?,
            None => self.catalog.find_repository_by_path(&path_str).await?,
        };

        let decision = ReindexController::decide(existing.as_ref(), &options);
        info!(
            "Indexing {} ({}, reason: {})",
            path_str,
            if decision.reindex { "full" } else { "incremental" },
            decision.reason
        );

        if decision.reindex {
            if let Some(ref existing) = existing {
                self.reindex.clear_repository(existing.id()).await?;
            }
        }

        let mut repository = match existing {
            Some(repo) => repo,
            None => {
                let name = absolute_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown")
                    .to_string();
                Repository::new(
                    options.repo_id.clone(),
                    name,
                    path_str.clone(),
                    options.repo_type,
                )
            }
        };
        self.catalog.save_repository(&repository).await?;
        let repo_id = repository.id().to_string();

        // Enumerate candidate files.
        let walker = FileWalker::new(&options);
        let (discovered, walk_stats) = walker.walk(&absolute_path)?;
        info!(
            "Found {} files to consider ({} excluded)",
            discovered.len(),
            walk_stats.total_excluded()
        );

        // Workspace and service discovery runs before file processing so
        // chunks can carry their owning ids.
        let workspaces = if options.enable_workspace_detection {
            self.refresh_workspaces(&repo_id, &absolute_path).await?
        } else {
            WorkspaceDetection::default()
        };
        let services = if options.enable_service_detection {
            self.refresh_services(&repo_id, &absolute_path).await?
        } else {
            ServiceDetection::default()
        };
        let workspace_packages = workspaces.package_names();

        // Incremental gate: hash diff against stored state.
        let stored_hashes = self.catalog.file_hashes(&repo_id).await?;
        let changes = detect_changes(&discovered, &stored_hashes);
        info!("Detected changes: {}", changes.summary());

        // Deleted files lose their chunks, then symbols, then file rows.
        for path in &changes.deleted {
            debug!("Removing deleted file: {}", path);
            self.vectors.delete_chunks_by_file(&repo_id, path).await?;
            self.vectors.delete_symbols_by_file(&repo_id, path).await?;
        }
        if !changes.deleted.is_empty() {
            self.catalog
                .delete_files(&repo_id, &changes.deleted)
                .await?;
        }
        // Modified files shed stale chunk/symbol rows before re-insert;
        // the file row (carrying the hash) is only replaced after the new
        // rows are committed.
        for path in &changes.modified {
            self.vectors.delete_chunks_by_file(&repo_id, path).await?;
            self.vectors.delete_symbols_by_file(&repo_id, path).await?;
        }

        let by_path: HashMap<&str, &DiscoveredFile> = discovered
            .iter()
            .map(|f| (f.relative_path.as_str(), f))
            .collect();
        let to_process: Vec<&DiscoveredFile> = changes
            .to_process()
            .iter()
            .filter_map(|p| by_path.get(*p).copied())
            .collect();

        let progress_bar = ProgressBar::new(to_process.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {bar:40.green/dim} {pos}/{len} {msg:.dim}")
                .expect("Invalid progress bar template")
                .progress_chars("━━─"),
        );

        let chunker = Chunker::new(options.chunk_size_min, options.chunk_size_max);
        let mut files_indexed = 0u64;
        let mut chunks_created = 0u64;
        let mut symbols_created = 0u64;
        let mut fallback_parses = 0u64;
        let mut warnings = Vec::new();

        for file in to_process {
            progress_bar.set_message(file.relative_path.clone());

            let outcome = with_timeout(
                DEFAULT_FILE_TIMEOUT_MS,
                self.index_file(&repo_id, file, &options, &chunker, &workspace_packages, &workspaces, &services),
            )
            .await;

            match outcome {
                Ok(file_result) => {
                    files_indexed += 1;
                    chunks_created += file_result.chunks;
                    symbols_created += file_result.symbols;
                    if file_result.used_fallback {
                        fallback_parses += 1;
                    }
                    warnings.extend(file_result.warnings);
                }
                Err(e) => {
                    warn!("Failed to index {}: {}", file.relative_path, e);
                    warnings.push(format!("{}: {}", file.relative_path, e));
                }
            }
            progress_bar.inc(1);
        }
        progress_bar.finish_and_clear();

        // Cross-repository edges from workspace dependencies that name
        // other indexed repositories.
        if options.enable_multi_repo {
            self.refresh_cross_repo_edges(&repo_id, &workspaces).await?;
        }

        let chunk_count = self.vectors.count_chunks(&repo_id).await?;
        let file_count = changes.unchanged.len() as u64 + files_indexed;
        self.catalog
            .update_repository_stats(&repo_id, file_count, chunk_count)
            .await?;

        repository.set_stats(file_count, chunk_count);
        repository.mark_indexed(options.version.as_deref(), None);
        self.catalog.save_repository(&repository).await?;

        if let Some(ref cache) = self.result_cache {
            cache.invalidate_repository(&repo_id);
        }

        let duration = start_time.elapsed();
        info!(
            "Indexing complete: {} files, {} chunks, {} symbols in {:.2}s",
            files_indexed,
            chunks_created,
            symbols_created,
            duration.as_secs_f64()
        );

        let repository = self
            .catalog
            .find_repository(&repo_id)
            .await?
            .ok_or_else(|| AtlasError::internal("Repository not found after indexing"))?;

        Ok(IndexReport {
            repository,
            decision,
            walk_stats,
            changes,
            files_indexed,
            chunks_created,
            symbols_created,
            fallback_parses,
            warnings,
            duration_ms: duration.as_millis() as u64,
        })
    }

    /// Parse, chunk, summarize, embed, and persist one file. The file row
    /// is written last so an interrupted run re-processes the file
    /// instead of treating a half-written one as unchanged.
    #[allow(clippy::too_many_arguments)]
    async fn index_file(
        &self,
        repo_id: &str,
        file: &DiscoveredFile,
        options: &IndexingOptions,
        chunker: &Chunker,
        workspace_packages: &[String],
        workspaces: &WorkspaceDetection,
        services: &ServiceDetection,
    ) -> Result<FileOutcome, AtlasError> {
        let parse = self
            .parser
            .parse(&file.content, &file.relative_path, file.language)
            .await?;

        let mut outcome = chunker.create_chunks(
            repo_id,
            &file.relative_path,
            file.language,
            &file.content,
            &parse,
        );

        let workspace = workspaces.workspace_for(&file.relative_path);
        let service = services.service_for(&file.relative_path);

        let ctx = MetadataContext {
            parse: &parse,
            workspace_packages,
            detect_api_endpoints: options.enable_api_endpoint_detection,
        };
        for chunk in &mut outcome.chunks {
            crate::domain::enrich_chunk_metadata(chunk, &ctx);
        }
        if workspace.is_some() || service.is_some() {
            outcome.chunks = outcome
                .chunks
                .into_iter()
                .map(|chunk| {
                    let chunk = match workspace {
                        Some(ws) => chunk
                            .with_workspace(ws.id(), Some(ws.package_name().to_string())),
                        None => chunk,
                    };
                    match service {
                        Some(svc) => chunk.with_service(svc.id()),
                        None => chunk,
                    }
                })
                .collect();
        }

        let summary = self
            .summarizer
            .summarize(&file.relative_path, file.language, &file.content)
            .await?;

        let embeddings = self
            .embedder
            .embed_chunks(&outcome.chunks, Some(&summary.text))
            .await?;
        let failed = embeddings.iter().filter(|e| e.is_failed()).count();
        if failed > 0 {
            warn!(
                "{}: {} of {} chunk embeddings failed",
                file.relative_path,
                failed,
                embeddings.len()
            );
        }
        self.vectors.save_chunks(&outcome.chunks, &embeddings).await?;

        let symbols = extract_symbols(repo_id, &file.relative_path, &parse);
        let mut symbol_embeddings: Vec<Embedding> = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            match self.embedder.embed_text(symbol.id(), symbol.definition()).await {
                Ok(embedding) => symbol_embeddings.push(embedding),
                Err(e) => {
                    debug!("Symbol embedding failed for {}: {}", symbol.name(), e);
                    symbol_embeddings.push(Embedding::failed(
                        symbol.id(),
                        self.embedder.config().model_name(),
                    ));
                }
            }
        }
        self.vectors.save_symbols(&symbols, &symbol_embeddings).await?;

        // File-level embedding for stage-A retrieval: path plus summary.
        let file_text = format!("{}\n{}", file.relative_path, summary.text);
        let file_vector = match self.embedder.embed_text(&file.relative_path, &file_text).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("File embedding failed for {}: {}", file.relative_path, e);
                None
            }
        };

        let mut source_file = SourceFile::new(
            repo_id,
            &file.relative_path,
            file.language,
            file.line_count,
            &file.file_hash,
        )
        .with_summary(&summary.text)
        .with_exports(parse.exports.iter().map(|e| e.name.clone()).collect())
        .with_imports(parse.imports.clone());
        if let Some(ws) = workspace {
            source_file =
                source_file.with_workspace(ws.id(), Some(ws.package_name().to_string()));
        }
        if let Some(svc) = service {
            source_file = source_file.with_service(svc.id());
        }
        // Hash-update-last: this write marks the file as fully indexed.
        self.catalog.upsert_file(&source_file, file_vector.as_ref()).await?;

        let chunk_count = outcome.chunks.len() as u64 - failed as u64;
        Ok(FileOutcome {
            chunks: chunk_count,
            symbols: symbols.len() as u64,
            used_fallback: parse.used_fallback,
            warnings: outcome.warnings,
        })
    }

    async fn refresh_workspaces(
        &self,
        repo_id: &str,
        root: &Path,
    ) -> Result<WorkspaceDetection, AtlasError> {
        let mut detection = match detect_workspaces(repo_id, root) {
            Ok(d) => d,
            Err(e) => {
                warn!("Workspace detection failed: {}", e);
                WorkspaceDetection::default()
            }
        };

        // Re-detection must not mint new ids for known packages, or
        // unchanged files would point at orphaned workspace rows.
        let existing = self.catalog.workspaces_by_repository(repo_id).await?;
        let stable_ids: HashMap<String, String> = existing
            .iter()
            .map(|w| (w.package_name().to_string(), w.id().to_string()))
            .collect();
        let mut remap: HashMap<String, String> = HashMap::new();
        detection.workspaces = std::mem::take(&mut detection.workspaces)
            .into_iter()
            .map(|workspace| match stable_ids.get(workspace.package_name()) {
                Some(stable) => {
                    remap.insert(workspace.id().to_string(), stable.clone());
                    workspace.with_id(stable.clone())
                }
                None => workspace,
            })
            .collect();
        for dep in &mut detection.dependencies {
            if let Some(stable) = remap.get(&dep.source_workspace_id) {
                dep.source_workspace_id = stable.clone();
            }
            if let Some(stable) = remap.get(&dep.target_workspace_id) {
                dep.target_workspace_id = stable.clone();
            }
        }

        self.catalog.delete_workspaces_by_repository(repo_id).await?;
        if !detection.workspaces.is_empty() {
            self.catalog.save_workspaces(&detection.workspaces).await?;
            self.catalog
                .save_workspace_dependencies(&detection.dependencies)
                .await?;
            self.catalog.save_workspace_aliases(&detection.aliases).await?;
        }
        Ok(detection)
    }

    async fn refresh_services(
        &self,
        repo_id: &str,
        root: &Path,
    ) -> Result<ServiceDetection, AtlasError> {
        let mut detection = match detect_services(repo_id, root) {
            Ok(d) => d,
            Err(e) => {
                warn!("Service detection failed: {}", e);
                ServiceDetection::default()
            }
        };

        let existing = self.catalog.services_by_repository(repo_id).await?;
        let stable_ids: HashMap<String, String> = existing
            .iter()
            .map(|s| (s.name().to_string(), s.id().to_string()))
            .collect();
        let mut remap: HashMap<String, String> = HashMap::new();
        detection.services = std::mem::take(&mut detection.services)
            .into_iter()
            .map(|service| match stable_ids.get(service.name()) {
                Some(stable) => {
                    remap.insert(service.id().to_string(), stable.clone());
                    service.with_id(stable.clone())
                }
                None => service,
            })
            .collect();
        for dep in &mut detection.dependencies {
            if let Some(stable) = remap.get(&dep.source_service_id) {
                dep.source_service_id = stable.clone();
            }
            if let Some(stable) = remap.get(&dep.target_service_id) {
                dep.target_service_id = stable.clone();
            }
        }

        self.catalog.delete_services_by_repository(repo_id).await?;
        if !detection.services.is_empty() {
            self.catalog.save_services(&detection.services).await?;
        }
        Ok(detection)
    }

    async fn refresh_cross_repo_edges(
        &self,
        repo_id: &str,
        workspaces: &WorkspaceDetection,
    ) -> Result<(), AtlasError> {
        let repositories = self.catalog.list_repositories().await?;
        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        for workspace in &workspaces.workspaces {
            for dep in workspace.dependencies() {
                for other in &repositories {
                    if other.id() != repo_id && other.name() == dep && seen.insert((other.id().to_string(), dep.clone())) {
                        edges.push(CrossRepoDependency {
                            source_repo_id: repo_id.to_string(),
                            target_repo_id: other.id().to_string(),
                            via: dep.clone(),
                        });
                    }
                }
            }
        }
        self.catalog.delete_cross_repo_dependencies(repo_id).await?;
        if !edges.is_empty() {
            self.catalog.save_cross_repo_dependencies(&edges).await?;
        }
        Ok(())
    }
}

struct FileOutcome {
    chunks: u64,
    symbols: u64,
    used_fallback: bool,
    warnings: Vec<String>,
}

/// Hash-diff classification: new when the path is absent from the store,
/// modified on hash mismatch, unchanged on match; stored paths missing
/// from disk are deleted.
pub fn detect_changes(discovered: &[DiscoveredFile], stored: &[(String, String)]) -> ChangeSet {
    let stored_map: HashMap<&str, &str> = stored
        .iter()
        .map(|(path, hash)| (path.as_str(), hash.as_str()))
        .collect();
    let discovered_paths: HashSet<&str> =
        discovered.iter().map(|f| f.relative_path.as_str()).collect();

    let mut changes = ChangeSet::default();
    for file in discovered {
        match stored_map.get(file.relative_path.as_str()) {
            None => changes.added.push(file.relative_path.clone()),
            Some(hash) if *hash != file.file_hash => {
                changes.modified.push(file.relative_path.clone())
            }
            Some(_) => changes.unchanged.push(file.relative_path.clone()),
        }
    }
    for (path, _) in stored {
        if !discovered_paths.contains(path.as_str()) {
            changes.deleted.push(path.clone());
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Language;
    use std::path::PathBuf;

    fn discovered(path: &str, hash: &str) -> DiscoveredFile {
        DiscoveredFile {
            absolute_path: PathBuf::from(format!("/repo/{}", path)),
            relative_path: path.to_string(),
            language: Language::TypeScript,
            line_count: 10,
            size_bytes: 100,
            mtime_secs: 0,
            file_hash: hash.to_string(),
            content: String::new(),
        }
    }

    #[test]
    fn test_detect_changes_classification() {
        let on_disk = vec![
            discovered("same.ts", "h1"),
            discovered("edited.ts", "h2-new"),
            discovered("fresh.ts", "h3"),
        ];
        let stored = vec![
            ("same.ts".to_string(), "h1".to_string()),
            ("edited.ts".to_string(), "h2-old".to_string()),
            ("removed.ts".to_string(), "h4".to_string()),
        ];

        let changes = detect_changes(&on_disk, &stored);
        assert_eq!(changes.added, vec!["fresh.ts"]);
        assert_eq!(changes.modified, vec!["edited.ts"]);
        assert_eq!(changes.unchanged, vec!["same.ts"]);
        assert_eq!(changes.deleted, vec!["removed.ts"]);
    }

    #[test]
    fn test_detect_changes_idempotent_run() {
        let on_disk = vec![discovered("a.ts", "h1"), discovered("b.ts", "h2")];
        let stored = vec![
            ("a.ts".to_string(), "h1".to_string()),
            ("b.ts".to_string(), "h2".to_string()),
        ];
        let changes = detect_changes(&on_disk, &stored);
        assert!(changes.is_noop());
        assert_eq!(changes.unchanged.len(), 2);
    }

    #[test]
    fn test_detect_changes_empty_store_is_all_added() {
        let on_disk = vec![discovered("a.ts", "h1")];
        let changes = detect_changes(&on_disk, &[]);
        assert_eq!(changes.added.len(), 1);
        assert!(changes.modified.is_empty());
        assert!(changes.deleted.is_empty());
    }
}
