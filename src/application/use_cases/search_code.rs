use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::{
    validate_search_options, CatalogRepository, EmbeddingService, VectorRepository,
};
use crate::connector::cache::{QueryEmbeddingCache, SearchResultCache};
use crate::domain::{
    classify_query, deduplicate_chunks, AtlasError, QueryEmbedding, ScopeMode, SearchOptions,
    SearchResult, SearchScope, SearchWarning, WarningKind,
};

use super::{
    assemble, post_filter_repositories, ApiEnricher, ExpansionOptions, ImportExpander,
    SymbolResolver,
};

/// Fixed chunk-stage similarity floor.
const CHUNK_SIMILARITY_FLOOR: f32 = 0.75;

/// The staged retrieval pipeline: scope → query embedding → file search →
/// chunk search → symbol resolution → import expansion → API enrichment →
/// deduplication → assembly.
pub struct SearchCodeUseCase {
    catalog: Arc<dyn CatalogRepository>,
    vectors: Arc<dyn VectorRepository>,
    embedder: Arc<dyn EmbeddingService>,
    symbol_resolver: SymbolResolver,
    import_expander: ImportExpander,
    api_enricher: ApiEnricher,
    query_cache: Arc<QueryEmbeddingCache>,
    result_cache: Arc<SearchResultCache>,
}

impl SearchCodeUseCase {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        vectors: Arc<dyn VectorRepository>,
        embedder: Arc<dyn EmbeddingService>,
        query_cache: Arc<QueryEmbeddingCache>,
        result_cache: Arc<SearchResultCache>,
    ) -> Self {
        Self {
            symbol_resolver: SymbolResolver::new(vectors.clone()),
            import_expander: ImportExpander::new(catalog.clone()),
            api_enricher: ApiEnricher::new(catalog.clone()),
            catalog,
            vectors,
            embedder,
            query_cache,
            result_cache,
        }
    }

    pub async fn execute(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResult, AtlasError> {
        validate_search_options(query, options)?;
        let start_time = Instant::now();
        info!("Searching for: {}", query);

        // Stage 1: scope resolution.
        let scope = self.resolve_scope(options).await?;
        if scope.is_empty() {
            debug!("Scope resolved to no repositories");
            let kind = classify_query(query);
            let mut result = SearchResult::empty(query, kind, self.embedder.config().dimension());
            result
                .warnings
                .push(SearchWarning::info("No repositories in scope"));
            return Ok(result);
        }

        let cache_key =
            SearchResultCache::key(query, &scope.repo_ids, &options_fingerprint(options));
        if let Some(mut cached) = self.result_cache.get(&cache_key) {
            debug!("Search result cache hit");
            cached.metadata.query_time_ms = start_time.elapsed().as_millis() as u64;
            return Ok(cached);
        }

        // Stage 2: query classification and embedding, cached.
        let query_embedding = self.embed_query(query).await?;

        // Stage 3: file-level vector search.
        let files = self
            .vectors
            .search_files(
                &query_embedding.vector,
                &scope,
                options.max_files,
                options.similarity_threshold,
            )
            .await?;
        if files.is_empty() {
            debug!("File stage returned nothing; short-circuiting");
            let mut result = SearchResult::empty(
                query,
                query_embedding.kind,
                query_embedding.dimension,
            );
            result.metadata.query_time_ms = start_time.elapsed().as_millis() as u64;
            result.warnings.push(SearchWarning {
                kind: WarningKind::EmptyStage,
                message: "No files matched the query".to_string(),
            });
            return Ok(result);
        }

        // Stage 4: chunk-level vector search within those files.
        let file_paths: Vec<String> = files.iter().map(|f| f.file_path.clone()).collect();
        let hits = self
            .vectors
            .search_chunks(
                &query_embedding.vector,
                &scope,
                &file_paths,
                options.chunk_candidates(),
                CHUNK_SIMILARITY_FLOOR,
            )
            .await?;
        let chunks_retrieved = hits.len();

        if hits.is_empty() {
            // Files-only return.
            let result = assemble(
                &query_embedding,
                files,
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Default::default(),
                0,
                0,
                start_time.elapsed().as_millis() as u64,
                options.token_budget,
                vec![SearchWarning {
                    kind: WarningKind::EmptyStage,
                    message: "No chunks above similarity floor".to_string(),
                }],
            );
            return Ok(result);
        }

        // Stage 5: near-duplicate suppression, then snippet budget.
        let mut locations = deduplicate_chunks(hits, options.dedup_threshold);
        locations.truncate(options.max_snippets);

        // Stage 6: symbol resolution.
        let symbols = self.symbol_resolver.resolve(&locations, &scope).await?;

        // Stage 7: bounded import expansion.
        let (imports, depth_reached) = if options.include_imports {
            let expansion = ExpansionOptions {
                max_depth: options.import_depth,
                respect_workspace_boundaries: options.respect_workspace_boundaries,
                respect_service_boundaries: options.respect_service_boundaries,
                include_workspace_only: single_id(&scope.workspace_ids),
                include_service_only: single_id(&scope.service_ids),
            };
            self.import_expander.expand(&files, &expansion).await?
        } else {
            (Vec::new(), 0)
        };

        // Stage 8: API enrichment.
        let api_context = match self.api_enricher.enrich(&locations, &scope).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!("API enrichment failed: {}", e);
                Default::default()
            }
        };

        // Stage 9: assembly under the token budget.
        let result = assemble(
            &query_embedding,
            files,
            locations,
            symbols,
            imports,
            api_context,
            chunks_retrieved,
            depth_reached,
            start_time.elapsed().as_millis() as u64,
            options.token_budget,
            Vec::new(),
        );

        self.result_cache
            .put(cache_key, scope.repo_ids.clone(), result.clone());

        info!(
            "Search complete: {} files, {} chunks, {} symbols in {} ms",
            result.metadata.files_retrieved,
            result.metadata.chunks_after_dedup,
            result.metadata.symbols_resolved,
            result.metadata.query_time_ms
        );
        Ok(result)
    }

    /// Filtered variant: run the pipeline, then intersect the assembled
    /// result with an explicit repository set.
    pub async fn execute_filtered(
        &self,
        query: &str,
        options: &SearchOptions,
        repo_ids: &[String],
    ) -> Result<SearchResult, AtlasError> {
        let mut result = self.execute(query, options).await?;
        let keep: HashSet<String> = repo_ids.iter().cloned().collect();
        post_filter_repositories(&mut result, &keep);
        Ok(result)
    }

    /// Classify and embed the query, consulting the in-process cache. A
    /// hit reports its (sub-50-ms) lookup time as the generation time.
    async fn embed_query(&self, query: &str) -> Result<QueryEmbedding, AtlasError> {
        let kind = classify_query(query);
        let started = Instant::now();

        if let Some(cached) = self.query_cache.get(query, kind) {
            return Ok(QueryEmbedding {
                text: query.to_string(),
                kind,
                dimension: cached.vector.len(),
                generation_time_ms: started.elapsed().as_millis() as u64,
                vector: cached.vector,
            });
        }

        let vector = self.embedder.embed_query(query).await?;
        let expected = self.embedder.config().dimension();
        if vector.len() != expected {
            return Err(AtlasError::dimension(expected, vector.len()));
        }
        self.query_cache.put(query, kind, vector.clone());

        Ok(QueryEmbedding {
            text: query.to_string(),
            kind,
            dimension: vector.len(),
            generation_time_ms: started.elapsed().as_millis() as u64,
            vector,
        })
    }

    /// Resolve the scope per the filter rules: include sets, exclude
    /// sets, repo-type pruning, and the implicit reference/documentation
    /// drop.
    async fn resolve_scope(&self, options: &SearchOptions) -> Result<SearchScope, AtlasError> {
        let repositories = self.catalog.list_repositories().await?;

        let mode = if !options.service_filter.is_empty() {
            ScopeMode::Service
        } else if !options.repo_filter.is_empty() {
            ScopeMode::Repository
        } else {
            ScopeMode::Global
        };

        let mut repo_ids: Vec<String> = repositories
            .iter()
            .filter(|repo| {
                if !options.repo_filter.is_empty()
                    && !options.repo_filter.iter().any(|f| f == repo.id())
                {
                    return false;
                }
                if options.exclude_repos.iter().any(|f| f == repo.id()) {
                    return false;
                }
                if options.exclude_repo_types.contains(&repo.repo_type()) {
                    return false;
                }
                match repo.repo_type() {
                    t if t.is_searchable_by_default() => true,
                    crate::domain::RepoType::Reference => options.include_references,
                    _ => options.include_documentation,
                }
            })
            .map(|repo| repo.id().to_string())
            .collect();

        let mut service_ids: Vec<String> = Vec::new();
        if mode == ScopeMode::Service {
            let services = self
                .catalog
                .services_by_ids(&options.service_filter)
                .await?;
            let service_repos: HashSet<String> =
                services.iter().map(|s| s.repo_id().to_string()).collect();
            service_ids = services
                .iter()
                .filter(|s| !options.exclude_services.iter().any(|e| e == s.id()))
                .map(|s| s.id().to_string())
                .collect();
            // Service scope narrows the repository set to the services'
            // owners unless cross-repo expansion was requested.
            if !options.cross_repo {
                repo_ids.retain(|id| service_repos.contains(id));
            }
        }

        let workspace_ids: Vec<String> = options
            .workspace_filter
            .iter()
            .filter(|w| !options.exclude_workspaces.contains(w))
            .cloned()
            .collect();

        Ok(SearchScope {
            mode,
            repo_ids,
            service_ids,
            workspace_ids,
        })
    }
}

fn single_id(ids: &[String]) -> Option<String> {
    match ids {
        [only] => Some(only.clone()),
        _ => None,
    }
}

/// Stable digest of the options fields that change retrieval output.
fn options_fingerprint(options: &SearchOptions) -> String {
    format!(
        "f{}s{}i{}d{}t{:.3}x{:.3}w{}v{}b{:?}",
        options.max_files,
        options.max_snippets,
        options.import_depth,
        options.include_imports as u8,
        options.similarity_threshold,
        options.dedup_threshold,
        options.respect_workspace_boundaries as u8,
        options.respect_service_boundaries as u8,
        options.token_budget,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_id() {
        assert_eq!(single_id(&["a".to_string()]), Some("a".to_string()));
        assert_eq!(single_id(&[]), None);
        assert_eq!(single_id(&["a".to_string(), "b".to_string()]), None);
    }

    #[test]
    fn test_options_fingerprint_changes_with_options() {
        let base = SearchOptions::default();
        let mut other = SearchOptions::default();
        other.max_files = 5;
        assert_ne!(options_fingerprint(&base), options_fingerprint(&other));
        assert_eq!(options_fingerprint(&base), options_fingerprint(&SearchOptions::default()));
    }
}
