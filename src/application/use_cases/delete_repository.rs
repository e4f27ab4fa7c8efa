use std::sync::Arc;

use tracing::info;

use crate::application::{CatalogRepository, VectorRepository};
use crate::connector::cache::SearchResultCache;
use crate::domain::AtlasError;

use super::ReindexController;

/// Removes a repository and everything it owns.
pub struct DeleteRepositoryUseCase {
    catalog: Arc<dyn CatalogRepository>,
    reindex: ReindexController,
    result_cache: Option<Arc<SearchResultCache>>,
}

impl DeleteRepositoryUseCase {
    pub fn new(catalog: Arc<dyn CatalogRepository>, vectors: Arc<dyn VectorRepository>) -> Self {
        let reindex = ReindexController::new(catalog.clone(), vectors);
        Self {
            catalog,
            reindex,
            result_cache: None,
        }
    }

    pub fn with_result_cache(mut self, cache: Arc<SearchResultCache>) -> Self {
        self.result_cache = Some(cache);
        self
    }

    /// Delete by repository id, falling back to root-path lookup.
    pub async fn execute(&self, id_or_path: &str) -> Result<(), AtlasError> {
        let repository = match self.catalog.find_repository(id_or_path).await? {
            Some(repo) => repo,
            None => self
                .catalog
                .find_repository_by_path(id_or_path)
                .await?
                .ok_or_else(|| {
                    AtlasError::not_found(format!("repository '{}'", id_or_path))
                })?,
        };

        let repo_id = repository.id().to_string();
        self.reindex.delete_repository(&repo_id).await?;
        if let Some(ref cache) = self.result_cache {
            cache.invalidate_repository(&repo_id);
        }
        info!("Deleted repository {} ({})", repository.name(), repo_id);
        Ok(())
    }
}
