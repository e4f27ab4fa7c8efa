use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::application::{CatalogRepository, VectorRepository};
use crate::domain::{AtlasError, IndexingOptions, Repository};

/// Default staleness horizon for `is_outdated` checks.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct ReindexDecision {
    pub reindex: bool,
    pub reason: String,
    pub version_changed: bool,
    pub force: bool,
}

/// Decides between full re-index and incremental update, and clears
/// repository-owned rows in dependency-safe order.
pub struct ReindexController {
    catalog: Arc<dyn CatalogRepository>,
    vectors: Arc<dyn VectorRepository>,
}

impl ReindexController {
    pub fn new(catalog: Arc<dyn CatalogRepository>, vectors: Arc<dyn VectorRepository>) -> Self {
        Self { catalog, vectors }
    }

    pub fn decide(existing: Option<&Repository>, options: &IndexingOptions) -> ReindexDecision {
        if options.force_reindex {
            return ReindexDecision {
                reindex: true,
                reason: "forced".to_string(),
                version_changed: false,
                force: true,
            };
        }

        let Some(existing) = existing else {
            return ReindexDecision {
                reindex: true,
                reason: "not previously indexed".to_string(),
                version_changed: false,
                force: false,
            };
        };

        if let Some(requested) = options.version.as_deref() {
            if options.compare_versions {
                match existing.version() {
                    Some(stored) if stored != requested => {
                        return ReindexDecision {
                            reindex: true,
                            reason: format!("version changed: {} -> {}", stored, requested),
                            version_changed: true,
                            force: false,
                        };
                    }
                    Some(_) => {
                        return ReindexDecision {
                            reindex: false,
                            reason: "version unchanged".to_string(),
                            version_changed: false,
                            force: false,
                        };
                    }
                    None => {}
                }
            }
        }

        ReindexDecision {
            reindex: false,
            reason: "incremental".to_string(),
            version_changed: false,
            force: false,
        }
    }

    /// Remove everything the repository owns, preserving the repository
    /// row itself. Order matters for referential integrity: chunks and
    /// symbols first, then files, then workspace and service rows.
    pub async fn clear_repository(&self, repo_id: &str) -> Result<(), AtlasError> {
        info!("Clearing indexed data for repository {}", repo_id);
        self.vectors.delete_by_repository(repo_id).await?;
        self.catalog.delete_files_by_repository(repo_id).await?;
        self.catalog.delete_workspaces_by_repository(repo_id).await?;
        self.catalog.delete_services_by_repository(repo_id).await?;
        self.catalog.delete_cross_repo_dependencies(repo_id).await?;
        Ok(())
    }

    /// Full deletion: cleared rows plus the repository row.
    pub async fn delete_repository(&self, repo_id: &str) -> Result<(), AtlasError> {
        self.clear_repository(repo_id).await?;
        self.catalog.delete_repository(repo_id).await?;
        Ok(())
    }
}
