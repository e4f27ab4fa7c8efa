use async_trait::async_trait;

use crate::domain::{
    AtlasError, CrossRepoDependency, Embedding, Repository, Service, SourceFile, Workspace,
    WorkspaceAlias, WorkspaceDependency,
};

/// Metadata persistence: repositories, files, workspaces, services, and
/// dependency edges. Vector search over chunks and symbols lives in
/// [`super::VectorRepository`].
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    // ── Repositories ────────────────────────────────────────────────

    /// Idempotent upsert keyed by repo_id.
    async fn save_repository(&self, repository: &Repository) -> Result<(), AtlasError>;

    async fn find_repository(&self, repo_id: &str) -> Result<Option<Repository>, AtlasError>;

    async fn find_repository_by_path(&self, root_path: &str)
        -> Result<Option<Repository>, AtlasError>;

    async fn list_repositories(&self) -> Result<Vec<Repository>, AtlasError>;

    async fn delete_repository(&self, repo_id: &str) -> Result<(), AtlasError>;

    async fn update_repository_stats(
        &self,
        repo_id: &str,
        file_count: u64,
        chunk_count: u64,
    ) -> Result<(), AtlasError>;

    // ── Files ───────────────────────────────────────────────────────

    /// Replace the (repo, path) row. `file_vector` is the file-level
    /// embedding used by stage-A retrieval.
    async fn upsert_file(
        &self,
        file: &SourceFile,
        file_vector: Option<&Embedding>,
    ) -> Result<(), AtlasError>;

    /// (path, hash) pairs for incremental change detection.
    async fn file_hashes(&self, repo_id: &str) -> Result<Vec<(String, String)>, AtlasError>;

    async fn find_file(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Option<SourceFile>, AtlasError>;

    async fn delete_files(&self, repo_id: &str, paths: &[String]) -> Result<u64, AtlasError>;

    async fn delete_files_by_repository(&self, repo_id: &str) -> Result<u64, AtlasError>;

    // ── Workspaces ──────────────────────────────────────────────────

    async fn save_workspaces(&self, workspaces: &[Workspace]) -> Result<(), AtlasError>;

    async fn save_workspace_dependencies(
        &self,
        dependencies: &[WorkspaceDependency],
    ) -> Result<(), AtlasError>;

    async fn save_workspace_aliases(&self, aliases: &[WorkspaceAlias]) -> Result<(), AtlasError>;

    async fn workspaces_by_repository(&self, repo_id: &str) -> Result<Vec<Workspace>, AtlasError>;

    async fn workspace_aliases(&self, repo_id: &str) -> Result<Vec<WorkspaceAlias>, AtlasError>;

    async fn delete_workspaces_by_repository(&self, repo_id: &str) -> Result<(), AtlasError>;

    // ── Services ────────────────────────────────────────────────────

    async fn save_services(&self, services: &[Service]) -> Result<(), AtlasError>;

    async fn services_by_repository(&self, repo_id: &str) -> Result<Vec<Service>, AtlasError>;

    async fn services_by_ids(&self, service_ids: &[String]) -> Result<Vec<Service>, AtlasError>;

    async fn delete_services_by_repository(&self, repo_id: &str) -> Result<(), AtlasError>;

    // ── Cross-repo edges ────────────────────────────────────────────

    async fn save_cross_repo_dependencies(
        &self,
        dependencies: &[CrossRepoDependency],
    ) -> Result<(), AtlasError>;

    async fn delete_cross_repo_dependencies(&self, repo_id: &str) -> Result<(), AtlasError>;
}
