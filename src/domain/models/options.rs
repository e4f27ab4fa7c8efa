use serde::{Deserialize, Serialize};

use super::chunk::{CHUNK_SIZE_MAX, CHUNK_SIZE_MIN};
use super::RepoType;

/// Options governing one indexing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingOptions {
    pub include_markdown: bool,
    /// Maximum file size in lines; larger files are skipped entirely.
    pub max_file_size: u32,
    pub chunk_size_min: u32,
    pub chunk_size_max: u32,
    pub enable_workspace_detection: bool,
    pub enable_service_detection: bool,
    pub enable_multi_repo: bool,
    pub enable_api_endpoint_detection: bool,
    /// Caller-supplied repository id; a UUID is generated when absent.
    pub repo_id: Option<String>,
    pub repo_type: RepoType,
    /// Version string recorded in repository metadata and compared by the
    /// re-index controller.
    pub version: Option<String>,
    pub compare_versions: bool,
    pub force_reindex: bool,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            include_markdown: false,
            max_file_size: 5000,
            chunk_size_min: CHUNK_SIZE_MIN,
            chunk_size_max: CHUNK_SIZE_MAX,
            enable_workspace_detection: true,
            enable_service_detection: true,
            enable_multi_repo: false,
            enable_api_endpoint_detection: true,
            repo_id: None,
            repo_type: RepoType::Monolithic,
            version: None,
            compare_versions: true,
            force_reindex: false,
        }
    }
}

/// Options governing one retrieval query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub max_files: usize,
    pub max_snippets: usize,
    pub include_imports: bool,
    pub import_depth: u32,
    pub dedup_threshold: f32,
    pub similarity_threshold: f32,
    pub repo_filter: Vec<String>,
    pub exclude_repos: Vec<String>,
    pub service_filter: Vec<String>,
    pub exclude_services: Vec<String>,
    pub workspace_filter: Vec<String>,
    pub exclude_workspaces: Vec<String>,
    pub cross_repo: bool,
    pub include_references: bool,
    pub include_documentation: bool,
    pub exclude_repo_types: Vec<RepoType>,
    pub respect_workspace_boundaries: bool,
    pub respect_service_boundaries: bool,
    /// Assembly budget; results are trimmed to fit when set.
    pub token_budget: Option<u32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_files: 15,
            max_snippets: 25,
            include_imports: true,
            import_depth: 2,
            dedup_threshold: 0.9,
            similarity_threshold: 0.5,
            repo_filter: Vec::new(),
            exclude_repos: Vec::new(),
            service_filter: Vec::new(),
            exclude_services: Vec::new(),
            workspace_filter: Vec::new(),
            exclude_workspaces: Vec::new(),
            cross_repo: false,
            include_references: false,
            include_documentation: false,
            exclude_repo_types: Vec::new(),
            respect_workspace_boundaries: false,
            respect_service_boundaries: false,
            token_budget: None,
        }
    }
}

impl SearchOptions {
    /// Chunk-stage candidate pool: 4x the snippet budget.
    pub fn chunk_candidates(&self) -> usize {
        self.max_snippets * 4
    }
}
