use serde::{Deserialize, Serialize};

use super::service::{ApiEndpoint, CrossServiceCall};
use super::{ChunkMetadata, ChunkType, Symbol};

/// How a search is scoped before any filter is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    #[default]
    Global,
    Repository,
    Service,
}

/// The resolved set of ids bounding a query's search space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchScope {
    pub mode: ScopeMode,
    pub repo_ids: Vec<String>,
    pub service_ids: Vec<String>,
    pub workspace_ids: Vec<String>,
}

impl SearchScope {
    pub fn is_empty(&self) -> bool {
        self.repo_ids.is_empty()
    }

    pub fn includes_repo(&self, repo_id: &str) -> bool {
        self.repo_ids.iter().any(|r| r == repo_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    CodeSnippet,
    NaturalLanguage,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::CodeSnippet => "code_snippet",
            QueryKind::NaturalLanguage => "natural_language",
        }
    }
}

/// The embedded query echoed back in results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEmbedding {
    pub text: String,
    pub kind: QueryKind,
    pub dimension: usize,
    pub generation_time_ms: u64,
    #[serde(skip)]
    pub vector: Vec<f32>,
}

/// File-stage retrieval hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedFile {
    pub repo_id: String,
    pub file_path: String,
    pub similarity: f32,
    pub file_summary: Option<String>,
    pub language: String,
}

/// Chunk-stage retrieval hit carried through dedup and assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeLocation {
    pub chunk_id: String,
    pub repo_id: String,
    pub file_path: String,
    pub chunk_type: ChunkType,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub token_count: u32,
    pub similarity: f32,
    pub metadata: ChunkMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    /// Chunk ids merged into this one by near-duplicate suppression.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_duplicates: Vec<String>,
}

impl CodeLocation {
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

/// A chunk-stage hit with its stored vector, used by near-duplicate
/// suppression before assembly.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub location: CodeLocation,
    pub vector: Vec<f32>,
}

/// One expanded import chain rooted at a retrieved file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportChain {
    pub root_file: String,
    /// Visited files in BFS order, excluding the root.
    pub files: Vec<ImportChainEntry>,
    pub depth_reached: u32,
    /// Import cycles encountered, each reported as the path that closed it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportChainEntry {
    pub file_path: String,
    pub depth: u32,
    pub imported_from: String,
}

/// API enrichment attached to the result bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiContext {
    pub endpoints: Vec<EndpointHit>,
    pub cross_service_calls: Vec<CrossServiceCall>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointHit {
    pub chunk_id: String,
    pub file_path: String,
    pub service_id: Option<String>,
    pub endpoint: ApiEndpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    PartialResults,
    PostFilter,
    EmptyStage,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl SearchWarning {
    pub fn partial(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::PartialResults,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Info,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub files_retrieved: usize,
    pub chunks_retrieved: usize,
    pub chunks_after_dedup: usize,
    pub symbols_resolved: usize,
    pub import_depth_reached: u32,
    pub total_tokens: u32,
    pub query_time_ms: u64,
}

/// The assembled bundle of code evidence returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub query_kind: QueryKind,
    pub query_dimension: usize,
    pub relevant_files: Vec<RankedFile>,
    pub code_locations: Vec<CodeLocation>,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportChain>,
    pub api_context: ApiContext,
    pub metadata: SearchMetadata,
    pub warnings: Vec<SearchWarning>,
}

impl SearchResult {
    /// An empty result for the file-stage short-circuit.
    pub fn empty(query: impl Into<String>, kind: QueryKind, dimension: usize) -> Self {
        Self {
            query: query.into(),
            query_kind: kind,
            query_dimension: dimension,
            relevant_files: Vec::new(),
            code_locations: Vec::new(),
            symbols: Vec::new(),
            imports: Vec::new(),
            api_context: ApiContext::default(),
            metadata: SearchMetadata::default(),
            warnings: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.relevant_files.is_empty() && self.code_locations.is_empty()
    }
}
