use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::service::ApiEndpoint;

/// Minimum line span for a `block` chunk.
pub const CHUNK_SIZE_MIN: u32 = 50;
/// Line span above which a function chunk is kept whole with a warning.
pub const CHUNK_SIZE_MAX: u32 = 500;
/// Line count above which a file gets structure-only chunking.
pub const VERY_LARGE_FILE_LINES: u32 = 5000;
/// Line count above which the large-file flag is set.
pub const LARGE_FILE_LINES: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    FileSummary,
    ImportBlock,
    Function,
    Class,
    Block,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::FileSummary => "file_summary",
            ChunkType::ImportBlock => "import_block",
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Block => "block",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "file_summary" => ChunkType::FileSummary,
            "import_block" => ChunkType::ImportBlock,
            "function" => ChunkType::Function,
            "class" => ChunkType::Class,
            _ => ChunkType::Block,
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured per-chunk metadata persisted as JSON alongside the chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub method_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imported_symbols: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exported_symbols: Vec<String>,
    /// Deduped, non-empty module paths this chunk's file depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<u32>,
    #[serde(default)]
    pub complexity: u32,
    #[serde(default)]
    pub has_async: bool,
    #[serde(default)]
    pub has_loops: bool,
    #[serde(default)]
    pub has_conditionals: bool,
    /// Tri-state: None when the file has no imports at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_internal_import: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_endpoints: Vec<ApiEndpoint>,
    #[serde(default)]
    pub large_file: bool,
}

impl ChunkMetadata {
    /// Union of function and class names, used for the enhanced-text
    /// symbol list.
    pub fn symbol_names(&self) -> Vec<&str> {
        self.function_names
            .iter()
            .chain(self.class_names.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Estimate of the token cost of a string: ceil(chars / 4).
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    id: String,
    file_path: String,
    repo_id: String,
    chunk_type: ChunkType,
    start_line: u32,
    end_line: u32,
    content: String,
    token_count: u32,
    metadata: ChunkMetadata,
    created_at: i64,
    workspace_id: Option<String>,
    package_name: Option<String>,
    service_id: Option<String>,
}

impl CodeChunk {
    pub fn new(
        file_path: impl Into<String>,
        repo_id: impl Into<String>,
        chunk_type: ChunkType,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let token_count = estimate_tokens(&content);
        Self {
            id: Uuid::new_v4().to_string(),
            file_path: file_path.into(),
            repo_id: repo_id.into(),
            chunk_type,
            start_line,
            end_line,
            content,
            token_count,
            metadata: ChunkMetadata::default(),
            created_at: Utc::now().timestamp(),
            workspace_id: None,
            package_name: None,
            service_id: None,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        file_path: String,
        repo_id: String,
        chunk_type: ChunkType,
        start_line: u32,
        end_line: u32,
        content: String,
        token_count: u32,
        metadata: ChunkMetadata,
        created_at: i64,
        workspace_id: Option<String>,
        package_name: Option<String>,
        service_id: Option<String>,
    ) -> Self {
        Self {
            id,
            file_path,
            repo_id,
            chunk_type,
            start_line,
            end_line,
            content,
            token_count,
            metadata,
            created_at,
            workspace_id,
            package_name,
            service_id,
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>, package_name: Option<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self.package_name = package_name;
        self
    }

    pub fn with_service(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn token_count(&self) -> u32 {
        self.token_count
    }

    pub fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ChunkMetadata {
        &mut self.metadata
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace_id.as_deref()
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }

    pub fn is_summary(&self) -> bool {
        matches!(self.chunk_type, ChunkType::FileSummary)
    }

    /// Line-interval overlap against another chunk of the same file.
    /// The file-summary chunk overlaps everything by design.
    pub fn overlaps(&self, other: &CodeChunk) -> bool {
        self.start_line <= other.end_line && other.start_line <= self.end_line
    }
}
