use serde::{Deserialize, Serialize};

use super::{ImportInfo, Language};

/// A file row as persisted in `code_files`. The `file_hash` is the sole
/// key for incremental change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    repo_id: String,
    file_path: String,
    language: Language,
    line_count: u32,
    file_hash: String,
    file_summary: Option<String>,
    exports: Vec<String>,
    imports: Vec<ImportInfo>,
    workspace_id: Option<String>,
    package_name: Option<String>,
    service_id: Option<String>,
}

impl SourceFile {
    pub fn new(
        repo_id: impl Into<String>,
        file_path: impl Into<String>,
        language: Language,
        line_count: u32,
        file_hash: impl Into<String>,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            file_path: file_path.into(),
            language,
            line_count,
            file_hash: file_hash.into(),
            file_summary: None,
            exports: Vec::new(),
            imports: Vec::new(),
            workspace_id: None,
            package_name: None,
            service_id: None,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        repo_id: String,
        file_path: String,
        language: Language,
        line_count: u32,
        file_hash: String,
        file_summary: Option<String>,
        exports: Vec<String>,
        imports: Vec<ImportInfo>,
        workspace_id: Option<String>,
        package_name: Option<String>,
        service_id: Option<String>,
    ) -> Self {
        Self {
            repo_id,
            file_path,
            language,
            line_count,
            file_hash,
            file_summary,
            exports,
            imports,
            workspace_id,
            package_name,
            service_id,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.file_summary = Some(summary.into());
        self
    }

    pub fn with_exports(mut self, exports: Vec<String>) -> Self {
        self.exports = exports;
        self
    }

    pub fn with_imports(mut self, imports: Vec<ImportInfo>) -> Self {
        self.imports = imports;
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

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    pub fn file_hash(&self) -> &str {
        &self.file_hash
    }

    pub fn file_summary(&self) -> Option<&str> {
        self.file_summary.as_deref()
    }

    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    pub fn imports(&self) -> &[ImportInfo] {
        &self.imports
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

    pub fn import_sources(&self) -> Vec<&str> {
        self.imports.iter().map(|i| i.source.as_str()).collect()
    }
}

/// SHA-256 of the UTF-8 bytes, lowercase hex.
pub fn compute_file_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(content.as_bytes());
    format!("{:x}", hash)
}
