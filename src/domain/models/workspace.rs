use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monorepo package discovered from the workspace manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    id: String,
    repo_id: String,
    package_name: String,
    path: String,
    version: Option<String>,
    /// Direct dependency names from the package manifest.
    dependencies: Vec<String>,
}

impl Workspace {
    pub fn new(
        repo_id: impl Into<String>,
        package_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            repo_id: repo_id.into(),
            package_name: package_name.into(),
            path: path.into(),
            version: None,
            dependencies: Vec::new(),
        }
    }

    pub fn reconstitute(
        id: String,
        repo_id: String,
        package_name: String,
        path: String,
        version: Option<String>,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            id,
            repo_id,
            package_name,
            path,
            version,
            dependencies,
        }
    }

    /// Keep a previously persisted id so file and chunk references stay
    /// valid across re-detection.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// True when `file_path` (repo-relative) falls under this package.
    pub fn contains(&self, file_path: &str) -> bool {
        let prefix = self.path.trim_end_matches('/');
        file_path == prefix || file_path.starts_with(&format!("{}/", prefix))
    }
}

/// Directed workspace → workspace dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceDependency {
    pub repo_id: String,
    pub source_workspace_id: String,
    pub target_workspace_id: String,
}

/// How an import specifier was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasKind {
    /// A workspace package name (`@acme/core`).
    WorkspacePackage,
    /// A configured path alias (`@/utils`, `~/lib`).
    PathAlias,
    /// A relative specifier (`./`, `../`).
    Relative,
}

/// One resolved import alias, recorded so the import expander can map
/// specifiers back to files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceAlias {
    pub repo_id: String,
    pub pattern: String,
    pub target: String,
    pub kind: AliasKind,
    /// Whether the resolution lands inside the repository.
    pub is_internal: bool,
}

impl WorkspaceAlias {
    pub fn new(
        repo_id: impl Into<String>,
        pattern: impl Into<String>,
        target: impl Into<String>,
        kind: AliasKind,
        is_internal: bool,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            pattern: pattern.into(),
            target: target.into(),
            kind,
            is_internal,
        }
    }

    /// Resolve a specifier against this alias. Wildcard patterns replace
    /// the first `*` in the target with the matched suffix.
    pub fn resolve(&self, specifier: &str) -> Option<String> {
        if let Some(star) = self.pattern.find('*') {
            let (prefix, suffix) = self.pattern.split_at(star);
            let suffix = &suffix[1..];
            if specifier.starts_with(prefix) && specifier.ends_with(suffix) {
                let matched = &specifier[prefix.len()..specifier.len() - suffix.len()];
                return Some(self.target.replacen('*', matched, 1));
            }
            None
        } else if specifier == self.pattern {
            Some(self.target.clone())
        } else {
            None
        }
    }
}
