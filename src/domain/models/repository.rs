use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Classification of an indexed repository.
///
/// `Reference` and `Documentation` repositories are excluded from search
/// scopes unless explicitly included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepoType {
    #[default]
    Monolithic,
    Monorepo,
    Microservice,
    Library,
    Reference,
    Documentation,
}

impl RepoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::Monolithic => "monolithic",
            RepoType::Monorepo => "monorepo",
            RepoType::Microservice => "microservice",
            RepoType::Library => "library",
            RepoType::Reference => "reference",
            RepoType::Documentation => "documentation",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "monolithic" => RepoType::Monolithic,
            "monorepo" => RepoType::Monorepo,
            "microservice" => RepoType::Microservice,
            "library" => RepoType::Library,
            "reference" => RepoType::Reference,
            "documentation" => RepoType::Documentation,
            unknown => {
                warn!("Unknown repo type '{}', defaulting to monolithic", unknown);
                RepoType::Monolithic
            }
        }
    }

    pub fn is_searchable_by_default(&self) -> bool {
        !matches!(self, RepoType::Reference | RepoType::Documentation)
    }
}

impl std::fmt::Display for RepoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    id: String,
    name: String,
    repo_type: RepoType,
    root_path: String,
    /// Opaque metadata bag: version, upstream_url, last_indexed, commit_sha.
    metadata: Value,
    file_count: u64,
    chunk_count: u64,
    created_at: i64,
    updated_at: i64,
}

impl Repository {
    pub fn new(id: Option<String>, name: String, root_path: String, repo_type: RepoType) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name,
            repo_type,
            root_path,
            metadata: Value::Object(Default::default()),
            file_count: 0,
            chunk_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        name: String,
        repo_type: RepoType,
        root_path: String,
        metadata: Value,
        file_count: u64,
        chunk_count: u64,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            id,
            name,
            repo_type,
            root_path,
            metadata,
            file_count,
            chunk_count,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repo_type(&self) -> RepoType {
        self.repo_type
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata.get("version").and_then(Value::as_str)
    }

    pub fn last_indexed(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get("last_indexed")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_metadata_field(&mut self, key: &str, value: Value) {
        if let Value::Object(map) = &mut self.metadata {
            map.insert(key.to_string(), value);
        }
    }

    pub fn mark_indexed(&mut self, version: Option<&str>, commit_sha: Option<&str>) {
        let now = Utc::now();
        self.set_metadata_field("last_indexed", Value::String(now.to_rfc3339()));
        if let Some(v) = version {
            self.set_metadata_field("version", Value::String(v.to_string()));
        }
        if let Some(sha) = commit_sha {
            self.set_metadata_field("commit_sha", Value::String(sha.to_string()));
        }
        self.updated_at = now.timestamp();
    }

    pub fn set_stats(&mut self, file_count: u64, chunk_count: u64) {
        self.file_count = file_count;
        self.chunk_count = chunk_count;
        self.updated_at = Utc::now().timestamp();
    }

    /// A repository is outdated when its last index run is older than
    /// `max_age_days`. Never-indexed repositories are always outdated.
    pub fn is_outdated(&self, max_age_days: i64) -> bool {
        match self.last_indexed() {
            Some(ts) => (Utc::now() - ts).num_days() >= max_age_days,
            None => true,
        }
    }
}
