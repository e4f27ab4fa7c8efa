use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::CatalogRepository;
use crate::domain::{
    AtlasError, CrossRepoDependency, Embedding, ImportInfo, Language, RepoType, Repository,
    Service, SourceFile, Workspace, WorkspaceAlias, WorkspaceDependency,
};

use super::{check_query, quoted_in_list, vector_literal};

/// Metadata persistence over the shared DuckDB connection.
pub struct DuckdbCatalogRepository {
    conn: Arc<Mutex<Connection>>,
    dimension: usize,
}

impl DuckdbCatalogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>, dimension: usize) -> Self {
        Self { conn, dimension }
    }

    fn row_to_repository(row: &Row) -> Result<Repository, duckdb::Error> {
        let metadata: String = row.get(4)?;
        Ok(Repository::reconstitute(
            row.get(0)?,
            row.get(1)?,
            RepoType::parse(&row.get::<_, String>(2)?),
            row.get(3)?,
            serde_json::from_str(&metadata).unwrap_or_default(),
            u64::try_from(row.get::<_, i64>(5)?).unwrap_or(0),
            u64::try_from(row.get::<_, i64>(6)?).unwrap_or(0),
            row.get(7)?,
            row.get(8)?,
        ))
    }

    fn row_to_file(row: &Row) -> Result<SourceFile, duckdb::Error> {
        let exports: String = row.get(6)?;
        let imports: String = row.get(7)?;
        Ok(SourceFile::reconstitute(
            row.get(0)?,
            row.get(1)?,
            Language::parse(&row.get::<_, String>(2)?),
            u32::try_from(row.get::<_, i64>(3)?).unwrap_or(0),
            row.get(4)?,
            row.get(5)?,
            serde_json::from_str::<Vec<String>>(&exports).unwrap_or_default(),
            serde_json::from_str::<Vec<ImportInfo>>(&imports).unwrap_or_default(),
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
        ))
    }

    const FILE_COLUMNS: &'static str = "repo_id, file_path, language, line_count, file_hash, \
        file_summary, exports, imports, workspace_id, package_name, service_id";

    const REPO_COLUMNS: &'static str =
        "id, name, repo_type, root_path, metadata, file_count, chunk_count, created_at, updated_at";
}

#[async_trait]
impl CatalogRepository for DuckdbCatalogRepository {
    async fn save_repository(&self, repository: &Repository) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO repositories \
             (id, name, repo_type, root_path, metadata, file_count, chunk_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                repository.id(),
                repository.name(),
                repository.repo_type().as_str(),
                repository.root_path(),
                repository.metadata().to_string(),
                repository.file_count() as i64,
                repository.chunk_count() as i64,
                repository.created_at(),
                repository.updated_at(),
            ],
        )
        .map_err(|e| AtlasError::storage(format!("Failed to save repository: {}", e)))?;
        Ok(())
    }

    async fn find_repository(&self, repo_id: &str) -> Result<Option<Repository>, AtlasError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories WHERE id = ?",
            Self::REPO_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AtlasError::storage(format!("Failed to prepare lookup: {}", e)))?;
        let mut rows = stmt
            .query(params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Repository lookup failed: {}", e)))?;
        match rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            Some(row) => Ok(Some(Self::row_to_repository(row).map_err(|e| {
                AtlasError::storage(format!("Repository row mapping failed: {}", e))
            })?)),
            None => Ok(None),
        }
    }

    async fn find_repository_by_path(
        &self,
        root_path: &str,
    ) -> Result<Option<Repository>, AtlasError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories WHERE root_path = ?",
            Self::REPO_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AtlasError::storage(format!("Failed to prepare lookup: {}", e)))?;
        let mut rows = stmt
            .query(params![root_path])
            .map_err(|e| AtlasError::storage(format!("Repository lookup failed: {}", e)))?;
        match rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            Some(row) => Ok(Some(Self::row_to_repository(row).map_err(|e| {
                AtlasError::storage(format!("Repository row mapping failed: {}", e))
            })?)),
            None => Ok(None),
        }
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, AtlasError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories ORDER BY name",
            Self::REPO_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AtlasError::storage(format!("Failed to prepare listing: {}", e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| AtlasError::storage(format!("Repository listing failed: {}", e)))?;
        let mut repositories = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            repositories.push(Self::row_to_repository(row).map_err(|e| {
                AtlasError::storage(format!("Repository row mapping failed: {}", e))
            })?);
        }
        Ok(repositories)
    }

    async fn delete_repository(&self, repo_id: &str) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM repositories WHERE id = ?", params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Failed to delete repository: {}", e)))?;
        Ok(())
    }

    async fn update_repository_stats(
        &self,
        repo_id: &str,
        file_count: u64,
        chunk_count: u64,
    ) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE repositories SET file_count = ?, chunk_count = ? WHERE id = ?",
            params![file_count as i64, chunk_count as i64, repo_id],
        )
        .map_err(|e| AtlasError::storage(format!("Failed to update stats: {}", e)))?;
        Ok(())
    }

    async fn upsert_file(
        &self,
        file: &SourceFile,
        file_vector: Option<&Embedding>,
    ) -> Result<(), AtlasError> {
        let embedding_literal = match file_vector {
            Some(embedding) if !embedding.is_failed() => {
                Some(vector_literal(embedding.vector(), self.dimension)?)
            }
            _ => None,
        };

        let exports = serde_json::to_string(file.exports())
            .map_err(|e| AtlasError::internal(format!("exports serialization: {}", e)))?;
        let imports = serde_json::to_string(file.imports())
            .map_err(|e| AtlasError::internal(format!("imports serialization: {}", e)))?;

        let sql = format!(
            "INSERT OR REPLACE INTO code_files \
             ({}, embedding) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, {})",
            Self::FILE_COLUMNS,
            embedding_literal.as_deref().unwrap_or("NULL"),
        );
        check_query(&sql)?;

        let conn = self.conn.lock().await;
        conn.execute(
            &sql,
            params![
                file.repo_id(),
                file.file_path(),
                file.language().as_str(),
                file.line_count() as i64,
                file.file_hash(),
                file.file_summary(),
                exports,
                imports,
                file.workspace_id(),
                file.package_name(),
                file.service_id(),
            ],
        )
        .map_err(|e| AtlasError::storage(format!("Failed to upsert file: {}", e)))?;
        Ok(())
    }

    async fn file_hashes(&self, repo_id: &str) -> Result<Vec<(String, String)>, AtlasError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT file_path, file_hash FROM code_files WHERE repo_id = ?")
            .map_err(|e| AtlasError::storage(format!("Failed to prepare hash query: {}", e)))?;
        let mut rows = stmt
            .query(params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Hash query failed: {}", e)))?;
        let mut hashes = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            hashes.push((
                row.get(0)
                    .map_err(|e| AtlasError::storage(format!("Hash column: {}", e)))?,
                row.get(1)
                    .map_err(|e| AtlasError::storage(format!("Hash column: {}", e)))?,
            ));
        }
        Ok(hashes)
    }

    async fn find_file(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Option<SourceFile>, AtlasError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM code_files WHERE repo_id = ? AND file_path = ?",
            Self::FILE_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AtlasError::storage(format!("Failed to prepare file lookup: {}", e)))?;
        let mut rows = stmt
            .query(params![repo_id, file_path])
            .map_err(|e| AtlasError::storage(format!("File lookup failed: {}", e)))?;
        match rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            Some(row) => Ok(Some(Self::row_to_file(row).map_err(|e| {
                AtlasError::storage(format!("File row mapping failed: {}", e))
            })?)),
            None => Ok(None),
        }
    }

    async fn delete_files(&self, repo_id: &str, paths: &[String]) -> Result<u64, AtlasError> {
        if paths.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM code_files WHERE repo_id = ? AND file_path IN ({})",
            quoted_in_list(paths)
        );
        check_query(&sql)?;
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute(&sql, params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Failed to delete files: {}", e)))?;
        debug!("Deleted {} file rows", deleted);
        Ok(deleted as u64)
    }

    async fn delete_files_by_repository(&self, repo_id: &str) -> Result<u64, AtlasError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute("DELETE FROM code_files WHERE repo_id = ?", params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Failed to delete files: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn save_workspaces(&self, workspaces: &[Workspace]) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        for workspace in workspaces {
            let dependencies = serde_json::to_string(workspace.dependencies())
                .map_err(|e| AtlasError::internal(format!("deps serialization: {}", e)))?;
            conn.execute(
                "INSERT OR REPLACE INTO workspaces \
                 (id, repo_id, package_name, path, version, dependencies) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    workspace.id(),
                    workspace.repo_id(),
                    workspace.package_name(),
                    workspace.path(),
                    workspace.version(),
                    dependencies,
                ],
            )
            .map_err(|e| AtlasError::storage(format!("Failed to save workspace: {}", e)))?;
        }
        Ok(())
    }

    async fn save_workspace_dependencies(
        &self,
        dependencies: &[WorkspaceDependency],
    ) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        for dep in dependencies {
            conn.execute(
                "INSERT OR IGNORE INTO workspace_dependencies \
                 (repo_id, source_workspace_id, target_workspace_id) VALUES (?, ?, ?)",
                params![dep.repo_id, dep.source_workspace_id, dep.target_workspace_id],
            )
            .map_err(|e| AtlasError::storage(format!("Failed to save workspace dep: {}", e)))?;
        }
        Ok(())
    }

    async fn save_workspace_aliases(&self, aliases: &[WorkspaceAlias]) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        for alias in aliases {
            conn.execute(
                "INSERT OR IGNORE INTO workspace_aliases \
                 (repo_id, pattern, target, kind, is_internal) VALUES (?, ?, ?, ?, ?)",
                params![
                    alias.repo_id,
                    alias.pattern,
                    alias.target,
                    serde_json::to_string(&alias.kind)
                        .unwrap_or_default()
                        .trim_matches('"'),
                    alias.is_internal,
                ],
            )
            .map_err(|e| AtlasError::storage(format!("Failed to save alias: {}", e)))?;
        }
        Ok(())
    }

    async fn workspaces_by_repository(&self, repo_id: &str) -> Result<Vec<Workspace>, AtlasError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, repo_id, package_name, path, version, dependencies \
                 FROM workspaces WHERE repo_id = ? ORDER BY package_name",
            )
            .map_err(|e| AtlasError::storage(format!("Failed to prepare workspaces: {}", e)))?;
        let mut rows = stmt
            .query(params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Workspace query failed: {}", e)))?;
        let mut workspaces = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            let dependencies: String = row
                .get(5)
                .map_err(|e| AtlasError::storage(format!("Workspace column: {}", e)))?;
            workspaces.push(Workspace::reconstitute(
                row.get(0)
                    .map_err(|e| AtlasError::storage(format!("Workspace column: {}", e)))?,
                row.get(1)
                    .map_err(|e| AtlasError::storage(format!("Workspace column: {}", e)))?,
                row.get(2)
                    .map_err(|e| AtlasError::storage(format!("Workspace column: {}", e)))?,
                row.get(3)
                    .map_err(|e| AtlasError::storage(format!("Workspace column: {}", e)))?,
                row.get(4)
                    .map_err(|e| AtlasError::storage(format!("Workspace column: {}", e)))?,
                serde_json::from_str(&dependencies).unwrap_or_default(),
            ));
        }
        Ok(workspaces)
    }

    async fn workspace_aliases(&self, repo_id: &str) -> Result<Vec<WorkspaceAlias>, AtlasError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT repo_id, pattern, target, kind, is_internal \
                 FROM workspace_aliases WHERE repo_id = ?",
            )
            .map_err(|e| AtlasError::storage(format!("Failed to prepare aliases: {}", e)))?;
        let mut rows = stmt
            .query(params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Alias query failed: {}", e)))?;
        let mut aliases = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            let kind: String = row
                .get(3)
                .map_err(|e| AtlasError::storage(format!("Alias column: {}", e)))?;
            aliases.push(WorkspaceAlias {
                repo_id: row
                    .get(0)
                    .map_err(|e| AtlasError::storage(format!("Alias column: {}", e)))?,
                pattern: row
                    .get(1)
                    .map_err(|e| AtlasError::storage(format!("Alias column: {}", e)))?,
                target: row
                    .get(2)
                    .map_err(|e| AtlasError::storage(format!("Alias column: {}", e)))?,
                kind: serde_json::from_str(&format!("\"{}\"", kind))
                    .unwrap_or(crate::domain::AliasKind::PathAlias),
                is_internal: row
                    .get(4)
                    .map_err(|e| AtlasError::storage(format!("Alias column: {}", e)))?,
            });
        }
        Ok(aliases)
    }

    async fn delete_workspaces_by_repository(&self, repo_id: &str) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        // Dependency-safe order: edges, aliases, then the workspaces.
        conn.execute(
            "DELETE FROM workspace_dependencies WHERE repo_id = ?",
            params![repo_id],
        )
        .map_err(|e| AtlasError::storage(format!("Failed to delete workspace deps: {}", e)))?;
        conn.execute(
            "DELETE FROM workspace_aliases WHERE repo_id = ?",
            params![repo_id],
        )
        .map_err(|e| AtlasError::storage(format!("Failed to delete aliases: {}", e)))?;
        conn.execute("DELETE FROM workspaces WHERE repo_id = ?", params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Failed to delete workspaces: {}", e)))?;
        Ok(())
    }

    async fn save_services(&self, services: &[Service]) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        for service in services {
            let ports = serde_json::to_string(service.ports())
                .map_err(|e| AtlasError::internal(format!("ports serialization: {}", e)))?;
            let contracts = serde_json::to_string(service.contracts())
                .map_err(|e| AtlasError::internal(format!("contracts serialization: {}", e)))?;
            let dependencies = serde_json::to_string(service.dependencies())
                .map_err(|e| AtlasError::internal(format!("deps serialization: {}", e)))?;
            conn.execute(
                "INSERT OR REPLACE INTO services \
                 (id, repo_id, name, service_type, path, ports, contracts, dependencies) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    service.id(),
                    service.repo_id(),
                    service.name(),
                    service.service_type().as_str(),
                    service.path(),
                    ports,
                    contracts,
                    dependencies,
                ],
            )
            .map_err(|e| AtlasError::storage(format!("Failed to save service: {}", e)))?;
        }
        Ok(())
    }

    async fn services_by_repository(&self, repo_id: &str) -> Result<Vec<Service>, AtlasError> {
        let sql = "SELECT id, repo_id, name, service_type, path, ports, contracts, dependencies \
                   FROM services WHERE repo_id = ? ORDER BY name";
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AtlasError::storage(format!("Failed to prepare services: {}", e)))?;
        let mut rows = stmt
            .query(params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Service query failed: {}", e)))?;
        collect_services(&mut rows)
    }

    async fn services_by_ids(&self, service_ids: &[String]) -> Result<Vec<Service>, AtlasError> {
        if service_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, repo_id, name, service_type, path, ports, contracts, dependencies \
             FROM services WHERE id IN ({}) ORDER BY name",
            quoted_in_list(service_ids)
        );
        check_query(&sql)?;
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AtlasError::storage(format!("Failed to prepare services: {}", e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| AtlasError::storage(format!("Service query failed: {}", e)))?;
        collect_services(&mut rows)
    }

    async fn delete_services_by_repository(&self, repo_id: &str) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM services WHERE repo_id = ?", params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Failed to delete services: {}", e)))?;
        Ok(())
    }

    async fn save_cross_repo_dependencies(
        &self,
        dependencies: &[CrossRepoDependency],
    ) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        for dep in dependencies {
            conn.execute(
                "INSERT OR IGNORE INTO cross_repo_dependencies \
                 (source_repo_id, target_repo_id, via) VALUES (?, ?, ?)",
                params![dep.source_repo_id, dep.target_repo_id, dep.via],
            )
            .map_err(|e| AtlasError::storage(format!("Failed to save cross-repo dep: {}", e)))?;
        }
        Ok(())
    }

    async fn delete_cross_repo_dependencies(&self, repo_id: &str) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM cross_repo_dependencies WHERE source_repo_id = ?",
            params![repo_id],
        )
        .map_err(|e| AtlasError::storage(format!("Failed to delete cross-repo deps: {}", e)))?;
        Ok(())
    }
}

fn collect_services(rows: &mut duckdb::Rows<'_>) -> Result<Vec<Service>, AtlasError> {
    let mut services = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
    {
        let get_text = |idx: usize| -> Result<String, AtlasError> {
            row.get(idx)
                .map_err(|e| AtlasError::storage(format!("Service column {}: {}", idx, e)))
        };
        let ports: String = get_text(5)?;
        let contracts: String = get_text(6)?;
        let dependencies: String = get_text(7)?;
        services.push(Service::reconstitute(
            get_text(0)?,
            get_text(1)?,
            get_text(2)?,
            crate::domain::ServiceType::parse(&get_text(3)?),
            get_text(4)?,
            serde_json::from_str(&ports).unwrap_or_default(),
            serde_json::from_str(&contracts).unwrap_or_default(),
            serde_json::from_str(&dependencies).unwrap_or_default(),
        ));
    }
    Ok(services)
}
