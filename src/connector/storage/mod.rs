//! DuckDB-backed persistence. The store is a vector-capable relational
//! database via the VSS extension; chunk and symbol embeddings live
//! alongside their source rows.

mod catalog;
mod guard;
mod vectors;

pub use catalog::DuckdbCatalogRepository;
pub use guard::check_query;
pub use vectors::DuckdbVectorRepository;

use std::path::Path;
use std::sync::Arc;

use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::AtlasError;

/// Shared DuckDB handle. DuckDB allows one writer per file, so every
/// adapter clones the same connection.
pub struct DuckdbStorage {
    conn: Arc<Mutex<Connection>>,
    dimension: usize,
}

impl DuckdbStorage {
    pub fn open(path: &Path, dimension: usize) -> Result<Self, AtlasError> {
        let conn = Connection::open(path)
            .map_err(|e| AtlasError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize(&conn, dimension)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimension,
        })
    }

    pub fn in_memory(dimension: usize) -> Result<Self, AtlasError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AtlasError::storage(format!("Failed to open in-memory DuckDB: {}", e)))?;
        Self::initialize(&conn, dimension)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimension,
        })
    }

    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn catalog(&self) -> DuckdbCatalogRepository {
        DuckdbCatalogRepository::new(self.shared_connection(), self.dimension)
    }

    pub fn vectors(&self) -> DuckdbVectorRepository {
        DuckdbVectorRepository::new(self.shared_connection(), self.dimension)
    }

    /// Load the vector extension and create the schema.
    fn initialize(conn: &Connection, dimension: usize) -> Result<(), AtlasError> {
        debug!("Initializing DuckDB schema (dimension {})", dimension);

        conn.execute_batch(
            "INSTALL vss; LOAD vss; SET hnsw_enable_experimental_persistence = true;",
        )
        .map_err(|e| AtlasError::storage(format!("Failed to initialize VSS extension: {}", e)))?;

        let schema_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                repo_type TEXT NOT NULL,
                root_path TEXT NOT NULL UNIQUE,
                metadata TEXT NOT NULL DEFAULT '{{}}',
                file_count BIGINT DEFAULT 0,
                chunk_count BIGINT DEFAULT 0,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS code_files (
                repo_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                language TEXT NOT NULL,
                line_count INTEGER NOT NULL,
                file_hash TEXT NOT NULL,
                file_summary TEXT,
                exports TEXT NOT NULL DEFAULT '[]',
                imports TEXT NOT NULL DEFAULT '[]',
                workspace_id TEXT,
                package_name TEXT,
                service_id TEXT,
                embedding FLOAT[{dim}],
                PRIMARY KEY (repo_id, file_path)
            );

            CREATE TABLE IF NOT EXISTS code_chunks (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                chunk_type TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                content TEXT NOT NULL,
                token_count INTEGER NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{{}}',
                created_at BIGINT NOT NULL,
                workspace_id TEXT,
                package_name TEXT,
                service_id TEXT,
                embedding FLOAT[{dim}],
                model TEXT
            );

            CREATE TABLE IF NOT EXISTS code_symbols (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                name TEXT NOT NULL,
                symbol_type TEXT NOT NULL,
                line_number INTEGER NOT NULL,
                definition TEXT NOT NULL,
                scope TEXT NOT NULL,
                embedding FLOAT[{dim}],
                model TEXT
            );

            CREATE TABLE IF NOT EXISTS workspaces (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                package_name TEXT NOT NULL,
                path TEXT NOT NULL,
                version TEXT,
                dependencies TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS workspace_dependencies (
                repo_id TEXT NOT NULL,
                source_workspace_id TEXT NOT NULL,
                target_workspace_id TEXT NOT NULL,
                PRIMARY KEY (source_workspace_id, target_workspace_id)
            );

            CREATE TABLE IF NOT EXISTS workspace_aliases (
                repo_id TEXT NOT NULL,
                pattern TEXT NOT NULL,
                target TEXT NOT NULL,
                kind TEXT NOT NULL,
                is_internal BOOLEAN NOT NULL,
                PRIMARY KEY (repo_id, pattern, target)
            );

            CREATE TABLE IF NOT EXISTS services (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                name TEXT NOT NULL,
                service_type TEXT NOT NULL,
                path TEXT NOT NULL,
                ports TEXT NOT NULL DEFAULT '[]',
                contracts TEXT NOT NULL DEFAULT '[]',
                dependencies TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS cross_repo_dependencies (
                source_repo_id TEXT NOT NULL,
                target_repo_id TEXT NOT NULL,
                via TEXT NOT NULL,
                PRIMARY KEY (source_repo_id, target_repo_id, via)
            );

            CREATE INDEX IF NOT EXISTS chunks_by_file ON code_chunks (repo_id, file_path);
            CREATE INDEX IF NOT EXISTS symbols_by_name ON code_symbols (name, scope);
            "#,
            dim = dimension
        );
        conn.execute_batch(&schema_sql)
            .map_err(|e| AtlasError::storage(format!("Failed to initialize schema: {}", e)))?;

        debug!("DuckDB schema initialized");
        Ok(())
    }

    /// Startup health check: the vector extension is loaded and the
    /// vector-typed columns exist on the expected tables.
    pub async fn health_check(&self) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;

        let loaded: i64 = conn
            .query_row(
                "SELECT count(*) FROM duckdb_extensions() WHERE extension_name = 'vss' AND loaded",
                [],
                |row| row.get(0),
            )
            .map_err(|e| AtlasError::storage(format!("Extension check failed: {}", e)))?;
        if loaded == 0 {
            return Err(AtlasError::storage(
                "vector extension 'vss' is not loaded".to_string(),
            ));
        }

        for table in ["code_files", "code_chunks", "code_symbols"] {
            let data_type: Option<String> = conn
                .query_row(
                    "SELECT data_type FROM information_schema.columns \
                     WHERE table_name = ? AND column_name = 'embedding'",
                    [table],
                    |row| row.get(0),
                )
                .map_err(|e| {
                    AtlasError::storage(format!("Column check for {} failed: {}", table, e))
                })?;
            match data_type {
                Some(ty) if ty.to_uppercase().contains("FLOAT") => {}
                other => {
                    return Err(AtlasError::storage(format!(
                        "{}.embedding is not vector-typed (found {:?})",
                        table, other
                    )));
                }
            }
        }

        info!("Storage health check passed");
        Ok(())
    }

    /// Verify the connected database matches the configured name.
    pub async fn verify_database(&self, expected: &str) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        let current: String = conn
            .query_row("SELECT current_database()", [], |row| row.get(0))
            .map_err(|e| AtlasError::storage(format!("current_database() failed: {}", e)))?;
        if current != expected {
            return Err(AtlasError::storage(format!(
                "Connected to database '{}' but '{}' was configured",
                current, expected
            )));
        }
        Ok(())
    }
}

/// Render a vector as a DuckDB array literal, validating its dimension.
pub(crate) fn vector_literal(vector: &[f32], dimension: usize) -> Result<String, AtlasError> {
    if vector.len() != dimension {
        return Err(AtlasError::dimension(dimension, vector.len()));
    }
    let mut s = String::with_capacity(vector.len() * 8);
    s.push('[');
    for (i, v) in vector.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        s.push_str(&format!("{}", v));
    }
    s.push(']');
    s.push_str(&format!("::FLOAT[{}]", dimension));
    Ok(s)
}

/// Quote a string list for an `IN (...)` clause.
pub(crate) fn quoted_in_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal_dimension_guard() {
        assert!(vector_literal(&[0.1, 0.2], 3).is_err());
        let lit = vector_literal(&[0.5, -0.25, 1.0], 3).unwrap();
        assert!(lit.starts_with("[0.5, -0.25, 1]"));
        assert!(lit.ends_with("::FLOAT[3]"));
    }

    #[test]
    fn test_quoted_in_list_escapes() {
        let list = quoted_in_list(&["plain".to_string(), "o'brien".to_string()]);
        assert_eq!(list, "'plain','o''brien'");
    }

    #[tokio::test]
    async fn test_in_memory_storage_health() {
        let storage = DuckdbStorage::in_memory(8).expect("storage");
        storage.health_check().await.expect("health check");
    }
}
