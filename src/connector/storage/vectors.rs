use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::VectorRepository;
use crate::domain::{
    AtlasError, ChunkHit, ChunkMetadata, ChunkType, CodeChunk, CodeLocation, Embedding,
    RankedFile, SearchScope, Symbol, SymbolScope, SymbolType,
};

use super::{check_query, quoted_in_list, vector_literal};

/// Chunk and symbol persistence with two-level vector search.
pub struct DuckdbVectorRepository {
    conn: Arc<Mutex<Connection>>,
    dimension: usize,
}

impl DuckdbVectorRepository {
    pub fn new(conn: Arc<Mutex<Connection>>, dimension: usize) -> Self {
        Self { conn, dimension }
    }

    /// Scope filters shared by both search stages.
    fn scope_clauses(scope: &SearchScope) -> Vec<String> {
        let mut clauses = Vec::new();
        if !scope.repo_ids.is_empty() {
            clauses.push(format!("repo_id IN ({})", quoted_in_list(&scope.repo_ids)));
        }
        if !scope.service_ids.is_empty() {
            clauses.push(format!(
                "(service_id IS NULL OR service_id IN ({}))",
                quoted_in_list(&scope.service_ids)
            ));
        }
        if !scope.workspace_ids.is_empty() {
            clauses.push(format!(
                "(workspace_id IS NULL OR workspace_id IN ({}))",
                quoted_in_list(&scope.workspace_ids)
            ));
        }
        clauses
    }
}

#[async_trait]
impl VectorRepository for DuckdbVectorRepository {
    async fn save_chunks(
        &self,
        chunks: &[CodeChunk],
        embeddings: &[Embedding],
    ) -> Result<(), AtlasError> {
        if chunks.len() != embeddings.len() {
            return Err(AtlasError::internal(format!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let conn = self.conn.lock().await;
        conn.execute_batch("BEGIN TRANSACTION")
            .map_err(|e| AtlasError::storage(format!("Failed to begin transaction: {}", e)))?;

        let result: Result<(), AtlasError> = (|| {
            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                if embedding.is_failed() {
                    // Failed per-item embeddings are excluded entirely.
                    continue;
                }
                let literal = vector_literal(embedding.vector(), self.dimension)?;
                let metadata = serde_json::to_string(chunk.metadata())
                    .map_err(|e| AtlasError::internal(format!("metadata serialization: {}", e)))?;
                let sql = format!(
                    "INSERT OR IGNORE INTO code_chunks \
                     (id, repo_id, file_path, chunk_type, start_line, end_line, content, \
                      token_count, metadata, created_at, workspace_id, package_name, service_id, \
                      embedding, model) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, {}, ?)",
                    literal
                );
                check_query(&sql)?;
                conn.execute(
                    &sql,
                    params![
                        chunk.id(),
                        chunk.repo_id(),
                        chunk.file_path(),
                        chunk.chunk_type().as_str(),
                        chunk.start_line() as i64,
                        chunk.end_line() as i64,
                        chunk.content(),
                        chunk.token_count() as i64,
                        metadata,
                        chunk.created_at(),
                        chunk.workspace_id(),
                        chunk.package_name(),
                        chunk.service_id(),
                        embedding.model(),
                    ],
                )
                .map_err(|e| AtlasError::storage(format!("Failed to insert chunk: {}", e)))?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => conn
                .execute_batch("COMMIT")
                .map_err(|e| AtlasError::storage(format!("Commit failed: {}", e))),
            Err(e) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn save_symbols(
        &self,
        symbols: &[Symbol],
        embeddings: &[Embedding],
    ) -> Result<(), AtlasError> {
        if symbols.len() != embeddings.len() {
            return Err(AtlasError::internal(format!(
                "symbol/embedding count mismatch: {} vs {}",
                symbols.len(),
                embeddings.len()
            )));
        }

        let conn = self.conn.lock().await;
        conn.execute_batch("BEGIN TRANSACTION")
            .map_err(|e| AtlasError::storage(format!("Failed to begin transaction: {}", e)))?;

        let result: Result<(), AtlasError> = (|| {
            for (symbol, embedding) in symbols.iter().zip(embeddings) {
                let literal = if embedding.is_failed() {
                    "NULL".to_string()
                } else {
                    vector_literal(embedding.vector(), self.dimension)?
                };
                let sql = format!(
                    "INSERT OR IGNORE INTO code_symbols \
                     (id, repo_id, file_path, name, symbol_type, line_number, definition, scope, \
                      embedding, model) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, {}, ?)",
                    literal
                );
                check_query(&sql)?;
                conn.execute(
                    &sql,
                    params![
                        symbol.id(),
                        symbol.repo_id(),
                        symbol.file_path(),
                        symbol.name(),
                        symbol.symbol_type().as_str(),
                        symbol.line_number() as i64,
                        symbol.definition(),
                        symbol.scope().as_str(),
                        embedding.model(),
                    ],
                )
                .map_err(|e| AtlasError::storage(format!("Failed to insert symbol: {}", e)))?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => conn
                .execute_batch("COMMIT")
                .map_err(|e| AtlasError::storage(format!("Commit failed: {}", e))),
            Err(e) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn search_files(
        &self,
        query_vector: &[f32],
        scope: &SearchScope,
        max_files: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<RankedFile>, AtlasError> {
        let literal = vector_literal(query_vector, self.dimension)?;
        let mut sql = format!(
            "SELECT repo_id, file_path, file_summary, language, \
             CAST(1.0 - array_cosine_distance(embedding, {lit}) AS DOUBLE) AS score \
             FROM code_files WHERE embedding IS NOT NULL \
             AND 1.0 - array_cosine_distance(embedding, {lit}) >= ?",
            lit = literal
        );
        for clause in Self::scope_clauses(scope) {
            sql.push_str(" AND ");
            sql.push_str(&clause);
        }
        sql.push_str(" ORDER BY score DESC, file_path LIMIT ?");
        check_query(&sql)?;

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AtlasError::storage(format!("Failed to prepare file search: {}", e)))?;
        let mut rows = stmt
            .query(params![similarity_threshold, max_files as i64])
            .map_err(|e| AtlasError::storage(format!("File search failed: {}", e)))?;

        let mut files = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            files.push(RankedFile {
                repo_id: row
                    .get(0)
                    .map_err(|e| AtlasError::storage(format!("File column: {}", e)))?,
                file_path: row
                    .get(1)
                    .map_err(|e| AtlasError::storage(format!("File column: {}", e)))?,
                file_summary: row
                    .get(2)
                    .map_err(|e| AtlasError::storage(format!("File column: {}", e)))?,
                language: row
                    .get(3)
                    .map_err(|e| AtlasError::storage(format!("File column: {}", e)))?,
                similarity: row
                    .get::<_, f64>(4)
                    .map_err(|e| AtlasError::storage(format!("File column: {}", e)))?
                    as f32,
            });
        }
        debug!("File search returned {} candidates", files.len());
        Ok(files)
    }

    async fn search_chunks(
        &self,
        query_vector: &[f32],
        scope: &SearchScope,
        file_paths: &[String],
        limit: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<ChunkHit>, AtlasError> {
        if file_paths.is_empty() {
            return Ok(Vec::new());
        }
        let literal = vector_literal(query_vector, self.dimension)?;
        let mut sql = format!(
            "SELECT id, repo_id, file_path, chunk_type, start_line, end_line, content, \
             token_count, metadata, service_id, \
             CAST(1.0 - array_cosine_distance(embedding, {lit}) AS DOUBLE) AS score, \
             CAST(to_json(embedding) AS VARCHAR) \
             FROM code_chunks WHERE embedding IS NOT NULL \
             AND file_path IN ({files}) \
             AND 1.0 - array_cosine_distance(embedding, {lit}) >= ?",
            lit = literal,
            files = quoted_in_list(file_paths),
        );
        for clause in Self::scope_clauses(scope) {
            sql.push_str(" AND ");
            sql.push_str(&clause);
        }
        // Ties break on chunk id for deterministic ordering.
        sql.push_str(" ORDER BY score DESC, id LIMIT ?");
        check_query(&sql)?;

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AtlasError::storage(format!("Failed to prepare chunk search: {}", e)))?;
        let mut rows = stmt
            .query(params![similarity_threshold, limit as i64])
            .map_err(|e| AtlasError::storage(format!("Chunk search failed: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            let col_err = |e: duckdb::Error| AtlasError::storage(format!("Chunk column: {}", e));
            let metadata: String = row.get(8).map_err(col_err)?;
            let vector_json: String = row.get(11).map_err(col_err)?;
            hits.push(ChunkHit {
                location: CodeLocation {
                    chunk_id: row.get(0).map_err(col_err)?,
                    repo_id: row.get(1).map_err(col_err)?,
                    file_path: row.get(2).map_err(col_err)?,
                    chunk_type: ChunkType::parse(&row.get::<_, String>(3).map_err(col_err)?),
                    start_line: u32::try_from(row.get::<_, i64>(4).map_err(col_err)?)
                        .unwrap_or(0),
                    end_line: u32::try_from(row.get::<_, i64>(5).map_err(col_err)?).unwrap_or(0),
                    content: row.get(6).map_err(col_err)?,
                    token_count: u32::try_from(row.get::<_, i64>(7).map_err(col_err)?)
                        .unwrap_or(0),
                    metadata: serde_json::from_str::<ChunkMetadata>(&metadata)
                        .unwrap_or_default(),
                    service_id: row.get(9).map_err(col_err)?,
                    similarity: row.get::<_, f64>(10).map_err(col_err)? as f32,
                    merged_duplicates: Vec::new(),
                },
                vector: serde_json::from_str(&vector_json).unwrap_or_default(),
            });
        }
        debug!("Chunk search returned {} candidates", hits.len());
        Ok(hits)
    }

    async fn find_exported_symbol(
        &self,
        name: &str,
        scope: &SearchScope,
    ) -> Result<Option<Symbol>, AtlasError> {
        let mut sql = "SELECT id, repo_id, file_path, name, symbol_type, line_number, definition, scope \
             FROM code_symbols WHERE name = ? AND scope = 'exported'"
            .to_string();
        if !scope.repo_ids.is_empty() {
            sql.push_str(&format!(
                " AND repo_id IN ({})",
                quoted_in_list(&scope.repo_ids)
            ));
        }
        sql.push_str(" ORDER BY file_path, line_number LIMIT 1");
        check_query(&sql)?;

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AtlasError::storage(format!("Failed to prepare symbol lookup: {}", e)))?;
        let mut rows = stmt
            .query(params![name])
            .map_err(|e| AtlasError::storage(format!("Symbol lookup failed: {}", e)))?;
        match rows
            .next()
            .map_err(|e| AtlasError::storage(format!("Row read failed: {}", e)))?
        {
            Some(row) => {
                let col_err =
                    |e: duckdb::Error| AtlasError::storage(format!("Symbol column: {}", e));
                Ok(Some(Symbol::reconstitute(
                    row.get(0).map_err(col_err)?,
                    row.get(3).map_err(col_err)?,
                    SymbolType::parse(&row.get::<_, String>(4).map_err(col_err)?),
                    row.get(2).map_err(col_err)?,
                    row.get(1).map_err(col_err)?,
                    u32::try_from(row.get::<_, i64>(5).map_err(col_err)?).unwrap_or(0),
                    row.get(6).map_err(col_err)?,
                    SymbolScope::parse(&row.get::<_, String>(7).map_err(col_err)?),
                )))
            }
            None => Ok(None),
        }
    }

    async fn delete_chunks_by_file(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<u64, AtlasError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute(
                "DELETE FROM code_chunks WHERE repo_id = ? AND file_path = ?",
                params![repo_id, file_path],
            )
            .map_err(|e| AtlasError::storage(format!("Failed to delete chunks: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn delete_symbols_by_file(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<u64, AtlasError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute(
                "DELETE FROM code_symbols WHERE repo_id = ? AND file_path = ?",
                params![repo_id, file_path],
            )
            .map_err(|e| AtlasError::storage(format!("Failed to delete symbols: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn delete_by_repository(&self, repo_id: &str) -> Result<(), AtlasError> {
        let conn = self.conn.lock().await;
        // Chunks before symbols, per the clearing order.
        conn.execute("DELETE FROM code_chunks WHERE repo_id = ?", params![repo_id])
            .map_err(|e| AtlasError::storage(format!("Failed to delete chunks: {}", e)))?;
        conn.execute(
            "DELETE FROM code_symbols WHERE repo_id = ?",
            params![repo_id],
        )
        .map_err(|e| AtlasError::storage(format!("Failed to delete symbols: {}", e)))?;
        Ok(())
    }

    async fn count_chunks(&self, repo_id: &str) -> Result<u64, AtlasError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM code_chunks WHERE repo_id = ?",
                params![repo_id],
                |row| row.get(0),
            )
            .map_err(|e| AtlasError::storage(format!("Chunk count failed: {}", e)))?;
        Ok(count as u64)
    }

    async fn count_symbols(&self, repo_id: &str) -> Result<u64, AtlasError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM code_symbols WHERE repo_id = ?",
                params![repo_id],
                |row| row.get(0),
            )
            .map_err(|e| AtlasError::storage(format!("Symbol count failed: {}", e)))?;
        Ok(count as u64)
    }
}
