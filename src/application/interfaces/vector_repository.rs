use async_trait::async_trait;

use crate::domain::{
    AtlasError, ChunkHit, CodeChunk, Embedding, RankedFile, SearchScope, Symbol,
};

/// Vector persistence and similarity search over chunks and symbols.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Insert chunks with their embeddings; conflicts on chunk_id are
    /// ignored (stale rows are deleted by the incremental engine first).
    /// Embeddings marked failed are skipped together with their chunk.
    async fn save_chunks(
        &self,
        chunks: &[CodeChunk],
        embeddings: &[Embedding],
    ) -> Result<(), AtlasError>;

    async fn save_symbols(
        &self,
        symbols: &[Symbol],
        embeddings: &[Embedding],
    ) -> Result<(), AtlasError>;

    /// Stage A: file-level ANN search within scope.
    async fn search_files(
        &self,
        query_vector: &[f32],
        scope: &SearchScope,
        max_files: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<RankedFile>, AtlasError>;

    /// Stage B: chunk-level ANN search within scope, restricted to the
    /// given files. Returns hits with their stored vectors so the
    /// deduplicator can compare content similarity.
    async fn search_chunks(
        &self,
        query_vector: &[f32],
        scope: &SearchScope,
        file_paths: &[String],
        limit: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<ChunkHit>, AtlasError>;

    /// Best-match lookup of an exported symbol by name within scope.
    async fn find_exported_symbol(
        &self,
        name: &str,
        scope: &SearchScope,
    ) -> Result<Option<Symbol>, AtlasError>;

    /// Delete a file's chunks; returns the number removed.
    async fn delete_chunks_by_file(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<u64, AtlasError>;

    async fn delete_symbols_by_file(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<u64, AtlasError>;

    async fn delete_by_repository(&self, repo_id: &str) -> Result<(), AtlasError>;

    async fn count_chunks(&self, repo_id: &str) -> Result<u64, AtlasError>;

    async fn count_symbols(&self, repo_id: &str) -> Result<u64, AtlasError>;
}
