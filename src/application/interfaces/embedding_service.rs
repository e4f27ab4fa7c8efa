use async_trait::async_trait;

use crate::domain::{AtlasError, CodeChunk, Embedding, EmbeddingConfig};

/// Generates vector embeddings for chunks, symbol definitions, and
/// queries. Every returned vector matches the configured dimension; a
/// mismatch from the host surfaces as `AtlasError::VectorDimension`.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed one chunk using its enhanced text (file summary + content +
    /// symbol list).
    async fn embed_chunk(
        &self,
        chunk: &CodeChunk,
        file_summary: Option<&str>,
    ) -> Result<Embedding, AtlasError>;

    /// Embed a batch with bounded concurrency. Per-item failures map to
    /// zero-length embeddings rather than aborting the batch.
    async fn embed_chunks(
        &self,
        chunks: &[CodeChunk],
        file_summary: Option<&str>,
    ) -> Result<Vec<Embedding>, AtlasError>;

    /// Embed free text (symbol definitions, file summaries).
    async fn embed_text(&self, id: &str, text: &str) -> Result<Embedding, AtlasError>;

    /// Embed a search query.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AtlasError>;

    fn config(&self) -> &EmbeddingConfig;
}
