//! Embedding services: the model-host adapter with enhanced-text
//! construction and bounded-concurrency batching, and a deterministic
//! mock for tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::future::join_all;
use rand::Rng;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::application::EmbeddingService;
use crate::connector::host::OllamaClient;
use crate::domain::{AtlasError, CodeChunk, Embedding, EmbeddingConfig};

/// Symbol list suffix is truncated at this many characters.
const SYMBOL_LIST_MAX_CHARS: usize = 200;

/// The string handed to the embedding model: optional file summary, the
/// chunk content, and a trailing symbol list. Absent segments are
/// omitted.
pub fn build_enhanced_text(chunk: &CodeChunk, file_summary: Option<&str>) -> String {
    let mut text = String::new();
    if let Some(summary) = file_summary {
        if !summary.is_empty() {
            text.push_str(summary);
            text.push_str("\n\n");
        }
    }
    text.push_str(chunk.content());

    let symbols = chunk.metadata().symbol_names();
    if !symbols.is_empty() {
        let mut list = symbols.join(", ");
        if list.chars().count() > SYMBOL_LIST_MAX_CHARS {
            list = list.chars().take(SYMBOL_LIST_MAX_CHARS).collect();
        }
        text.push_str("\n\nSymbols: ");
        text.push_str(&list);
    }
    text
}

/// Embedding service backed by the model host.
pub struct HostEmbeddingService {
    client: Arc<OllamaClient>,
    config: EmbeddingConfig,
}

impl HostEmbeddingService {
    pub fn new(client: Arc<OllamaClient>, config: EmbeddingConfig) -> Self {
        Self { client, config }
    }

    fn validate_dimension(&self, vector: &[f32]) -> Result<(), AtlasError> {
        if vector.len() != self.config.dimension() {
            return Err(AtlasError::dimension(self.config.dimension(), vector.len()));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingService for HostEmbeddingService {
    async fn embed_chunk(
        &self,
        chunk: &CodeChunk,
        file_summary: Option<&str>,
    ) -> Result<Embedding, AtlasError> {
        let enhanced = build_enhanced_text(chunk, file_summary);
        let started = Instant::now();
        let vector = self.client.embed(&enhanced).await?;
        self.validate_dimension(&vector)?;
        Ok(Embedding::new(
            chunk.id(),
            vector,
            self.config.model_name(),
            started.elapsed().as_millis() as u64,
            enhanced,
        ))
    }

    /// Rounds of `batch_concurrency` in-flight requests; each round
    /// completes before the next starts. A failed request becomes a
    /// zero-length embedding and does not stop the batch.
    async fn embed_chunks(
        &self,
        chunks: &[CodeChunk],
        file_summary: Option<&str>,
    ) -> Result<Vec<Embedding>, AtlasError> {
        let concurrency = self.config.batch_concurrency();
        let mut embeddings = Vec::with_capacity(chunks.len());

        for round in chunks.chunks(concurrency) {
            let results =
                join_all(round.iter().map(|chunk| self.embed_chunk(chunk, file_summary))).await;
            for (chunk, result) in round.iter().zip(results) {
                match result {
                    Ok(embedding) => embeddings.push(embedding),
                    Err(e) => {
                        warn!("Embedding failed for chunk {}: {}", chunk.id(), e);
                        embeddings.push(Embedding::failed(chunk.id(), self.config.model_name()));
                    }
                }
            }
        }
        Ok(embeddings)
    }

    async fn embed_text(&self, id: &str, text: &str) -> Result<Embedding, AtlasError> {
        let started = Instant::now();
        let vector = self.client.embed(text).await?;
        self.validate_dimension(&vector)?;
        Ok(Embedding::new(
            id,
            vector,
            self.config.model_name(),
            started.elapsed().as_millis() as u64,
            text,
        ))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AtlasError> {
        let vector = self.client.embed(query).await?;
        self.validate_dimension(&vector)?;
        Ok(vector)
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

/// Deterministic content-seeded embeddings for tests and offline runs.
pub struct MockEmbeddingService {
    config: EmbeddingConfig,
}

impl MockEmbeddingService {
    pub fn new() -> Self {
        Self {
            config: EmbeddingConfig::new("mock-embedding", 384),
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            config: EmbeddingConfig::new("mock-embedding", dimension),
        }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.config.dimension())
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for MockEmbeddingService {
    async fn embed_chunk(
        &self,
        chunk: &CodeChunk,
        file_summary: Option<&str>,
    ) -> Result<Embedding, AtlasError> {
        let enhanced = build_enhanced_text(chunk, file_summary);
        let vector = self.generate(&enhanced);
        debug!("Mock embedding for chunk {} ({} dims)", chunk.id(), vector.len());
        Ok(Embedding::new(
            chunk.id(),
            vector,
            self.config.model_name(),
            0,
            enhanced,
        ))
    }

    async fn embed_chunks(
        &self,
        chunks: &[CodeChunk],
        file_summary: Option<&str>,
    ) -> Result<Vec<Embedding>, AtlasError> {
        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            embeddings.push(self.embed_chunk(chunk, file_summary).await?);
        }
        Ok(embeddings)
    }

    async fn embed_text(&self, id: &str, text: &str) -> Result<Embedding, AtlasError> {
        Ok(Embedding::new(
            id,
            self.generate(text),
            self.config.model_name(),
            0,
            text,
        ))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AtlasError> {
        Ok(self.generate(query))
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkMetadata, ChunkType};

    fn chunk_with_symbols() -> CodeChunk {
        CodeChunk::new("a.ts", "r", ChunkType::Function, 1, 10, "function add() {}").with_metadata(
            ChunkMetadata {
                function_names: vec!["add".to_string()],
                class_names: vec!["Calc".to_string()],
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_enhanced_text_full_form() {
        let text = build_enhanced_text(&chunk_with_symbols(), Some("This file adds numbers."));
        assert!(text.starts_with("This file adds numbers.\n\n"));
        assert!(text.contains("function add() {}"));
        assert!(text.ends_with("Symbols: add, Calc"));
    }

    #[test]
    fn test_enhanced_text_omits_absent_segments() {
        let bare = CodeChunk::new("a.ts", "r", ChunkType::Block, 1, 2, "let x = 1;");
        let text = build_enhanced_text(&bare, None);
        assert_eq!(text, "let x = 1;");
    }

    #[test]
    fn test_enhanced_text_symbol_truncation() {
        let mut meta = ChunkMetadata::default();
        meta.function_names = (0..100).map(|i| format!("veryLongFunctionName{}", i)).collect();
        let chunk = CodeChunk::new("a.ts", "r", ChunkType::Block, 1, 2, "x").with_metadata(meta);
        let text = build_enhanced_text(&chunk, None);
        let suffix = text.split("Symbols: ").nth(1).unwrap();
        assert!(suffix.chars().count() <= SYMBOL_LIST_MAX_CHARS);
    }

    #[tokio::test]
    async fn test_mock_embeddings_are_deterministic_and_normalized() {
        let service = MockEmbeddingService::with_dimension(64);
        let a = service.embed_query("find the walker").await.unwrap();
        let b = service.embed_query("find the walker").await.unwrap();
        let c = service.embed_query("something else").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let magnitude: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_mock_batch_matches_config_dimension() {
        let service = MockEmbeddingService::with_dimension(32);
        let chunks = vec![chunk_with_symbols(), chunk_with_symbols()];
        let embeddings = service.embed_chunks(&chunks, None).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert!(embeddings.iter().all(|e| e.dimension() == 32));
    }
}
