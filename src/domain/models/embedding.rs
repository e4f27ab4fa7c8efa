use serde::{Deserialize, Serialize};

/// A computed chunk embedding. A zero-length vector marks a failed
/// per-item embedding that was excluded from persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    chunk_id: String,
    vector: Vec<f32>,
    model: String,
    duration_ms: u64,
    enhanced_text: String,
}

impl Embedding {
    pub fn new(
        chunk_id: impl Into<String>,
        vector: Vec<f32>,
        model: impl Into<String>,
        duration_ms: u64,
        enhanced_text: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            vector,
            model: model.into(),
            duration_ms,
            enhanced_text: enhanced_text.into(),
        }
    }

    /// Placeholder for a request that failed inside a batch.
    pub fn failed(chunk_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            vector: Vec::new(),
            model: model.into(),
            duration_ms: 0,
            enhanced_text: String::new(),
        }
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn enhanced_text(&self) -> &str {
        &self.enhanced_text
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    pub fn is_failed(&self) -> bool {
        self.vector.is_empty()
    }
}

/// Cosine similarity between two vectors; 0.0 when lengths differ or a
/// vector is all-zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    model_name: String,
    dimension: usize,
    /// Context window hint forwarded to the host as `num_ctx`.
    num_ctx: Option<u32>,
    batch_concurrency: usize,
    max_retries: u32,
}

impl EmbeddingConfig {
    pub fn new(model_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimension,
            num_ctx: None,
            batch_concurrency: 5,
            max_retries: 3,
        }
    }

    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = Some(num_ctx);
        self
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn num_ctx(&self) -> Option<u32> {
        self.num_ctx
    }

    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "nomic-embed-text".to_string(),
            dimension: 768,
            num_ctx: None,
            batch_concurrency: 5,
            max_retries: 3,
        }
    }
}
