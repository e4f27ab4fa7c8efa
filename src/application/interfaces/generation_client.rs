use async_trait::async_trait;

use crate::domain::AtlasError;

/// Text generation against the model host, used by the LLM summarizer.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AtlasError>;

    fn model_name(&self) -> &str;
}
