//! HTTP client for the embedding-model host (Ollama-compatible API).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::GenerationClient;
use crate::domain::AtlasError;

/// Default target: Ollama running locally on its standard port.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const TAGS_PATH: &str = "/api/tags";
const EMBEDDINGS_PATH: &str = "/api/embeddings";
const GENERATE_PATH: &str = "/api/generate";
/// Exponential backoff base delay.
const BACKOFF_BASE_MS: u64 = 1000;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ModelOptions>,
}

#[derive(Serialize)]
struct ModelOptions {
    num_ctx: u32,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP client for an Ollama-compatible model host.
///
/// Endpoints consumed: `GET /api/tags` (list models), `POST
/// /api/embeddings`, and `POST /api/generate` with `stream: false`.
/// Transient failures (connect, timeout, 5xx) retry with exponential
/// backoff (base 1 s, multiplicative) up to the configured attempts.
///
/// A lightweight `GET /api/tags` probe with a 2-second timeout runs
/// before the first request so a stopped host fails fast instead of
/// hanging for the full request timeout.
pub struct OllamaClient {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    base_url: String,
    embed_model: String,
    generate_model: String,
    num_ctx: Option<u32>,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        embed_model: impl Into<String>,
        generate_model: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            probe_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            base_url,
            embed_model: embed_model.into(),
            generate_model: generate_model.into(),
            num_ctx: None,
            max_retries: 3,
        }
    }

    /// Construct from environment variables with local-first defaults:
    ///
    /// | Variable                   | Default                  |
    /// |----------------------------|--------------------------|
    /// | `OLLAMA_BASE_URL`          | `http://localhost:11434` |
    /// | `CODEATLAS_EMBED_MODEL`    | `nomic-embed-text`       |
    /// | `CODEATLAS_GENERATE_MODEL` | `llama3.2`               |
    pub fn from_env() -> Self {
        let base = std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let embed = std::env::var("CODEATLAS_EMBED_MODEL")
            .unwrap_or_else(|_| "nomic-embed-text".to_string());
        let generate =
            std::env::var("CODEATLAS_GENERATE_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Self::new(base, embed, generate)
    }

    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = Some(num_ctx);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn probe(&self) -> Result<(), AtlasError> {
        let url = format!("{}{}", self.base_url, TAGS_PATH);
        match self.probe_client.get(&url).send().await {
            Err(e) if e.is_connect() || e.is_timeout() => Err(AtlasError::HostUnreachable {
                url: self.base_url.clone(),
                message: e.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Models available on the host.
    pub async fn list_models(&self) -> Result<Vec<String>, AtlasError> {
        self.probe().await?;
        let url = format!("{}{}", self.base_url, TAGS_PATH);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AtlasError::HostUnreachable {
                url: self.base_url.clone(),
                message: e.to_string(),
            })?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| AtlasError::embedding(format!("list-models response: {e}")))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Verify the configured models exist on the host.
    pub async fn verify_models(&self) -> Result<(), AtlasError> {
        let models = self.list_models().await?;
        let has = |wanted: &str| {
            models
                .iter()
                .any(|m| m == wanted || m.starts_with(&format!("{}:", wanted)))
        };
        if !has(&self.embed_model) {
            return Err(AtlasError::ModelNotFound(self.embed_model.clone()));
        }
        if !has(&self.generate_model) {
            return Err(AtlasError::ModelNotFound(self.generate_model.clone()));
        }
        Ok(())
    }

    /// Embed one prompt, retrying transient failures with backoff.
    pub async fn embed(&self, prompt: &str) -> Result<Vec<f32>, AtlasError> {
        self.probe().await?;
        let url = format!("{}{}", self.base_url, EMBEDDINGS_PATH);
        let request = EmbedRequest {
            model: &self.embed_model,
            prompt,
            options: self.num_ctx.map(|num_ctx| ModelOptions { num_ctx }),
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = self.client.post(&url).json(&request).send().await;
            match result {
                Ok(response) if response.status().is_success() => {
                    let body: EmbedResponse = response.json().await.map_err(|e| {
                        AtlasError::embedding(format!("embed response parse: {e}"))
                    })?;
                    return Ok(body.embedding);
                }
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 404 {
                        return Err(AtlasError::ModelNotFound(self.embed_model.clone()));
                    }
                    if !status.is_server_error() || attempt > self.max_retries {
                        let body = response.text().await.unwrap_or_default();
                        return Err(AtlasError::embedding(format!(
                            "host returned {status}: {body}"
                        )));
                    }
                    warn!("Embed attempt {} returned {}; retrying", attempt, status);
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt <= self.max_retries => {
                    warn!("Embed attempt {} failed ({}); retrying", attempt, e);
                }
                Err(e) if e.is_timeout() => {
                    return Err(AtlasError::Timeout(30_000));
                }
                Err(e) => {
                    return Err(AtlasError::HostUnreachable {
                        url: self.base_url.clone(),
                        message: e.to_string(),
                    });
                }
            }
            let delay = BACKOFF_BASE_MS * 2u64.pow(attempt.saturating_sub(1));
            debug!("Backing off {} ms before retry", delay);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, AtlasError> {
        self.probe().await?;
        let url = format!("{}{}", self.base_url, GENERATE_PATH);
        let request = GenerateRequest {
            model: &self.generate_model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AtlasError::Timeout(30_000)
                } else {
                    AtlasError::HostUnreachable {
                        url: self.base_url.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            if status.as_u16() == 404 {
                return Err(AtlasError::ModelNotFound(self.generate_model.clone()));
            }
            return Err(AtlasError::embedding(format!("generate returned {status}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AtlasError::embedding(format!("generate response parse: {e}")))?;
        Ok(body.response)
    }

    fn model_name(&self) -> &str {
        &self.generate_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_trimmed() {
        let client = OllamaClient::new("http://host:11434/", "e", "g");
        assert_eq!(client.base_url(), "http://host:11434");
    }

    #[test]
    fn test_embed_request_serialization() {
        let request = EmbedRequest {
            model: "nomic-embed-text",
            prompt: "fn main() {}",
            options: Some(ModelOptions { num_ctx: 8192 }),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"num_ctx\":8192"));

        let bare = EmbedRequest {
            model: "m",
            prompt: "p",
            options: None,
        };
        let json = serde_json::to_string(&bare).unwrap();
        assert!(!json.contains("options"));
    }

    #[test]
    fn test_generate_request_is_not_streaming() {
        let request = GenerateRequest {
            model: "llama3.2",
            prompt: "summarize",
            stream: false,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"stream\":false"));
    }
}
