//! Per-file summarizers: model-backed with rule-based fallback.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::application::{GenerationClient, SummaryService};
use crate::domain::{AtlasError, FileSummary, Language};

/// Lines of the file included in the summarization prompt.
const DEFAULT_PROMPT_LINES: usize = 50;

static FUNCTION_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:export\s+)?(?:pub\s+)?(?:async\s+)?(?:function|fn|def|func)\s+\w+")
        .expect("function count pattern")
});
static CLASS_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:export\s+)?(?:pub\s+)?(?:abstract\s+)?(?:class|struct|interface|trait)\s+\w+")
        .expect("class count pattern")
});

/// Rule-based summarizer: a leading doc comment when one exists,
/// otherwise a declaration count sentence.
pub struct RuleBasedSummaryService;

impl RuleBasedSummaryService {
    pub fn new() -> Self {
        Self
    }

    fn summarize_sync(content: &str) -> String {
        if let Some(doc) = leading_doc_comment(content) {
            return doc;
        }
        let functions = FUNCTION_COUNT.find_iter(content).count();
        let classes = CLASS_COUNT.find_iter(content).count();
        format!(
            "This file contains {} functions and {} classes.",
            functions, classes
        )
    }
}

impl Default for RuleBasedSummaryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryService for RuleBasedSummaryService {
    async fn summarize(
        &self,
        _file_path: &str,
        _language: Language,
        content: &str,
    ) -> Result<FileSummary, AtlasError> {
        let started = Instant::now();
        let text = Self::summarize_sync(content);
        Ok(FileSummary::rule_based(
            text,
            started.elapsed().as_millis() as u64,
        ))
    }
}

/// Model-backed summarizer. Any generation failure falls back to the
/// rule-based path.
pub struct LlmSummaryService {
    client: Arc<dyn GenerationClient>,
    prompt_lines: usize,
}

impl LlmSummaryService {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            client,
            prompt_lines: DEFAULT_PROMPT_LINES,
        }
    }

    pub fn with_prompt_lines(mut self, lines: usize) -> Self {
        self.prompt_lines = lines.max(1);
        self
    }

    fn build_prompt(&self, file_path: &str, language: Language, content: &str) -> String {
        let head: Vec<&str> = content.lines().take(self.prompt_lines).collect();
        format!(
            "Summarize this {} file in 1-2 sentences. Begin with \"This file\".\n\nPath: {}\n\n```\n{}\n```",
            language,
            file_path,
            head.join("\n")
        )
    }
}

#[async_trait]
impl SummaryService for LlmSummaryService {
    async fn summarize(
        &self,
        file_path: &str,
        language: Language,
        content: &str,
    ) -> Result<FileSummary, AtlasError> {
        let started = Instant::now();
        let prompt = self.build_prompt(file_path, language, content);

        match self.client.generate(&prompt).await {
            Ok(text) => Ok(FileSummary::llm(
                text,
                self.client.model_name(),
                started.elapsed().as_millis() as u64,
            )),
            Err(e) => {
                debug!("LLM summary failed for {} ({}); using rules", file_path, e);
                let text = RuleBasedSummaryService::summarize_sync(content);
                Ok(FileSummary::rule_based(
                    text,
                    started.elapsed().as_millis() as u64,
                ))
            }
        }
    }
}

/// A doc comment or block comment at the very top of the file.
fn leading_doc_comment(content: &str) -> Option<String> {
    let mut collected: Vec<String> = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() && collected.is_empty() {
            continue;
        }
        let is_comment = trimmed.starts_with("//")
            || trimmed.starts_with('#') && !trimmed.starts_with("#!")
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
            || trimmed.starts_with("\"\"\"");
        if is_comment {
            let cleaned = trimmed
                .trim_start_matches("//!")
                .trim_start_matches("///")
                .trim_start_matches("//")
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_start_matches('*')
                .trim_start_matches('#')
                .trim_matches('"')
                .trim_end_matches("*/")
                .trim();
            if !cleaned.is_empty() {
                collected.push(cleaned.to_string());
            }
            if collected.len() >= 2 {
                break;
            }
        } else {
            break;
        }
    }
    if collected.is_empty() {
        None
    } else {
        Some(collected.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingClient;

    #[async_trait]
    impl GenerationClient for FailingClient {
        async fn generate(&self, _prompt: &str) -> Result<String, AtlasError> {
            Err(AtlasError::HostUnreachable {
                url: "http://localhost:11434".to_string(),
                message: "connection refused".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "offline"
        }
    }

    struct EchoClient;

    #[async_trait]
    impl GenerationClient for EchoClient {
        async fn generate(&self, _prompt: &str) -> Result<String, AtlasError> {
            Ok("This file wires the HTTP router to the session store.".to_string())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_rule_based_counts_declarations() {
        let service = RuleBasedSummaryService::new();
        let content = "function a() {}\nfunction b() {}\nclass C {}\n";
        let summary = service
            .summarize("a.ts", Language::TypeScript, content)
            .await
            .unwrap();
        assert!(summary.text.contains("2 functions and 1 classes"));
        assert!(summary.text.starts_with("This file"));
        assert_eq!(summary.method, crate::domain::SummaryMethod::RuleBased);
    }

    #[tokio::test]
    async fn test_rule_based_prefers_doc_comment() {
        let service = RuleBasedSummaryService::new();
        let content = "//! Session persistence over DuckDB.\n//! Keeps one row per login.\n\npub fn save() {}\n";
        let summary = service
            .summarize("session.rs", Language::Rust, content)
            .await
            .unwrap();
        assert!(summary.text.contains("Session persistence over DuckDB."));
    }

    #[tokio::test]
    async fn test_llm_summary_used_when_generation_succeeds() {
        let service = LlmSummaryService::new(Arc::new(EchoClient));
        let summary = service
            .summarize("router.ts", Language::TypeScript, "const app = express();")
            .await
            .unwrap();
        assert_eq!(summary.method, crate::domain::SummaryMethod::Llm);
        assert_eq!(summary.model_used.as_deref(), Some("echo"));
        assert!(summary.text.starts_with("This file"));
        assert!(summary.text.ends_with('.'));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_rules() {
        let service = LlmSummaryService::new(Arc::new(FailingClient));
        let summary = service
            .summarize("a.ts", Language::TypeScript, "function a() {}\n")
            .await
            .unwrap();
        assert_eq!(summary.method, crate::domain::SummaryMethod::RuleBased);
    }

    #[test]
    fn test_prompt_contains_language_and_path() {
        let service = LlmSummaryService::new(Arc::new(EchoClient)).with_prompt_lines(2);
        let prompt = service.build_prompt("src/a.py", Language::Python, "x = 1\ny = 2\nz = 3\n");
        assert!(prompt.contains("python"));
        assert!(prompt.contains("src/a.py"));
        assert!(prompt.contains("y = 2"));
        assert!(!prompt.contains("z = 3"));
    }
}
