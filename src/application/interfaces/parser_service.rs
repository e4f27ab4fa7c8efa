use async_trait::async_trait;

use crate::domain::{AtlasError, Language, ParseResult};

/// Parses source text into a uniform node/import/export tree.
#[async_trait]
pub trait ParserService: Send + Sync {
    /// Parse one file. Implementations fall back to a regex scan when no
    /// grammar exists or the tree carries the error flag, reporting it in
    /// `ParseResult::used_fallback`.
    async fn parse(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<ParseResult, AtlasError>;

    fn supported_languages(&self) -> Vec<Language>;

    fn supports_language(&self, language: Language) -> bool {
        self.supported_languages().contains(&language)
    }
}
