use async_trait::async_trait;

use crate::domain::{AtlasError, FileSummary, Language};

/// Produces the one-sentence per-file summary.
#[async_trait]
pub trait SummaryService: Send + Sync {
    async fn summarize(
        &self,
        file_path: &str,
        language: Language,
        content: &str,
    ) -> Result<FileSummary, AtlasError>;
}
