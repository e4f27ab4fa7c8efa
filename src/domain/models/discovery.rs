use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Language;

/// One file accepted by the walker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredFile {
    pub absolute_path: PathBuf,
    /// Forward-slash normalized, relative to the repository root.
    pub relative_path: String,
    pub language: Language,
    pub line_count: u32,
    pub size_bytes: u64,
    pub mtime_secs: i64,
    /// SHA-256 lowercase hex of the decoded content.
    pub file_hash: String,
    /// Retained so downstream stages do not re-read the file.
    pub content: String,
}

/// Tally of everything the walker saw and why files were skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkStats {
    pub discovered: u64,
    pub excluded_ignored: u64,
    pub excluded_binary: u64,
    pub excluded_generated: u64,
    pub excluded_secret: u64,
    pub excluded_size: u64,
    pub excluded_markdown: u64,
    pub excluded_unknown: u64,
    /// Per-pattern counts from the secret-file detector.
    pub secret_matches: HashMap<String, u64>,
}

impl WalkStats {
    pub fn total_excluded(&self) -> u64 {
        self.excluded_ignored
            + self.excluded_binary
            + self.excluded_generated
            + self.excluded_secret
            + self.excluded_size
            + self.excluded_markdown
            + self.excluded_unknown
    }

    pub fn record_secret_match(&mut self, pattern: &str) {
        self.excluded_secret += 1;
        *self.secret_matches.entry(pattern.to_string()).or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_excluded_sums_categories() {
        let mut stats = WalkStats::default();
        stats.excluded_ignored = 3;
        stats.excluded_binary = 2;
        stats.record_secret_match(".env*");
        stats.record_secret_match(".env*");
        assert_eq!(stats.excluded_secret, 2);
        assert_eq!(stats.total_excluded(), 7);
        assert_eq!(stats.secret_matches.get(".env*"), Some(&2));
    }
}
