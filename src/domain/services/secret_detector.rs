use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::domain::error::AtlasError;

/// Built-in filename patterns that look like credential material.
pub const DEFAULT_SECRET_PATTERNS: &[&str] = &[
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "*.p12",
    "*.pfx",
    "*.jks",
    "*.keystore",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
    "*.credentials",
    "credentials.json",
    "secrets.*",
    "*.secret",
    "htpasswd",
    ".netrc",
    ".npmrc",
    ".pypirc",
];

/// Filenames that match a secret pattern but are safe to index.
pub const DEFAULT_ALLOWLIST: &[&str] = &[".env.example", ".env.sample", ".env.template", "*.pub"];

/// Matches basenames against secret-file patterns. Patterns use `*` and
/// `?` only; the allowlist wins over any match.
pub struct SecretFileDetector {
    patterns: Vec<String>,
    matcher: GlobSet,
    allowlist: GlobSet,
}

impl SecretFileDetector {
    pub fn new(user_patterns: &[String], user_allowlist: &[String]) -> Result<Self, AtlasError> {
        let mut patterns: Vec<String> = DEFAULT_SECRET_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        patterns.extend(user_patterns.iter().cloned());

        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            validate_pattern(pattern)?;
            let glob = Glob::new(pattern)
                .map_err(|e| AtlasError::config(format!("Bad secret pattern '{}': {}", pattern, e)))?;
            builder.add(glob);
        }
        let matcher = builder
            .build()
            .map_err(|e| AtlasError::config(format!("Secret pattern set: {}", e)))?;

        let mut allow_builder = GlobSetBuilder::new();
        for pattern in DEFAULT_ALLOWLIST
            .iter()
            .map(|p| p.to_string())
            .chain(user_allowlist.iter().cloned())
        {
            validate_pattern(&pattern)?;
            let glob = Glob::new(&pattern)
                .map_err(|e| AtlasError::config(format!("Bad allowlist pattern '{}': {}", pattern, e)))?;
            allow_builder.add(glob);
        }
        let allowlist = allow_builder
            .build()
            .map_err(|e| AtlasError::config(format!("Secret allowlist: {}", e)))?;

        Ok(Self {
            patterns,
            matcher,
            allowlist,
        })
    }

    /// Returns the matched pattern for a basename, or None when the file
    /// is clean or allowlisted.
    pub fn matches(&self, basename: &str) -> Option<&str> {
        if self.allowlist.is_match(basename) {
            return None;
        }
        self.matcher
            .matches(basename)
            .first()
            .map(|&idx| self.patterns[idx].as_str())
    }
}

impl Default for SecretFileDetector {
    fn default() -> Self {
        Self::new(&[], &[]).expect("default secret patterns are valid")
    }
}

/// Only `*` and `?` wildcards are recognized; reject glob syntax the
/// matcher would silently interpret differently.
fn validate_pattern(pattern: &str) -> Result<(), AtlasError> {
    if pattern.contains('[') || pattern.contains('{') || pattern.contains('/') {
        return Err(AtlasError::config(format!(
            "Secret pattern '{}' may only use '*' and '?' wildcards",
            pattern
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_match_common_secrets() {
        let detector = SecretFileDetector::default();
        assert_eq!(detector.matches(".env"), Some(".env"));
        assert_eq!(detector.matches(".env.production"), Some(".env.*"));
        assert_eq!(detector.matches("server.pem"), Some("*.pem"));
        assert_eq!(detector.matches("id_rsa"), Some("id_rsa"));
        assert_eq!(detector.matches("main.ts"), None);
    }

    #[test]
    fn test_allowlist_wins() {
        let detector = SecretFileDetector::default();
        assert_eq!(detector.matches(".env.example"), None);
        assert_eq!(detector.matches("id_rsa.pub"), None);
    }

    #[test]
    fn test_user_patterns_extend_defaults() {
        let detector =
            SecretFileDetector::new(&["internal-*.yaml".to_string()], &[]).expect("detector");
        assert_eq!(detector.matches("internal-prod.yaml"), Some("internal-*.yaml"));
    }

    #[test]
    fn test_user_allowlist_extends_defaults() {
        let detector =
            SecretFileDetector::new(&[], &[".env.local".to_string()]).expect("detector");
        assert_eq!(detector.matches(".env.local"), None);
        assert_eq!(detector.matches(".env.prod"), Some(".env.*"));
    }

    #[test]
    fn test_rich_glob_syntax_rejected() {
        assert!(SecretFileDetector::new(&["[ab].key".to_string()], &[]).is_err());
        assert!(SecretFileDetector::new(&["a/{b,c}".to_string()], &[]).is_err());
    }
}
