//! Filesystem enumeration with ignore rules, secret filtering, encoding
//! fallback, and content hashing.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::{
    compute_file_hash, AtlasError, DiscoveredFile, IndexingOptions, Language, SecretFileDetector,
    WalkStats,
};

/// Directories never descended into: VCS metadata, build outputs,
/// dependency caches, framework caches.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "bower_components",
    "vendor",
    "target",
    "build",
    "dist",
    "out",
    "obj",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".next",
    ".nuxt",
    ".angular",
    ".turbo",
    ".cache",
    ".parcel-cache",
    ".gradle",
    ".idea",
    ".vscode",
    "coverage",
    ".nyc_output",
    "DerivedData",
    ".terraform",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "pdf", "zip", "tar", "gz", "bz2",
    "xz", "7z", "rar", "exe", "dll", "so", "dylib", "a", "o", "class", "jar", "war", "pyc", "pyo",
    "woff", "woff2", "ttf", "eot", "otf", "mp3", "mp4", "avi", "mov", "webm", "wasm", "db",
    "sqlite", "sqlite3", "bin", "dat", "ds_store",
];

/// Basename patterns for generated or vendored artifacts.
const GENERATED_PATTERNS: &[&str] = &[
    "*.min.js",
    "*.min.css",
    "*.bundle.js",
    "*.chunk.js",
    "*.map",
    "*.d.ts",
    "*_pb2.py",
    "*.pb.go",
    "*.generated.*",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "composer.lock",
    "Gemfile.lock",
    "poetry.lock",
    "go.sum",
];

pub struct FileWalker {
    include_markdown: bool,
    max_file_size: u32,
    secret_detector: SecretFileDetector,
}

impl FileWalker {
    pub fn new(options: &IndexingOptions) -> Self {
        Self {
            include_markdown: options.include_markdown,
            max_file_size: options.max_file_size,
            secret_detector: SecretFileDetector::default(),
        }
    }

    pub fn with_secret_detector(mut self, detector: SecretFileDetector) -> Self {
        self.secret_detector = detector;
        self
    }

    /// Depth-first traversal of `root`, yielding accepted files and a
    /// tally of everything skipped.
    pub fn walk(&self, root: &Path) -> Result<(Vec<DiscoveredFile>, WalkStats), AtlasError> {
        let gitignore = load_root_gitignore(root);
        let mut files = Vec::new();
        let mut stats = WalkStats::default();

        let walker = WalkDir::new(root).follow_links(false).into_iter();
        let mut iter = walker.filter_entry(|entry| {
            if entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy();
                !EXCLUDED_DIRS.contains(&name.as_ref())
            } else {
                true
            }
        });

        while let Some(entry) = iter.next() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    return Err(AtlasError::filesystem(path, e.to_string()));
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = relative_forward_slash(root, path);
            let basename = entry.file_name().to_string_lossy().to_string();

            if let Some(ref gi) = gitignore {
                if gi.matched(&relative, false).is_ignore() {
                    stats.excluded_ignored += 1;
                    continue;
                }
            }

            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if BINARY_EXTENSIONS.contains(&extension.as_str()) {
                stats.excluded_binary += 1;
                continue;
            }

            if matches_generated_pattern(&basename) {
                stats.excluded_generated += 1;
                continue;
            }

            if let Some(pattern) = self.secret_detector.matches(&basename) {
                debug!("Skipping secret-like file {} (pattern {})", relative, pattern);
                let pattern = pattern.to_string();
                stats.record_secret_match(&pattern);
                continue;
            }

            let language = Language::from_path(path);
            if language == Language::Unknown {
                stats.excluded_unknown += 1;
                continue;
            }
            if language == Language::Markdown
                && !self.include_markdown
                && !is_root_readme(&relative)
            {
                stats.excluded_markdown += 1;
                continue;
            }

            let raw = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to read {}: {}", relative, e);
                    stats.excluded_binary += 1;
                    continue;
                }
            };
            let content = match decode_text(&raw) {
                Some(text) => text,
                None => {
                    // Undecodable content is treated as binary.
                    stats.excluded_binary += 1;
                    continue;
                }
            };

            let line_count = content.split('\n').count() as u32;
            if line_count > self.max_file_size {
                debug!("Skipping oversized file {} ({} lines)", relative, line_count);
                stats.excluded_size += 1;
                continue;
            }

            let metadata = entry.metadata().map_err(|e| {
                AtlasError::filesystem(path.display().to_string(), e.to_string())
            })?;
            let mtime_secs = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            let file_hash = compute_file_hash(&content);
            stats.discovered += 1;
            files.push(DiscoveredFile {
                absolute_path: path.to_path_buf(),
                relative_path: relative,
                language,
                line_count,
                size_bytes: metadata.len(),
                mtime_secs,
                file_hash,
                content,
            });
        }

        debug!(
            "Walk of {} found {} files ({} excluded)",
            root.display(),
            stats.discovered,
            stats.total_excluded()
        );
        Ok((files, stats))
    }
}

fn load_root_gitignore(root: &Path) -> Option<Gitignore> {
    let gitignore_path = root.join(".gitignore");
    if !gitignore_path.exists() {
        return None;
    }
    let mut builder = GitignoreBuilder::new(root);
    builder.add(&gitignore_path);
    match builder.build() {
        Ok(gi) => Some(gi),
        Err(e) => {
            warn!("Failed to parse {}: {}", gitignore_path.display(), e);
            None
        }
    }
}

fn relative_forward_slash(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn is_root_readme(relative: &str) -> bool {
    !relative.contains('/') && relative.to_lowercase().starts_with("readme")
}

fn matches_generated_pattern(basename: &str) -> bool {
    GENERATED_PATTERNS.iter().any(|pattern| glob_match(pattern, basename))
}

/// Minimal `*`-only glob match over basenames.
fn glob_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }
    let mut rest = name;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
    }
    true
}

/// UTF-8 first, then BOM-sniffed UTF-16, then Latin-1. Returns None when
/// the bytes do not decode as text at all (NUL-dense content).
fn decode_text(raw: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(raw) {
        return Some(text.strip_prefix('\u{feff}').unwrap_or(text).to_string());
    }
    if let Some((encoding, _)) = encoding_rs::Encoding::for_bom(raw) {
        let (text, _, had_errors) = encoding.decode(raw);
        if !had_errors {
            return Some(text.into_owned());
        }
    }
    // NUL bytes in non-UTF-16 content mean binary, not mojibake.
    if raw.contains(&0) {
        return None;
    }
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(raw);
    Some(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.min.js", "app.min.js"));
        assert!(glob_match("*.generated.*", "schema.generated.ts"));
        assert!(glob_match("package-lock.json", "package-lock.json"));
        assert!(!glob_match("*.min.js", "app.js"));
        assert!(!glob_match("package-lock.json", "package.json"));
    }

    #[test]
    fn test_root_readme_detection() {
        assert!(is_root_readme("README.md"));
        assert!(is_root_readme("readme.markdown"));
        assert!(!is_root_readme("docs/README.md"));
    }

    #[test]
    fn test_decode_utf8_strips_bom() {
        let mut raw = vec![0xEF, 0xBB, 0xBF];
        raw.extend_from_slice(b"hello");
        assert_eq!(decode_text(&raw).as_deref(), Some("hello"));
    }

    #[test]
    fn test_decode_utf16_le() {
        let mut raw = vec![0xFF, 0xFE];
        for unit in "let x = 1;".encode_utf16() {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&raw).as_deref(), Some("let x = 1;"));
    }

    #[test]
    fn test_decode_latin1_fallback() {
        let raw = vec![b'c', b'a', b'f', 0xE9];
        assert_eq!(decode_text(&raw).as_deref(), Some("café"));
    }

    #[test]
    fn test_nul_dense_content_is_binary() {
        assert_eq!(decode_text(&[0x00, 0x01, 0x02, 0xFF]), None);
    }

    #[test]
    fn test_walk_respects_gitignore_and_excluded_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::create_dir_all(root.join("logs")).unwrap();
        std::fs::write(root.join(".gitignore"), "logs/\n").unwrap();
        std::fs::write(root.join("src/index.ts"), "export const x = 1;\n").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "module.exports = {};\n").unwrap();
        std::fs::write(root.join("logs/app.ts"), "ignored\n").unwrap();

        let walker = FileWalker::new(&IndexingOptions::default());
        let (files, stats) = walker.walk(root).expect("walk");

        assert!(files.iter().any(|f| f.relative_path == "src/index.ts"));
        assert!(!files.iter().any(|f| f.relative_path.contains("node_modules")));
        assert!(!files.iter().any(|f| f.relative_path.contains("logs")));
        assert_eq!(stats.excluded_ignored, 1);
    }

    #[test]
    fn test_walk_skips_secret_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        std::fs::write(root.join(".env"), "API_KEY=x\n").unwrap();
        std::fs::write(root.join(".env.example"), "API_KEY=\n").unwrap();
        std::fs::write(root.join("main.ts"), "const a = 1;\n").unwrap();

        let walker = FileWalker::new(&IndexingOptions::default());
        let (files, stats) = walker.walk(root).expect("walk");

        assert_eq!(stats.excluded_secret, 1);
        assert!(files.iter().all(|f| f.relative_path != ".env"));
    }

    #[test]
    fn test_walk_skips_oversized_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let big = "x\n".repeat(6000);
        std::fs::write(root.join("big.ts"), big).unwrap();
        std::fs::write(root.join("small.ts"), "const a = 1;\n").unwrap();

        let walker = FileWalker::new(&IndexingOptions::default());
        let (files, stats) = walker.walk(root).expect("walk");

        assert_eq!(files.len(), 1);
        assert_eq!(stats.excluded_size, 1);
    }

    #[test]
    fn test_markdown_only_with_flag_or_root_readme() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("README.md"), "# readme\n").unwrap();
        std::fs::write(root.join("docs/guide.md"), "# guide\n").unwrap();

        let walker = FileWalker::new(&IndexingOptions::default());
        let (files, stats) = walker.walk(root).expect("walk");
        assert!(files.iter().any(|f| f.relative_path == "README.md"));
        assert!(!files.iter().any(|f| f.relative_path == "docs/guide.md"));
        assert_eq!(stats.excluded_markdown, 1);

        let mut options = IndexingOptions::default();
        options.include_markdown = true;
        let walker = FileWalker::new(&options);
        let (files, _) = walker.walk(root).expect("walk");
        assert!(files.iter().any(|f| f.relative_path == "docs/guide.md"));
    }
}
