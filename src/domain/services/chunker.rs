use std::collections::BTreeSet;

use tracing::debug;

use crate::domain::models::{
    ChunkMetadata, ChunkType, CodeChunk, Language, NodeKind, ParseResult, CHUNK_SIZE_MAX,
    CHUNK_SIZE_MIN, LARGE_FILE_LINES, VERY_LARGE_FILE_LINES,
};

/// Minimum line span for a function or class chunk.
const MIN_NODE_LINES: u32 = 10;
/// Line count of the file-summary chunk (capped by the file length).
const SUMMARY_LINES: u32 = 100;
/// Minimum span of an import block chunk.
const MIN_IMPORT_SPAN: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct ChunkingOutcome {
    pub chunks: Vec<CodeChunk>,
    pub is_large_file: bool,
    pub warnings: Vec<String>,
}

/// Size-tiered semantic chunking policy.
///
/// Normal files get a file-summary chunk, an import block, function and
/// class chunks, and block chunks over the uncovered remainder. Files
/// above [`VERY_LARGE_FILE_LINES`] get structure-only chunking: the
/// summary plus a synthetic exports block.
pub struct Chunker {
    chunk_size_min: u32,
    chunk_size_max: u32,
}

impl Chunker {
    pub fn new(chunk_size_min: u32, chunk_size_max: u32) -> Self {
        Self {
            chunk_size_min,
            chunk_size_max,
        }
    }

    pub fn create_chunks(
        &self,
        repo_id: &str,
        file_path: &str,
        language: Language,
        content: &str,
        parse: &ParseResult,
    ) -> ChunkingOutcome {
        let lines: Vec<&str> = content.split('\n').collect();
        let line_count = lines.len() as u32;

        if line_count > VERY_LARGE_FILE_LINES {
            return self.structure_only(repo_id, file_path, language, &lines, parse);
        }

        let mut outcome = ChunkingOutcome::default();
        if line_count >= LARGE_FILE_LINES {
            outcome.is_large_file = true;
            outcome.warnings.push(format!(
                "{}: {} lines, section-based chunking applied",
                file_path, line_count
            ));
        }

        outcome
            .chunks
            .push(self.summary_chunk(repo_id, file_path, language, &lines, false));

        // Lines covered by import/function/class chunks; the summary is
        // excluded from coverage on purpose.
        let mut covered: BTreeSet<u32> = BTreeSet::new();

        if let Some(chunk) = self.import_block_chunk(repo_id, file_path, &lines, parse) {
            for line in chunk.start_line()..=chunk.end_line() {
                covered.insert(line);
            }
            outcome.chunks.push(chunk);
        }

        for node in parse.nodes.iter() {
            let (chunk_type, min_lines) = match node.kind {
                k if k.is_callable() => (ChunkType::Function, MIN_NODE_LINES),
                NodeKind::Class | NodeKind::Interface => (ChunkType::Class, MIN_NODE_LINES),
                _ => continue,
            };

            if node.line_count() < min_lines {
                continue;
            }
            // Nested or fallback-synthesized spans can intersect an
            // already-selected chunk; the disjointness invariant wins.
            if (node.start_line..=node.end_line).any(|line| covered.contains(&line)) {
                continue;
            }
            if node.line_count() > self.chunk_size_max {
                outcome.warnings.push(format!(
                    "{}: {} '{}' spans {} lines (over {})",
                    file_path,
                    chunk_type,
                    node.name,
                    node.line_count(),
                    self.chunk_size_max
                ));
            }

            let mut metadata = ChunkMetadata::default();
            match chunk_type {
                ChunkType::Function => metadata.function_names.push(node.name.clone()),
                ChunkType::Class => {
                    metadata.class_names.push(node.name.clone());
                    metadata.method_names = node.method_names();
                }
                _ => {}
            }

            let chunk = CodeChunk::new(
                file_path,
                repo_id,
                chunk_type,
                node.start_line,
                node.end_line,
                slice_lines(&lines, node.start_line, node.end_line),
            )
            .with_metadata(metadata);

            for line in node.start_line..=node.end_line {
                covered.insert(line);
            }
            outcome.chunks.push(chunk);
        }

        for (start, end) in uncovered_runs(line_count, &covered) {
            if end - start + 1 < self.chunk_size_min {
                continue;
            }
            let text = slice_lines(&lines, start, end);
            if text.trim().is_empty() {
                continue;
            }
            outcome.chunks.push(CodeChunk::new(
                file_path,
                repo_id,
                ChunkType::Block,
                start,
                end,
                text,
            ));
        }

        debug!(
            "Chunked {} into {} chunks ({} warnings)",
            file_path,
            outcome.chunks.len(),
            outcome.warnings.len()
        );
        outcome
    }

    fn summary_chunk(
        &self,
        repo_id: &str,
        file_path: &str,
        language: Language,
        lines: &[&str],
        large_file: bool,
    ) -> CodeChunk {
        let line_count = lines.len() as u32;
        let end = SUMMARY_LINES.min(line_count).max(1);
        let metadata = ChunkMetadata {
            language: Some(language.as_str().to_string()),
            total_lines: Some(line_count),
            large_file,
            ..Default::default()
        };
        CodeChunk::new(
            file_path,
            repo_id,
            ChunkType::FileSummary,
            1,
            end,
            slice_lines(lines, 1, end),
        )
        .with_metadata(metadata)
    }

    fn import_block_chunk(
        &self,
        repo_id: &str,
        file_path: &str,
        lines: &[&str],
        parse: &ParseResult,
    ) -> Option<CodeChunk> {
        if parse.imports.is_empty() {
            return None;
        }
        let min_line = parse.imports.iter().map(|i| i.line_number).min()?;
        let max_line = parse.imports.iter().map(|i| i.line_number).max()?;
        if max_line - min_line + 1 < MIN_IMPORT_SPAN {
            return None;
        }

        let mut dependencies: Vec<String> = parse
            .imports
            .iter()
            .map(|i| i.source.clone())
            .filter(|s| !s.is_empty())
            .collect();
        dependencies.dedup();

        let metadata = ChunkMetadata {
            dependencies,
            ..Default::default()
        };
        Some(
            CodeChunk::new(
                file_path,
                repo_id,
                ChunkType::ImportBlock,
                min_line,
                max_line,
                slice_lines(lines, min_line, max_line),
            )
            .with_metadata(metadata),
        )
    }

    /// Structure-only chunking for files above the very-large threshold:
    /// the summary chunk plus one synthetic exports block.
    fn structure_only(
        &self,
        repo_id: &str,
        file_path: &str,
        language: Language,
        lines: &[&str],
        parse: &ParseResult,
    ) -> ChunkingOutcome {
        let mut outcome = ChunkingOutcome {
            is_large_file: true,
            ..Default::default()
        };
        outcome.warnings.push(format!(
            "{}: {} lines, structure-only indexing",
            file_path,
            lines.len()
        ));

        outcome
            .chunks
            .push(self.summary_chunk(repo_id, file_path, language, lines, true));

        let export_lines: Vec<&str> = parse
            .exports
            .iter()
            .filter_map(|e| lines.get(e.line_number.saturating_sub(1) as usize))
            .copied()
            .collect();
        if !export_lines.is_empty() {
            let first = parse.exports.iter().map(|e| e.line_number).min().unwrap_or(1);
            let last = parse
                .exports
                .iter()
                .map(|e| e.line_number)
                .max()
                .unwrap_or(first);
            let metadata = ChunkMetadata {
                exported_symbols: parse.exports.iter().map(|e| e.name.clone()).collect(),
                large_file: true,
                ..Default::default()
            };
            outcome.chunks.push(
                CodeChunk::new(
                    file_path,
                    repo_id,
                    ChunkType::Block,
                    first,
                    last,
                    export_lines.join("\n"),
                )
                .with_metadata(metadata),
            );
        }

        outcome
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(CHUNK_SIZE_MIN, CHUNK_SIZE_MAX)
    }
}

/// 1-indexed inclusive line slice, newline-joined.
fn slice_lines(lines: &[&str], start: u32, end: u32) -> String {
    let start = start.saturating_sub(1) as usize;
    let end = (end as usize).min(lines.len());
    lines[start..end].join("\n")
}

/// Maximal contiguous runs of lines in [1, line_count] absent from
/// `covered`, as (start, end) inclusive pairs.
fn uncovered_runs(line_count: u32, covered: &BTreeSet<u32>) -> Vec<(u32, u32)> {
    let mut runs = Vec::new();
    let mut run_start: Option<u32> = None;
    for line in 1..=line_count {
        if covered.contains(&line) {
            if let Some(start) = run_start.take() {
                runs.push((start, line - 1));
            }
        } else if run_start.is_none() {
            run_start = Some(line);
        }
    }
    if let Some(start) = run_start {
        runs.push((start, line_count));
    }
    runs
}
