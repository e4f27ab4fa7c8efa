use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::models::{ChunkType, CodeChunk, NodeKind, ParseResult};

use super::api_endpoints::extract_api_endpoints;

static ASYNC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(async|await)\b").expect("async pattern"));
static LOOP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(for|while|do|loop)\b").expect("loop pattern"));
static CONDITIONAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(if|else|switch|match|case)\b").expect("conditional pattern"));

/// Context shared across all chunks of one file when enriching metadata.
pub struct MetadataContext<'a> {
    pub parse: &'a ParseResult,
    /// Names of workspace packages in the repository, for the
    /// internal-import tri-state.
    pub workspace_packages: &'a [String],
    pub detect_api_endpoints: bool,
}

/// Enrich a chunk's metadata from the file-level parse result and the
/// chunk's own source text.
pub fn enrich_chunk_metadata(chunk: &mut CodeChunk, ctx: &MetadataContext<'_>) {
    let start = chunk.start_line();
    let end = chunk.end_line();
    let chunk_type = chunk.chunk_type();
    let content = chunk.content().to_string();

    let meta = chunk.metadata_mut();

    // Declarations within the chunk's line range, kept in file order.
    for node in ctx.parse.all_nodes() {
        if node.start_line < start || node.start_line > end {
            continue;
        }
        match node.kind {
            NodeKind::Function | NodeKind::Method => {
                if !meta.function_names.contains(&node.name) {
                    meta.function_names.push(node.name.clone());
                }
            }
            NodeKind::Class | NodeKind::Interface => {
                if !meta.class_names.contains(&node.name) {
                    meta.class_names.push(node.name.clone());
                }
            }
            _ => {}
        }
        meta.complexity += node.complexity;
    }
    if meta.complexity == 0 {
        meta.complexity = 1;
    }

    meta.imported_symbols = ctx
        .parse
        .imports
        .iter()
        .flat_map(|i| i.symbols.iter().cloned())
        .collect();
    meta.exported_symbols = ctx.parse.exports.iter().map(|e| e.name.clone()).collect();

    let mut dependencies: Vec<String> = ctx
        .parse
        .imports
        .iter()
        .map(|i| i.source.clone())
        .filter(|s| !s.is_empty())
        .collect();
    dependencies.sort();
    dependencies.dedup();
    meta.dependencies = dependencies;

    meta.has_async = ASYNC_PATTERN.is_match(&content);
    meta.has_loops = LOOP_PATTERN.is_match(&content);
    meta.has_conditionals = CONDITIONAL_PATTERN.is_match(&content);
    meta.is_internal_import = classify_internal_imports(ctx);

    if ctx.detect_api_endpoints && chunk_type != ChunkType::FileSummary {
        meta.api_endpoints = extract_api_endpoints(&content);
    }
}

/// Tri-state internal-import classification: `None` when the file has no
/// imports; `Some(true)` when any import is a workspace package, a
/// relative path, or an `@`-scoped specifier; `Some(false)` otherwise.
fn classify_internal_imports(ctx: &MetadataContext<'_>) -> Option<bool> {
    if ctx.parse.imports.is_empty() {
        return None;
    }
    let any_internal = ctx.parse.imports.iter().any(|import| {
        import.is_relative()
            || import.source.starts_with('@')
            || ctx
                .workspace_packages
                .iter()
                .any(|pkg| import.source == *pkg || import.source.starts_with(&format!("{}/", pkg)))
    });
    Some(any_internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ImportInfo, ParsedNode};

    fn ctx_with<'a>(parse: &'a ParseResult, packages: &'a [String]) -> MetadataContext<'a> {
        MetadataContext {
            parse,
            workspace_packages: packages,
            detect_api_endpoints: true,
        }
    }

    #[test]
    fn test_enrich_collects_names_in_range() {
        let parse = ParseResult {
            nodes: vec![
                ParsedNode::new(NodeKind::Function, "inRange", 10, 20, "fn"),
                ParsedNode::new(NodeKind::Function, "outOfRange", 80, 95, "fn"),
            ],
            ..Default::default()
        };
        let mut chunk = CodeChunk::new("a.ts", "r", ChunkType::Block, 5, 30, "plain text");
        enrich_chunk_metadata(&mut chunk, &ctx_with(&parse, &[]));
        assert_eq!(chunk.metadata().function_names, vec!["inRange".to_string()]);
    }

    #[test]
    fn test_complexity_floor_is_one() {
        let parse = ParseResult::default();
        let mut chunk = CodeChunk::new("a.ts", "r", ChunkType::Block, 1, 5, "x = 1");
        enrich_chunk_metadata(&mut chunk, &ctx_with(&parse, &[]));
        assert_eq!(chunk.metadata().complexity, 1);
    }

    #[test]
    fn test_flag_detection() {
        let parse = ParseResult::default();
        let mut chunk = CodeChunk::new(
            "a.ts",
            "r",
            ChunkType::Function,
            1,
            5,
            "async function f() { for (;;) { if (x) await g(); } }",
        );
        enrich_chunk_metadata(&mut chunk, &ctx_with(&parse, &[]));
        let meta = chunk.metadata();
        assert!(meta.has_async);
        assert!(meta.has_loops);
        assert!(meta.has_conditionals);
    }

    #[test]
    fn test_internal_import_tri_state() {
        let packages = vec!["@acme/core".to_string()];

        let none = ParseResult::default();
        let mut chunk = CodeChunk::new("a.ts", "r", ChunkType::Block, 1, 2, "");
        enrich_chunk_metadata(&mut chunk, &ctx_with(&none, &packages));
        assert_eq!(chunk.metadata().is_internal_import, None);

        let external = ParseResult {
            imports: vec![ImportInfo::new("express", 1)],
            ..Default::default()
        };
        let mut chunk = CodeChunk::new("a.ts", "r", ChunkType::Block, 1, 2, "");
        enrich_chunk_metadata(&mut chunk, &ctx_with(&external, &[]));
        assert_eq!(chunk.metadata().is_internal_import, Some(false));

        let relative = ParseResult {
            imports: vec![ImportInfo::new("./utils", 1)],
            ..Default::default()
        };
        let mut chunk = CodeChunk::new("a.ts", "r", ChunkType::Block, 1, 2, "");
        enrich_chunk_metadata(&mut chunk, &ctx_with(&relative, &[]));
        assert_eq!(chunk.metadata().is_internal_import, Some(true));

        let scoped = ParseResult {
            imports: vec![ImportInfo::new("@acme/core/client", 1)],
            ..Default::default()
        };
        let mut chunk = CodeChunk::new("a.ts", "r", ChunkType::Block, 1, 2, "");
        enrich_chunk_metadata(&mut chunk, &ctx_with(&scoped, &packages));
        assert_eq!(chunk.metadata().is_internal_import, Some(true));
    }

    #[test]
    fn test_summary_chunks_skip_endpoint_extraction() {
        let parse = ParseResult::default();
        let src = "app.get('/users', list);";
        let mut summary = CodeChunk::new("a.ts", "r", ChunkType::FileSummary, 1, 1, src);
        enrich_chunk_metadata(&mut summary, &ctx_with(&parse, &[]));
        assert!(summary.metadata().api_endpoints.is_empty());

        let mut block = CodeChunk::new("a.ts", "r", ChunkType::Block, 1, 1, src);
        enrich_chunk_metadata(&mut block, &ctx_with(&parse, &[]));
        assert_eq!(block.metadata().api_endpoints.len(), 1);
    }
}
