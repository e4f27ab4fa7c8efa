use std::collections::HashSet;

use tracing::debug;

use crate::domain::{
    estimate_tokens, ApiContext, CodeLocation, ImportChain, QueryEmbedding, RankedFile,
    SearchMetadata, SearchResult, SearchWarning, Symbol,
};

/// Assemble the final result bundle and enforce the token budget.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    query_embedding: &QueryEmbedding,
    relevant_files: Vec<RankedFile>,
    code_locations: Vec<CodeLocation>,
    symbols: Vec<Symbol>,
    imports: Vec<ImportChain>,
    api_context: ApiContext,
    chunks_retrieved: usize,
    import_depth_reached: u32,
    query_time_ms: u64,
    token_budget: Option<u32>,
    mut warnings: Vec<SearchWarning>,
) -> SearchResult {
    let mut result = SearchResult {
        query: query_embedding.text.clone(),
        query_kind: query_embedding.kind,
        query_dimension: query_embedding.dimension,
        metadata: SearchMetadata {
            files_retrieved: relevant_files.len(),
            chunks_retrieved,
            chunks_after_dedup: code_locations.len(),
            symbols_resolved: symbols.len(),
            import_depth_reached,
            total_tokens: 0,
            query_time_ms,
        },
        relevant_files,
        code_locations,
        symbols,
        imports,
        api_context,
        warnings: Vec::new(),
    };

    result.metadata.total_tokens = total_tokens(&result);

    if let Some(budget) = token_budget {
        enforce_token_budget(&mut result, budget, &mut warnings);
    }

    result.warnings = warnings;
    result
}

fn total_tokens(result: &SearchResult) -> u32 {
    let chunk_tokens: u32 = result.code_locations.iter().map(|c| c.token_count).sum();
    let symbol_tokens: u32 = result
        .symbols
        .iter()
        .map(|s| estimate_tokens(s.definition()))
        .sum();
    let import_tokens: u32 = result
        .imports
        .iter()
        .flat_map(|chain| chain.files.iter())
        .map(|entry| estimate_tokens(&entry.file_path))
        .sum();
    chunk_tokens + symbol_tokens + import_tokens
}

/// Trim to the budget: lowest-similarity chunks first, then the deepest
/// import-chain leaves. Emits one partial_results warning when anything
/// was dropped.
fn enforce_token_budget(
    result: &mut SearchResult,
    budget: u32,
    warnings: &mut Vec<SearchWarning>,
) {
    let mut total = total_tokens(result);
    if total <= budget {
        return;
    }
    let mut dropped_chunks = 0usize;
    let mut dropped_imports = 0usize;

    while total > budget && !result.code_locations.is_empty() {
        // Lowest similarity sits last; assembly input is score-ordered.
        let lowest = result
            .code_locations
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.similarity
                    .partial_cmp(&b.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, _)| idx);
        let Some(idx) = lowest else { break };
        let removed = result.code_locations.remove(idx);
        total = total.saturating_sub(removed.token_count);
        dropped_chunks += 1;
    }

    while total > budget {
        // Deepest leaf across all chains.
        let deepest = result
            .imports
            .iter_mut()
            .filter(|chain| !chain.files.is_empty())
            .max_by_key(|chain| chain.files.iter().map(|f| f.depth).max().unwrap_or(0));
        let Some(chain) = deepest else { break };
        let max_depth = chain.files.iter().map(|f| f.depth).max().unwrap_or(0);
        let Some(pos) = chain.files.iter().rposition(|f| f.depth == max_depth) else {
            break;
        };
        let removed = chain.files.remove(pos);
        total = total.saturating_sub(estimate_tokens(&removed.file_path));
        dropped_imports += 1;
    }
    result.imports.retain(|chain| !chain.files.is_empty() || !chain.cycles.is_empty());

    debug!(
        "Token budget {} enforced: dropped {} chunks, {} import entries",
        budget, dropped_chunks, dropped_imports
    );
    warnings.push(SearchWarning::partial(format!(
        "Token budget {} exceeded; dropped {} chunks and {} import entries",
        budget, dropped_chunks, dropped_imports
    )));

    result.metadata.chunks_after_dedup = result.code_locations.len();
    result.metadata.total_tokens = total_tokens(result);
}

/// Post-filter variant: intersect every section with an explicit repo-id
/// set after assembly, recording how much was excluded.
pub fn post_filter_repositories(result: &mut SearchResult, repo_ids: &HashSet<String>) {
    let before = result.relevant_files.len() + result.code_locations.len() + result.symbols.len();

    result.relevant_files.retain(|f| repo_ids.contains(&f.repo_id));
    result.code_locations.retain(|c| repo_ids.contains(&c.repo_id));
    result.symbols.retain(|s| repo_ids.contains(s.repo_id()));
    let kept_files: HashSet<&String> = result
        .relevant_files
        .iter()
        .map(|f| &f.file_path)
        .collect();
    result.imports.retain(|chain| kept_files.contains(&chain.root_file));

    let after = result.relevant_files.len() + result.code_locations.len() + result.symbols.len();
    let excluded = before.saturating_sub(after);
    if excluded > 0 {
        result.warnings.push(SearchWarning::info(format!(
            "Repository post-filter excluded {} results",
            excluded
        )));
    }

    result.metadata.files_retrieved = result.relevant_files.len();
    result.metadata.chunks_after_dedup = result.code_locations.len();
    result.metadata.symbols_resolved = result.symbols.len();
    result.metadata.total_tokens = total_tokens(result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkMetadata, ChunkType, ImportChainEntry, QueryKind, WarningKind};

    fn query() -> QueryEmbedding {
        QueryEmbedding {
            text: "find the session store".to_string(),
            kind: QueryKind::NaturalLanguage,
            dimension: 8,
            generation_time_ms: 3,
            vector: vec![0.0; 8],
        }
    }

    fn location(id: &str, similarity: f32, tokens: u32) -> CodeLocation {
        CodeLocation {
            chunk_id: id.to_string(),
            repo_id: "repo-a".to_string(),
            file_path: "src/store.ts".to_string(),
            chunk_type: ChunkType::Function,
            start_line: 1,
            end_line: 10,
            content: "x".repeat((tokens * 4) as usize),
            token_count: tokens,
            similarity,
            metadata: ChunkMetadata::default(),
            service_id: None,
            merged_duplicates: Vec::new(),
        }
    }

    #[test]
    fn test_assemble_counts() {
        let result = assemble(
            &query(),
            vec![],
            vec![location("a", 0.9, 100), location("b", 0.8, 50)],
            vec![],
            vec![],
            ApiContext::default(),
            5,
            0,
            12,
            None,
            vec![],
        );
        assert_eq!(result.metadata.chunks_retrieved, 5);
        assert_eq!(result.metadata.chunks_after_dedup, 2);
        assert_eq!(result.metadata.total_tokens, 150);
        assert_eq!(result.metadata.query_time_ms, 12);
    }

    #[test]
    fn test_token_budget_drops_lowest_similarity_first() {
        let result = assemble(
            &query(),
            vec![],
            vec![
                location("keep", 0.95, 100),
                location("drop-first", 0.5, 100),
                location("drop-second", 0.7, 100),
            ],
            vec![],
            vec![],
            ApiContext::default(),
            3,
            0,
            1,
            Some(120),
            vec![],
        );
        assert_eq!(result.code_locations.len(), 1);
        assert_eq!(result.code_locations[0].chunk_id, "keep");
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::PartialResults));
        assert!(result.metadata.total_tokens <= 120);
    }

    #[test]
    fn test_token_budget_then_trims_deepest_import_leaves() {
        let chain = ImportChain {
            root_file: "src/a.ts".to_string(),
            files: vec![
                ImportChainEntry {
                    file_path: "src/b-shallow.ts".to_string(),
                    depth: 1,
                    imported_from: "src/a.ts".to_string(),
                },
                ImportChainEntry {
                    file_path: "src/c-deep-leaf-with-a-long-path-name.ts".to_string(),
                    depth: 2,
                    imported_from: "src/b-shallow.ts".to_string(),
                },
            ],
            depth_reached: 2,
            cycles: vec![],
        };
        let result = assemble(
            &query(),
            vec![],
            vec![],
            vec![],
            vec![chain],
            ApiContext::default(),
            0,
            2,
            1,
            Some(5),
            vec![],
        );
        let remaining: Vec<_> = result
            .imports
            .iter()
            .flat_map(|c| c.files.iter())
            .collect();
        assert!(remaining.iter().all(|f| f.depth == 1));
    }

    #[test]
    fn test_post_filter_excludes_and_warns() {
        let mut result = assemble(
            &query(),
            vec![RankedFile {
                repo_id: "repo-b".to_string(),
                file_path: "lib/x.ts".to_string(),
                similarity: 0.8,
                file_summary: None,
                language: "typescript".to_string(),
            }],
            vec![location("a", 0.9, 10)],
            vec![],
            vec![],
            ApiContext::default(),
            1,
            0,
            1,
            None,
            vec![],
        );

        let keep: HashSet<String> = ["repo-a".to_string()].into_iter().collect();
        post_filter_repositories(&mut result, &keep);

        assert!(result.relevant_files.is_empty());
        assert_eq!(result.code_locations.len(), 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::Info && w.message.contains("excluded 1")));
    }
}
