use std::collections::HashMap;

use tracing::debug;

use crate::domain::models::{cosine_similarity, ChunkHit, CodeLocation};

/// Near-duplicate suppression over retrieved chunks.
///
/// Chunks are compared within their file; a pair whose stored-vector
/// cosine similarity exceeds the threshold collapses into the higher
/// scored chunk, which records the merged ids so citations can be
/// combined.
pub fn deduplicate_chunks(hits: Vec<ChunkHit>, dedup_threshold: f32) -> Vec<CodeLocation> {
    // Highest retrieval score first so the keeper is always seen before
    // its duplicates.
    let mut ordered = hits;
    ordered.sort_by(|a, b| {
        b.location
            .similarity
            .partial_cmp(&a.location.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.location.chunk_id.cmp(&b.location.chunk_id))
    });

    let mut kept: Vec<ChunkHit> = Vec::with_capacity(ordered.len());
    // file_path -> indices into `kept`
    let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();
    let mut merged = 0usize;

    for hit in ordered {
        let candidates = by_file.entry(hit.location.file_path.clone()).or_default();
        let duplicate_of = candidates
            .iter()
            .copied()
            .find(|&idx| cosine_similarity(&kept[idx].vector, &hit.vector) > dedup_threshold);

        match duplicate_of {
            Some(idx) => {
                kept[idx]
                    .location
                    .merged_duplicates
                    .push(hit.location.chunk_id.clone());
                merged += 1;
            }
            None => {
                candidates.push(kept.len());
                kept.push(hit);
            }
        }
    }

    if merged > 0 {
        debug!("Deduplication merged {} near-duplicate chunks", merged);
    }
    kept.into_iter().map(|h| h.location).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ChunkMetadata, ChunkType};

    fn hit(id: &str, file: &str, similarity: f32, vector: Vec<f32>) -> ChunkHit {
        ChunkHit {
            location: CodeLocation {
                chunk_id: id.to_string(),
                repo_id: "r".to_string(),
                file_path: file.to_string(),
                chunk_type: ChunkType::Function,
                start_line: 1,
                end_line: 10,
                content: String::new(),
                token_count: 10,
                similarity,
                metadata: ChunkMetadata::default(),
                service_id: None,
                merged_duplicates: Vec::new(),
            },
            vector,
        }
    }

    #[test]
    fn test_near_duplicates_collapse_into_higher_score() {
        let hits = vec![
            hit("low", "a.ts", 0.80, vec![1.0, 0.0, 0.01]),
            hit("high", "a.ts", 0.95, vec![1.0, 0.0, 0.0]),
        ];
        let kept = deduplicate_chunks(hits, 0.9);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk_id, "high");
        assert_eq!(kept[0].merged_duplicates, vec!["low".to_string()]);
    }

    #[test]
    fn test_different_files_never_merge() {
        let hits = vec![
            hit("one", "a.ts", 0.9, vec![1.0, 0.0]),
            hit("two", "b.ts", 0.8, vec![1.0, 0.0]),
        ];
        assert_eq!(deduplicate_chunks(hits, 0.9).len(), 2);
    }

    #[test]
    fn test_dissimilar_chunks_survive() {
        let hits = vec![
            hit("one", "a.ts", 0.9, vec![1.0, 0.0]),
            hit("two", "a.ts", 0.8, vec![0.0, 1.0]),
        ];
        let kept = deduplicate_chunks(hits, 0.9);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.merged_duplicates.is_empty()));
    }

    #[test]
    fn test_output_sorted_by_similarity() {
        let hits = vec![
            hit("mid", "a.ts", 0.7, vec![0.0, 1.0]),
            hit("top", "b.ts", 0.99, vec![1.0, 0.0]),
            hit("low", "c.ts", 0.5, vec![0.5, 0.5]),
        ];
        let kept = deduplicate_chunks(hits, 0.9);
        let ids: Vec<_> = kept.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["top", "mid", "low"]);
    }
}
