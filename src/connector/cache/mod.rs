//! Process-wide LRU caches with TTL expiry. Lookups never suspend; the
//! interior mutex is parking_lot's, held only for map operations.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::{QueryKind, SearchResult};

/// Capacity of the query-embedding cache.
pub const QUERY_CACHE_CAPACITY: usize = 500;
/// Time-to-live for cached query embeddings.
pub const QUERY_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const RESULT_CACHE_CAPACITY: usize = 200;
const ENDPOINT_CACHE_CAPACITY: usize = 2000;

/// LRU cache whose entries expire after a fixed TTL.
pub struct TtlLruCache<K: Hash + Eq + Clone, V: Clone> {
    inner: Mutex<LruCache<K, (Instant, V)>>,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlLruCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("non-zero capacity");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock();
        match cache.get(key) {
            Some((inserted, value)) if inserted.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(key, (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Remove every entry failing the predicate over (key, value).
    pub fn retain<F: Fn(&K, &V) -> bool>(&self, keep: F) {
        let mut cache = self.inner.lock();
        let stale: Vec<K> = cache
            .iter()
            .filter_map(|(k, (_, v))| if keep(k, v) { None } else { Some(k.clone()) })
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }
}

/// Cached query embedding: vector plus its classification.
#[derive(Debug, Clone)]
pub struct CachedQueryEmbedding {
    pub vector: Vec<f32>,
    pub kind: QueryKind,
}

/// Query-text → embedding cache (capacity 500, TTL 30 minutes). A hit
/// must present as sub-50-ms generation.
pub struct QueryEmbeddingCache {
    cache: TtlLruCache<(String, &'static str), CachedQueryEmbedding>,
}

impl QueryEmbeddingCache {
    pub fn new() -> Self {
        Self {
            cache: TtlLruCache::new(QUERY_CACHE_CAPACITY, QUERY_CACHE_TTL),
        }
    }

    pub fn get(&self, query: &str, kind: QueryKind) -> Option<CachedQueryEmbedding> {
        let hit = self.cache.get(&(query.to_string(), kind.as_str()));
        if hit.is_some() {
            debug!("Query embedding cache hit");
        }
        hit
    }

    pub fn put(&self, query: &str, kind: QueryKind, vector: Vec<f32>) {
        self.cache.put(
            (query.to_string(), kind.as_str()),
            CachedQueryEmbedding { vector, kind },
        );
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for QueryEmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Search-result cache keyed by (query, scope fingerprint). Values carry
/// the scoped repo ids so index and delete operations can invalidate.
pub struct SearchResultCache {
    cache: TtlLruCache<String, (Vec<String>, SearchResult)>,
}

impl SearchResultCache {
    pub fn new() -> Self {
        Self {
            cache: TtlLruCache::new(RESULT_CACHE_CAPACITY, QUERY_CACHE_TTL),
        }
    }

    pub fn key(query: &str, repo_ids: &[String], options_fingerprint: &str) -> String {
        format!("{}|{}|{}", query, repo_ids.join(","), options_fingerprint)
    }

    pub fn get(&self, key: &str) -> Option<SearchResult> {
        self.cache.get(&key.to_string()).map(|(_, result)| result)
    }

    pub fn put(&self, key: String, repo_ids: Vec<String>, result: SearchResult) {
        self.cache.put(key, (repo_ids, result));
    }

    /// Drop every cached result whose scope included the repository.
    pub fn invalidate_repository(&self, repo_id: &str) {
        self.cache
            .retain(|_, (repo_ids, _)| !repo_ids.iter().any(|r| r == repo_id));
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for SearchResultCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Memoized outbound-call extraction per chunk id, shared by the API
/// enricher across queries.
pub struct EndpointCache {
    cache: TtlLruCache<String, Vec<(String, String)>>,
}

impl EndpointCache {
    pub fn new() -> Self {
        Self {
            cache: TtlLruCache::new(ENDPOINT_CACHE_CAPACITY, QUERY_CACHE_TTL),
        }
    }

    pub fn get(&self, chunk_id: &str) -> Option<Vec<(String, String)>> {
        self.cache.get(&chunk_id.to_string())
    }

    pub fn put(&self, chunk_id: &str, calls: Vec<(String, String)>) {
        self.cache.put(chunk_id.to_string(), calls);
    }
}

impl Default for EndpointCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_expiry() {
        let cache: TtlLruCache<String, u32> =
            TtlLruCache::new(10, Duration::from_millis(0));
        cache.put("k".to_string(), 1);
        // Zero TTL: the entry is already expired.
        assert_eq!(cache.get(&"k".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let cache: TtlLruCache<u32, u32> = TtlLruCache::new(2, Duration::from_secs(60));
        cache.put(1, 1);
        cache.put(2, 2);
        cache.put(3, 3);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&3), Some(3));
    }

    #[test]
    fn test_query_cache_round_trip() {
        let cache = QueryEmbeddingCache::new();
        assert!(cache.get("q", QueryKind::NaturalLanguage).is_none());
        cache.put("q", QueryKind::NaturalLanguage, vec![0.1, 0.2]);
        let hit = cache.get("q", QueryKind::NaturalLanguage).expect("hit");
        assert_eq!(hit.vector, vec![0.1, 0.2]);
        // Classification is part of the key.
        assert!(cache.get("q", QueryKind::CodeSnippet).is_none());
    }

    #[test]
    fn test_result_cache_invalidation_by_repo() {
        let cache = SearchResultCache::new();
        let result = SearchResult::empty("q", QueryKind::NaturalLanguage, 8);
        cache.put(
            "key-1".to_string(),
            vec!["repo-a".to_string()],
            result.clone(),
        );
        cache.put("key-2".to_string(), vec!["repo-b".to_string()], result);
        assert_eq!(cache.len(), 2);

        cache.invalidate_repository("repo-a");
        assert!(cache.get("key-1").is_none());
        assert!(cache.get("key-2").is_some());
    }
}
