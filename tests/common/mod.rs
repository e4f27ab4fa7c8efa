//! Shared test helpers: an in-memory store wired to a deterministic
//! keyword-projection embedder so vector-search stages behave
//! predictably without a model host.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use codeatlas::{
    build_enhanced_text, AtlasError, CatalogRepository, CodeChunk, DuckdbStorage, Embedding,
    EmbeddingConfig, EmbeddingService, IndexRepositoryUseCase, QueryEmbeddingCache,
    RuleBasedSummaryService, SearchCodeUseCase, SearchResultCache, TreeSitterParser,
    VectorRepository,
};

pub const TEST_DIMENSION: usize = 8;

const KEYWORDS: [&str; 6] = ["sum", "user", "server", "store", "billing", "parse"];

/// Projects text onto keyword-count axes, so texts sharing vocabulary
/// land near each other in embedding space.
pub struct KeywordEmbeddingService {
    config: EmbeddingConfig,
}

impl KeywordEmbeddingService {
    pub fn new() -> Self {
        Self {
            config: EmbeddingConfig::new("keyword-projection", TEST_DIMENSION),
        }
    }

    fn project(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector = vec![0.0f32; TEST_DIMENSION];
        for (i, keyword) in KEYWORDS.iter().enumerate() {
            vector[i] = lower.matches(keyword).count() as f32;
        }
        // Tail component keeps keyword-free texts off the origin.
        vector[TEST_DIMENSION - 1] = 0.05;
        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        vector.iter_mut().for_each(|x| *x /= magnitude);
        vector
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbeddingService {
    async fn embed_chunk(
        &self,
        chunk: &CodeChunk,
        file_summary: Option<&str>,
    ) -> Result<Embedding, AtlasError> {
        let enhanced = build_enhanced_text(chunk, file_summary);
        Ok(Embedding::new(
            chunk.id(),
            self.project(&enhanced),
            self.config.model_name(),
            0,
            enhanced,
        ))
    }

    async fn embed_chunks(
        &self,
        chunks: &[CodeChunk],
        file_summary: Option<&str>,
    ) -> Result<Vec<Embedding>, AtlasError> {
        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            embeddings.push(self.embed_chunk(chunk, file_summary).await?);
        }
        Ok(embeddings)
    }

    async fn embed_text(&self, id: &str, text: &str) -> Result<Embedding, AtlasError> {
        Ok(Embedding::new(
            id,
            self.project(text),
            self.config.model_name(),
            0,
            text,
        ))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AtlasError> {
        Ok(self.project(query))
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

pub struct TestEnv {
    pub catalog: Arc<dyn CatalogRepository>,
    pub vectors: Arc<dyn VectorRepository>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub query_cache: Arc<QueryEmbeddingCache>,
    pub result_cache: Arc<SearchResultCache>,
}

impl TestEnv {
    pub fn new() -> Self {
        let storage = DuckdbStorage::in_memory(TEST_DIMENSION).expect("in-memory storage");
        Self {
            catalog: Arc::new(storage.catalog()),
            vectors: Arc::new(storage.vectors()),
            embedder: Arc::new(KeywordEmbeddingService::new()),
            query_cache: Arc::new(QueryEmbeddingCache::new()),
            result_cache: Arc::new(SearchResultCache::new()),
        }
    }

    pub fn index_use_case(&self) -> IndexRepositoryUseCase {
        IndexRepositoryUseCase::new(
            self.catalog.clone(),
            self.vectors.clone(),
            Arc::new(TreeSitterParser::new()),
            self.embedder.clone(),
            Arc::new(RuleBasedSummaryService::new()),
        )
        .with_result_cache(self.result_cache.clone())
    }

    pub fn search_use_case(&self) -> SearchCodeUseCase {
        SearchCodeUseCase::new(
            self.catalog.clone(),
            self.vectors.clone(),
            self.embedder.clone(),
            self.query_cache.clone(),
            self.result_cache.clone(),
        )
    }
}

/// Write a file under the fixture root, creating parents.
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(path, content).expect("write fixture file");
}

/// A small repository with a gitignore, a decoy node_modules, and two
/// source files with distinct vocabulary.
pub fn build_fixture_repo(root: &Path) {
    write_file(root, ".gitignore", "dist/\n*.log\n");
    write_file(
        root,
        "src/index.ts",
        r#"// server entrypoint wiring the http server
import { createServer } from './server';
import { sumRoute } from './math';

const server = createServer();
server.listen(3000);
"#,
    );
    write_file(
        root,
        "src/math.ts",
        r#"// sum helpers for request accounting
export function calculateSum(values: number[]): number {
    let sum = 0;
    for (const value of values) {
        if (Number.isFinite(value)) {
            sum += value;
        } else {
            throw new Error('not a number');
        }
    }
    return sum;
}

export const sumRoute = '/sum';
"#,
    );
    write_file(
        root,
        "src/users.ts",
        r#"// user store backed by an in-memory map
export class UserStore {
    private users = new Map<string, string>();

    addUser(id: string, name: string) {
        this.users.set(id, name);
    }

    getUser(id: string) {
        return this.users.get(id);
    }

    removeUser(id: string) {
        this.users.delete(id);
    }
}
"#,
    );
    write_file(
        root,
        "node_modules/pkg/index.js",
        "module.exports = { noop: () => {} };\n",
    );
    write_file(root, "dist/bundle.js", "console.log('built');\n");
}
