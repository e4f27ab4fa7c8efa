//! # CodeAtlas
//!
//! Semantic codebase indexing and retrieval. The indexer walks a
//! repository, parses files with tree-sitter, carves them into typed
//! chunks, embeds them through an external model host, and persists
//! everything into a vector-capable DuckDB store. The retriever answers
//! queries through a staged pipeline: scope resolution, cached query
//! embedding, two-level vector search, symbol resolution, bounded
//! import expansion, API enrichment, deduplication, and token-budgeted
//! assembly.
//!
//! ## Architecture
//!
//! - `domain`: models, error taxonomy, and pure services
//! - `application`: ports, use cases, and validation
//! - `connector`: filesystem, tree-sitter, model host, DuckDB, caches

pub mod application;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use connector::*;
pub use domain::*;
