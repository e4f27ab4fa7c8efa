//! # Connector Layer
//!
//! Adapters implementing the application ports:
//! - Filesystem walking with ignore and secret rules
//! - Tree-sitter parsing with a regex fallback
//! - The embedding-model host client (Ollama-compatible)
//! - Embedding and summary services
//! - Workspace/service/contract detection
//! - DuckDB storage (catalog, vectors, SQL guard)
//! - In-process caches and monitoring

pub mod cache;
pub mod detect;
pub mod embedding;
pub mod host;
pub mod monitor;
pub mod parser;
pub mod storage;
pub mod summary;
pub mod walker;

pub use cache::*;
pub use detect::*;
pub use embedding::*;
pub use host::*;
pub use monitor::*;
pub use parser::*;
pub use storage::*;
pub use summary::*;
pub use walker::*;
