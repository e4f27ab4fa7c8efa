use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::application::VectorRepository;
use crate::domain::{AtlasError, CodeLocation, SearchScope, Symbol};

/// Resolves imported symbols referenced by retrieved chunks to their
/// exported definitions within scope.
pub struct SymbolResolver {
    vectors: Arc<dyn VectorRepository>,
}

impl SymbolResolver {
    pub fn new(vectors: Arc<dyn VectorRepository>) -> Self {
        Self { vectors }
    }

    pub async fn resolve(
        &self,
        locations: &[CodeLocation],
        scope: &SearchScope,
    ) -> Result<Vec<Symbol>, AtlasError> {
        let mut names: Vec<String> = Vec::new();
        let mut seen_names = HashSet::new();
        for location in locations {
            for name in &location.metadata.imported_symbols {
                if seen_names.insert(name.clone()) {
                    names.push(name.clone());
                }
            }
        }

        let mut symbols = Vec::new();
        let mut seen_ids = HashSet::new();
        for name in names {
            match self.vectors.find_exported_symbol(&name, scope).await? {
                Some(symbol) => {
                    if seen_ids.insert(symbol.id().to_string()) {
                        symbols.push(symbol);
                    }
                }
                None => debug!("No exported definition found for '{}'", name),
            }
        }

        Ok(symbols)
    }
}
