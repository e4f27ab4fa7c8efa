use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::application::CatalogRepository;
use crate::domain::{
    AtlasError, ImportChain, ImportChainEntry, RankedFile, SourceFile, WorkspaceAlias,
};

/// BFS starts from at most this many retrieved files.
const MAX_ROOTS: usize = 10;

#[derive(Debug, Clone)]
pub struct ExpansionOptions {
    /// Clamped to [1, 3].
    pub max_depth: u32,
    pub respect_workspace_boundaries: bool,
    pub respect_service_boundaries: bool,
    /// Restrict targets to one workspace; unknown-workspace targets are
    /// kept (assumed external).
    pub include_workspace_only: Option<String>,
    /// Restrict targets to one service; unknown-service targets are kept.
    pub include_service_only: Option<String>,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            respect_workspace_boundaries: false,
            respect_service_boundaries: false,
            include_workspace_only: None,
            include_service_only: None,
        }
    }
}

/// Bounded BFS over file-to-file import edges stored on the files.
pub struct ImportExpander {
    catalog: Arc<dyn CatalogRepository>,
}

impl ImportExpander {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// Expand imports from the top retrieved files. Returns the chains
    /// and the deepest level reached across all of them.
    pub async fn expand(
        &self,
        roots: &[RankedFile],
        options: &ExpansionOptions,
    ) -> Result<(Vec<ImportChain>, u32), AtlasError> {
        let max_depth = options.max_depth.clamp(1, 3);
        let mut chains = Vec::new();
        let mut depth_reached = 0u32;

        // Aliases are per-repository; fetch each repo's set once.
        let mut alias_cache: HashMap<String, Vec<WorkspaceAlias>> = HashMap::new();

        for root in roots.iter().take(MAX_ROOTS) {
            if !alias_cache.contains_key(&root.repo_id) {
                let aliases = self.catalog.workspace_aliases(&root.repo_id).await?;
                alias_cache.insert(root.repo_id.clone(), aliases);
            }
            let aliases = &alias_cache[&root.repo_id];

            let chain = self
                .expand_one(root, max_depth, options, aliases)
                .await?;
            depth_reached = depth_reached.max(chain.depth_reached);
            if !chain.files.is_empty() || !chain.cycles.is_empty() {
                chains.push(chain);
            }
        }

        Ok((chains, depth_reached))
    }

    async fn expand_one(
        &self,
        root: &RankedFile,
        max_depth: u32,
        options: &ExpansionOptions,
        aliases: &[WorkspaceAlias],
    ) -> Result<ImportChain, AtlasError> {
        let mut chain = ImportChain {
            root_file: root.file_path.clone(),
            files: Vec::new(),
            depth_reached: 0,
            cycles: Vec::new(),
        };

        let Some(root_file) = self
            .catalog
            .find_file(&root.repo_id, &root.file_path)
            .await?
        else {
            return Ok(chain);
        };

        // Visited set terminates cycles; the parent map reconstructs the
        // path stack when one is re-encountered.
        let mut visited: HashSet<String> = HashSet::new();
        let mut parents: HashMap<String, String> = HashMap::new();
        let mut queue: VecDeque<(SourceFile, u32)> = VecDeque::new();

        visited.insert(root.file_path.clone());
        queue.push_back((root_file, 0));

        while let Some((file, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let source_path = file.file_path().to_string();

            for import in file.imports() {
                let Some(target_path) = self
                    .resolve_import(&root.repo_id, &source_path, &import.source, aliases)
                    .await?
                else {
                    continue;
                };

                if visited.contains(&target_path) {
                    if let Some(cycle) = trace_cycle(&parents, &source_path, &target_path) {
                        debug!("Import cycle via {}: {:?}", target_path, cycle);
                        chain.cycles.push(cycle);
                    }
                    continue;
                }

                let Some(target) = self
                    .catalog
                    .find_file(&root.repo_id, &target_path)
                    .await?
                else {
                    continue;
                };

                if !boundary_allows(&file, &target, options) {
                    continue;
                }

                visited.insert(target_path.clone());
                parents.insert(target_path.clone(), source_path.clone());
                chain.files.push(ImportChainEntry {
                    file_path: target_path.clone(),
                    depth: depth + 1,
                    imported_from: source_path.clone(),
                });
                chain.depth_reached = chain.depth_reached.max(depth + 1);
                queue.push_back((target, depth + 1));
            }
        }

        Ok(chain)
    }

    /// Resolve an import specifier to a stored repo-relative path, trying
    /// relative resolution first, then workspace aliases. Bare external
    /// modules resolve to nothing.
    async fn resolve_import(
        &self,
        repo_id: &str,
        importer: &str,
        specifier: &str,
        aliases: &[WorkspaceAlias],
    ) -> Result<Option<String>, AtlasError> {
        let mut candidates: Vec<String> = Vec::new();

        if specifier.starts_with("./") || specifier.starts_with("../") {
            if let Some(joined) = join_relative(importer, specifier) {
                candidates.extend(with_extensions(&joined));
            }
        } else {
            for alias in aliases {
                if let Some(resolved) = alias.resolve(specifier) {
                    candidates.extend(with_extensions(&resolved));
                }
            }
        }

        for candidate in candidates {
            if self.catalog.find_file(repo_id, &candidate).await?.is_some() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

/// Boundary rules: mismatched known ids are dropped when the respective
/// flag is set; unknown ids are kept as assumed-external.
fn boundary_allows(source: &SourceFile, target: &SourceFile, options: &ExpansionOptions) -> bool {
    if let Some(ref only) = options.include_workspace_only {
        if let Some(ws) = target.workspace_id() {
            if ws != only {
                return false;
            }
        }
    }
    if let Some(ref only) = options.include_service_only {
        if let Some(svc) = target.service_id() {
            if svc != only {
                return false;
            }
        }
    }
    if options.respect_workspace_boundaries {
        if let (Some(a), Some(b)) = (source.workspace_id(), target.workspace_id()) {
            if a != b {
                return false;
            }
        }
    }
    if options.respect_service_boundaries {
        if let (Some(a), Some(b)) = (source.service_id(), target.service_id()) {
            if a != b {
                return false;
            }
        }
    }
    true
}

/// Walk the parent map from `from` back to `to`, yielding the cycle path
/// when `to` is an ancestor of `from`.
fn trace_cycle(
    parents: &HashMap<String, String>,
    from: &str,
    to: &str,
) -> Option<Vec<String>> {
    let mut path = vec![from.to_string()];
    let mut current = from;
    while let Some(parent) = parents.get(current) {
        path.push(parent.clone());
        if parent == to {
            path.reverse();
            path.push(to.to_string());
            return Some(path);
        }
        current = parent;
    }
    if from == to {
        return Some(vec![from.to_string(), to.to_string()]);
    }
    None
}

/// Join `./x` / `../x` against the importing file's directory and
/// normalize `.`/`..` segments.
fn join_relative(importer: &str, specifier: &str) -> Option<String> {
    let dir = match importer.rfind('/') {
        Some(idx) => &importer[..idx],
        None => "",
    };
    let mut segments: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };
    for part in specifier.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Candidate stored paths for a resolved specifier.
fn with_extensions(base: &str) -> Vec<String> {
    let mut candidates = vec![base.to_string()];
    if !base.rsplit('/').next().is_some_and(|last| last.contains('.')) {
        for ext in ["ts", "tsx", "js", "jsx", "py", "rs", "go"] {
            candidates.push(format!("{}.{}", base, ext));
        }
        for index in ["index.ts", "index.js", "mod.rs"] {
            candidates.push(format!("{}/{}", base, index));
        }
    }
    candidates
}
