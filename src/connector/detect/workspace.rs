use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{AliasKind, AtlasError, Workspace, WorkspaceAlias, WorkspaceDependency};

/// Everything workspace detection yields for one repository.
#[derive(Debug, Default)]
pub struct WorkspaceDetection {
    pub workspaces: Vec<Workspace>,
    pub dependencies: Vec<WorkspaceDependency>,
    pub aliases: Vec<WorkspaceAlias>,
}

impl WorkspaceDetection {
    pub fn package_names(&self) -> Vec<String> {
        self.workspaces
            .iter()
            .map(|w| w.package_name().to_string())
            .collect()
    }

    /// Workspace owning a repo-relative file path, if any.
    pub fn workspace_for(&self, file_path: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|w| w.contains(file_path))
    }
}

/// Read the monorepo manifest and resolve each member package.
pub fn detect_workspaces(repo_id: &str, root: &Path) -> Result<WorkspaceDetection, AtlasError> {
    let mut patterns = Vec::new();

    if let Some(manifest) = read_json(&root.join("package.json")) {
        patterns.extend(workspace_patterns(&manifest));
    }
    if let Some(pnpm) = read_yaml(&root.join("pnpm-workspace.yaml")) {
        if let Some(pkgs) = pnpm.get("packages").and_then(|p| p.as_sequence()) {
            patterns.extend(pkgs.iter().filter_map(|p| p.as_str().map(String::from)));
        }
    }

    let mut detection = WorkspaceDetection::default();
    if patterns.is_empty() {
        return Ok(detection);
    }

    for package_dir in resolve_patterns(root, &patterns) {
        let manifest_path = root.join(&package_dir).join("package.json");
        let Some(manifest) = read_json(&manifest_path) else {
            continue;
        };
        let Some(name) = manifest.get("name").and_then(Value::as_str) else {
            continue;
        };

        let mut workspace = Workspace::new(repo_id, name, &package_dir)
            .with_dependencies(dependency_names(&manifest));
        if let Some(version) = manifest.get("version").and_then(Value::as_str) {
            workspace = workspace.with_version(version);
        }
        debug!("Detected workspace package {} at {}", name, package_dir);
        detection.workspaces.push(workspace);
    }

    // Workspace → workspace edges from manifest dependencies.
    let by_name: HashMap<&str, &Workspace> = detection
        .workspaces
        .iter()
        .map(|w| (w.package_name(), w))
        .collect();
    for workspace in &detection.workspaces {
        for dep in workspace.dependencies() {
            if let Some(target) = by_name.get(dep.as_str()) {
                detection.dependencies.push(WorkspaceDependency {
                    repo_id: repo_id.to_string(),
                    source_workspace_id: workspace.id().to_string(),
                    target_workspace_id: target.id().to_string(),
                });
            }
        }
    }

    // Package-name aliases resolve to each package's entry directory.
    for workspace in &detection.workspaces {
        detection.aliases.push(WorkspaceAlias::new(
            repo_id,
            workspace.package_name(),
            workspace.path(),
            AliasKind::WorkspacePackage,
            true,
        ));
        detection.aliases.push(WorkspaceAlias::new(
            repo_id,
            format!("{}/*", workspace.package_name()),
            format!("{}/*", workspace.path()),
            AliasKind::WorkspacePackage,
            true,
        ));
    }

    detection.aliases.extend(tsconfig_aliases(repo_id, root));

    Ok(detection)
}

/// Path aliases from tsconfig `compilerOptions.paths`, first target only.
pub fn tsconfig_aliases(repo_id: &str, root: &Path) -> Vec<WorkspaceAlias> {
    let Some(tsconfig) = read_json(&root.join("tsconfig.json")) else {
        return Vec::new();
    };
    let Some(paths) = tsconfig
        .get("compilerOptions")
        .and_then(|c| c.get("paths"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    let base_url = tsconfig
        .get("compilerOptions")
        .and_then(|c| c.get("baseUrl"))
        .and_then(Value::as_str)
        .unwrap_or(".");

    paths
        .iter()
        .filter_map(|(pattern, targets)| {
            let first = targets.as_array()?.first()?.as_str()?;
            let target = if base_url == "." {
                first.trim_start_matches("./").to_string()
            } else {
                format!("{}/{}", base_url.trim_start_matches("./"), first.trim_start_matches("./"))
            };
            Some(WorkspaceAlias::new(
                repo_id,
                pattern.clone(),
                target,
                AliasKind::PathAlias,
                true,
            ))
        })
        .collect()
}

fn workspace_patterns(manifest: &Value) -> Vec<String> {
    match manifest.get("workspaces") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.as_str().map(String::from))
            .collect(),
        Some(Value::Object(obj)) => obj
            .get("packages")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Expand workspace patterns (`packages/*`, explicit paths) to existing
/// package directories, forward-slash relative.
fn resolve_patterns(root: &Path, patterns: &[String]) -> Vec<String> {
    let mut dirs = Vec::new();
    for pattern in patterns {
        let pattern = pattern.trim_end_matches('/');
        if let Some(prefix) = pattern.strip_suffix("/*") {
            let parent = root.join(prefix);
            let Ok(entries) = std::fs::read_dir(&parent) else {
                continue;
            };
            for entry in entries.flatten() {
                if entry.path().is_dir() {
                    dirs.push(format!("{}/{}", prefix, entry.file_name().to_string_lossy()));
                }
            }
        } else if root.join(pattern).is_dir() {
            dirs.push(pattern.to_string());
        }
    }
    dirs.sort();
    dirs.dedup();
    dirs
}

fn dependency_names(manifest: &Value) -> Vec<String> {
    let mut names = Vec::new();
    for key in ["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(deps) = manifest.get(key).and_then(Value::as_object) {
            names.extend(deps.keys().cloned());
        }
    }
    names.sort();
    names.dedup();
    names
}

fn read_json(path: &Path) -> Option<Value> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to parse {}: {}", path.display(), e);
            None
        }
    }
}

fn read_yaml(path: &Path) -> Option<serde_yaml::Value> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_yaml::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to parse {}: {}", path.display(), e);
            None
        }
    }
}
