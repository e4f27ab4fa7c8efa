use std::collections::HashMap;
use std::path::Path;

use serde_yaml::Value;
use tracing::{debug, warn};

use crate::domain::{ApiType, AtlasError, Service, ServiceDependency, ServiceType};

use super::contracts::discover_contracts;

/// Directories conventionally holding deployable units.
const SERVICE_ROOTS: &[&str] = &["services", "apps", "microservices", "packages"];

const SERVERLESS_FILES: &[&str] = &["serverless.yml", "serverless.yaml", "template.yaml", "sam.yaml"];
const MOBILE_MARKERS: &[&str] = &["pubspec.yaml", "app.json", "Info.plist"];

/// Compose-level facts about one service entry.
#[derive(Debug, Default, Clone)]
struct ComposeEntry {
    ports: Vec<u16>,
    depends_on: Vec<String>,
    build_context: Option<String>,
}

#[derive(Debug, Default)]
pub struct ServiceDetection {
    pub services: Vec<Service>,
    pub dependencies: Vec<ServiceDependency>,
}

impl ServiceDetection {
    pub fn service_for(&self, file_path: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.contains(file_path))
    }
}

/// Scan conventional service directories, enrich with docker-compose
/// data, and classify each unit.
pub fn detect_services(repo_id: &str, root: &Path) -> Result<ServiceDetection, AtlasError> {
    let compose = load_compose(root);
    let mut detection = ServiceDetection::default();

    for service_root in SERVICE_ROOTS {
        let parent = root.join(service_root);
        let Ok(entries) = std::fs::read_dir(&parent) else {
            continue;
        };
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let relative = format!("{}/{}", service_root, name);
            let service =
                build_service(repo_id, root, &name, &relative, &compose)?;
            debug!(
                "Detected service {} ({}) at {}",
                service.name(),
                service.service_type().as_str(),
                relative
            );
            detection.services.push(service);
        }
    }

    // Compose services with no matching conventional directory still
    // count as deployable units.
    for (name, entry) in &compose {
        if detection.services.iter().any(|s| s.name() == *name) {
            continue;
        }
        let path = entry
            .build_context
            .clone()
            .unwrap_or_else(|| name.clone());
        let service = Service::new(repo_id, name, ServiceType::DockerService, path)
            .with_ports(entry.ports.clone())
            .with_dependencies(entry.depends_on.clone());
        detection.services.push(service);
    }

    // depends_on edges between detected services.
    let by_name: HashMap<String, String> = detection
        .services
        .iter()
        .map(|s| (s.name().to_string(), s.id().to_string()))
        .collect();
    for service in &detection.services {
        for dep in service.dependencies() {
            if let Some(target_id) = by_name.get(dep) {
                if target_id != service.id() {
                    detection.dependencies.push(ServiceDependency {
                        repo_id: repo_id.to_string(),
                        source_service_id: service.id().to_string(),
                        target_service_id: target_id.clone(),
                    });
                }
            }
        }
    }

    Ok(detection)
}

fn build_service(
    repo_id: &str,
    root: &Path,
    name: &str,
    relative: &str,
    compose: &HashMap<String, ComposeEntry>,
) -> Result<Service, AtlasError> {
    let dir = root.join(relative);
    let contracts = discover_contracts(&dir);
    let compose_entry = compose.get(name);

    let service_type = classify(&dir, compose_entry.is_some(), &contracts);

    let mut service = Service::new(repo_id, name, service_type, relative).with_contracts(contracts);
    if let Some(entry) = compose_entry {
        service = service
            .with_ports(entry.ports.clone())
            .with_dependencies(entry.depends_on.clone());
    }
    Ok(service)
}

/// Classification precedence: compose entry, serverless framework file,
/// mobile framework file, API contract, manifest dependency heuristics,
/// library fallback.
fn classify(dir: &Path, has_compose: bool, contracts: &[crate::domain::ApiContract]) -> ServiceType {
    if has_compose {
        return ServiceType::DockerService;
    }
    if SERVERLESS_FILES.iter().any(|f| dir.join(f).exists()) {
        return ServiceType::Serverless;
    }
    if MOBILE_MARKERS.iter().any(|f| dir.join(f).exists())
        || (dir.join("ios").is_dir() && dir.join("android").is_dir())
    {
        return ServiceType::Mobile;
    }
    if let Some(contract) = contracts.first() {
        return match contract.api_type {
            ApiType::Rest => ServiceType::Rest,
            ApiType::Graphql => ServiceType::Graphql,
            ApiType::Grpc => ServiceType::Grpc,
        };
    }
    if let Some(kind) = manifest_heuristic(dir) {
        return kind;
    }
    ServiceType::Library
}

/// Dependency-name heuristics over the package manifest.
fn manifest_heuristic(dir: &Path) -> Option<ServiceType> {
    let text = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&text).ok()?;
    let mut deps = Vec::new();
    for key in ["dependencies", "devDependencies"] {
        if let Some(obj) = manifest.get(key).and_then(|v| v.as_object()) {
            deps.extend(obj.keys().cloned());
        }
    }
    let has = |needle: &str| deps.iter().any(|d| d.contains(needle));

    if has("grpc") {
        Some(ServiceType::Grpc)
    } else if has("graphql") || has("apollo") {
        Some(ServiceType::Graphql)
    } else if has("express") || has("fastify") || has("koa") || has("hapi") || has("nest") {
        Some(ServiceType::Rest)
    } else if has("react-native") || has("expo") {
        Some(ServiceType::Mobile)
    } else {
        None
    }
}

/// Parse docker-compose at the repository root into per-service facts.
fn load_compose(root: &Path) -> HashMap<String, ComposeEntry> {
    let path = ["docker-compose.yml", "docker-compose.yaml", "compose.yaml"]
        .iter()
        .map(|f| root.join(f))
        .find(|p| p.exists());
    let Some(path) = path else {
        return HashMap::new();
    };
    let Ok(text) = std::fs::read_to_string(&path) else {
        return HashMap::new();
    };
    let doc: Value = match serde_yaml::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Failed to parse {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    let mut entries = HashMap::new();
    let Some(services) = doc.get("services").and_then(Value::as_mapping) else {
        return entries;
    };
    for (name, body) in services {
        let Some(name) = name.as_str() else { continue };
        let mut entry = ComposeEntry::default();

        if let Some(ports) = body.get("ports").and_then(Value::as_sequence) {
            for port in ports {
                if let Some(spec) = port.as_str() {
                    // "8080:80" or "127.0.0.1:8080:80"; host port is
                    // second from the right.
                    let parts: Vec<&str> = spec.split(':').collect();
                    let host = if parts.len() >= 2 {
                        parts[parts.len() - 2]
                    } else {
                        parts[0]
                    };
                    if let Ok(p) = host.parse() {
                        entry.ports.push(p);
                    }
                } else if let Some(p) = port.as_u64() {
                    entry.ports.push(p as u16);
                }
            }
        }

        if let Some(deps) = body.get("depends_on") {
            match deps {
                Value::Sequence(items) => {
                    entry.depends_on = items
                        .iter()
                        .filter_map(|i| i.as_str().map(String::from))
                        .collect();
                }
                Value::Mapping(map) => {
                    entry.depends_on = map
                        .keys()
                        .filter_map(|k| k.as_str().map(String::from))
                        .collect();
                }
                _ => {}
            }
        }

        entry.build_context = body
            .get("build")
            .and_then(|b| match b {
                Value::String(context) => Some(context.clone()),
                other => other
                    .get("context")
                    .and_then(Value::as_str)
                    .map(String::from),
            })
            .map(|c| c.trim_start_matches("./").to_string());

        entries.insert(name.to_string(), entry);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_compose_classification_and_ports() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("services/api/src")).unwrap();
        write(
            root,
            "docker-compose.yml",
            r#"
services:
  api:
    build: ./services/api
    ports:
      - "8080:80"
    depends_on:
      - db
  db:
    image: postgres:16
"#,
        );

        let detection = detect_services("repo", root).unwrap();
        let api = detection.services.iter().find(|s| s.name() == "api").unwrap();
        assert_eq!(api.service_type(), ServiceType::DockerService);
        assert_eq!(api.ports(), &[8080]);
        assert_eq!(api.dependencies(), &["db".to_string()]);

        // db has no directory but still appears from compose.
        assert!(detection.services.iter().any(|s| s.name() == "db"));
        assert_eq!(detection.dependencies.len(), 1);
    }

    #[test]
    fn test_serverless_beats_contract() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "services/fn/serverless.yml", "service: fn\n");
        write(
            root,
            "services/fn/openapi.yaml",
            "paths:\n  /x:\n    get: {}\n",
        );

        let detection = detect_services("repo", root).unwrap();
        assert_eq!(detection.services[0].service_type(), ServiceType::Serverless);
    }

    #[test]
    fn test_contract_classification() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "apps/graph/schema.graphql",
            "type Query {\n  ping: String\n}\n",
        );

        let detection = detect_services("repo", root).unwrap();
        let graph = detection.services.iter().find(|s| s.name() == "graph").unwrap();
        assert_eq!(graph.service_type(), ServiceType::Graphql);
        assert_eq!(graph.all_endpoints().count(), 1);
    }

    #[test]
    fn test_manifest_heuristic_rest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "services/web/package.json",
            r#"{"name":"web","dependencies":{"express":"4"}}"#,
        );

        let detection = detect_services("repo", root).unwrap();
        assert_eq!(detection.services[0].service_type(), ServiceType::Rest);
    }

    #[test]
    fn test_library_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("packages/utils/src")).unwrap();

        let detection = detect_services("repo", root).unwrap();
        assert_eq!(detection.services[0].service_type(), ServiceType::Library);
    }
}
