use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use walkdir::WalkDir;

use crate::domain::{extract_api_endpoints, ApiContract, ApiEndpoint, ApiType};

const HTTP_METHODS: &[&str] = &["get", "post", "put", "delete", "patch"];

static GRAPHQL_ROOT_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^\s*(?:extend\s+)?type\s+(Query|Mutation)\s*\{(.*?)\}")
        .expect("graphql root type pattern")
});
static GRAPHQL_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(\w+)\s*(?:\([^)]*\))?\s*:").expect("graphql field pattern"));

/// Recursively discover API contract files under `dir`: OpenAPI/Swagger
/// documents, GraphQL schemas, and protobuf service definitions.
pub fn discover_contracts(dir: &Path) -> Vec<ApiContract> {
    let mut contracts = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != "node_modules" && e.file_name() != ".git")
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let basename = entry.file_name().to_string_lossy().to_lowercase();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let relative = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let contract = if is_openapi_name(&basename) {
            parse_openapi(path).map(|endpoints| ApiContract {
                path: relative.clone(),
                api_type: ApiType::Rest,
                endpoints,
            })
        } else if extension == "graphql" || extension == "gql" {
            parse_graphql_schema(path).map(|endpoints| ApiContract {
                path: relative.clone(),
                api_type: ApiType::Graphql,
                endpoints,
            })
        } else if extension == "proto" {
            parse_proto(path).map(|endpoints| ApiContract {
                path: relative.clone(),
                api_type: ApiType::Grpc,
                endpoints,
            })
        } else {
            None
        };

        if let Some(contract) = contract {
            if !contract.endpoints.is_empty() {
                contracts.push(contract);
            }
        }
    }

    contracts
}

fn is_openapi_name(basename: &str) -> bool {
    let stem_is_api = basename.starts_with("openapi") || basename.starts_with("swagger");
    stem_is_api
        && (basename.ends_with(".yaml") || basename.ends_with(".yml") || basename.ends_with(".json"))
}

/// Parse an OpenAPI document (YAML or JSON) into REST endpoints. YAML is
/// parsed for real; serde_yaml also accepts JSON input.
fn parse_openapi(path: &Path) -> Option<Vec<ApiEndpoint>> {
    let text = std::fs::read_to_string(path).ok()?;
    let doc: serde_yaml::Value = match serde_yaml::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Failed to parse OpenAPI document {}: {}", path.display(), e);
            return None;
        }
    };

    let paths = doc.get("paths")?.as_mapping()?;
    let mut endpoints = Vec::new();
    for (route, operations) in paths {
        let Some(route) = route.as_str() else { continue };
        let Some(operations) = operations.as_mapping() else {
            continue;
        };
        for (method, _) in operations {
            let Some(method) = method.as_str() else { continue };
            if HTTP_METHODS.contains(&method.to_lowercase().as_str()) {
                endpoints.push(ApiEndpoint::rest(method.to_uppercase(), route, 0));
            }
        }
    }
    Some(endpoints)
}

/// Extract Query/Mutation field names from a GraphQL schema file.
fn parse_graphql_schema(path: &Path) -> Option<Vec<ApiEndpoint>> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut endpoints = Vec::new();
    for cap in GRAPHQL_ROOT_TYPE.captures_iter(&text) {
        let operation = &cap[1];
        let body = &cap[2];
        for field in GRAPHQL_FIELD.captures_iter(body) {
            endpoints.push(ApiEndpoint::graphql(operation, &field[1], 0));
        }
    }
    Some(endpoints)
}

/// Proto files reuse the source-level gRPC extraction.
fn parse_proto(path: &Path) -> Option<Vec<ApiEndpoint>> {
    let text = std::fs::read_to_string(path).ok()?;
    Some(
        extract_api_endpoints(&text)
            .into_iter()
            .filter(|e| e.api_type == ApiType::Grpc)
            .collect(),
    )
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
    fn test_openapi_yaml_parsed_for_real() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "openapi.yaml",
            r#"
openapi: 3.0.0
paths:
  /users:
    get:
      summary: list
    post:
      summary: create
  /users/{id}:
    delete:
      summary: remove
"#,
        );
        let contracts = discover_contracts(dir.path());
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].api_type, ApiType::Rest);
        assert_eq!(contracts[0].endpoints.len(), 3);
        assert!(contracts[0]
            .endpoints
            .iter()
            .any(|e| e.method == "DELETE" && e.path == "/users/{id}"));
    }

    #[test]
    fn test_openapi_json_accepted() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "swagger.json",
            r#"{"paths":{"/health":{"get":{"summary":"ok"}}}}"#,
        );
        let contracts = discover_contracts(dir.path());
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].endpoints[0].method, "GET");
    }

    #[test]
    fn test_graphql_schema_fields() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "schema.graphql",
            r#"
type Query {
  user(id: ID!): User
  users: [User!]!
}

type Mutation {
  createUser(input: UserInput!): User
}
"#,
        );
        let contracts = discover_contracts(dir.path());
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].endpoints.len(), 3);
        assert!(contracts[0]
            .endpoints
            .iter()
            .any(|e| e.method == "Mutation" && e.path == "createUser"));
    }

    #[test]
    fn test_proto_services() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "api/billing.proto",
            "service Billing {\n  rpc Charge (Req) returns (Res);\n}\n",
        );
        let contracts = discover_contracts(dir.path());
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].endpoints[0].path, "Billing.Charge");
    }

    #[test]
    fn test_malformed_openapi_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "openapi.yaml", ":\n  - not yaml: [");
        assert!(discover_contracts(dir.path()).is_empty());
    }
}
