use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Rest,
    Graphql,
    Grpc,
    Library,
    DockerService,
    Serverless,
    Mobile,
    #[default]
    Unknown,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Rest => "rest",
            ServiceType::Graphql => "graphql",
            ServiceType::Grpc => "grpc",
            ServiceType::Library => "library",
            ServiceType::DockerService => "docker_service",
            ServiceType::Serverless => "serverless",
            ServiceType::Mobile => "mobile",
            ServiceType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "rest" => ServiceType::Rest,
            "graphql" => ServiceType::Graphql,
            "grpc" => ServiceType::Grpc,
            "library" => ServiceType::Library,
            "docker_service" => ServiceType::DockerService,
            "serverless" => ServiceType::Serverless,
            "mobile" => ServiceType::Mobile,
            _ => ServiceType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiType {
    Rest,
    Graphql,
    Grpc,
}

impl ApiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiType::Rest => "rest",
            ApiType::Graphql => "graphql",
            ApiType::Grpc => "grpc",
        }
    }
}

/// An endpoint extracted from source code or an API contract file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    /// HTTP verb, `Query`/`Mutation`, or gRPC `Service.Method`.
    pub method: String,
    /// Route path or operation name.
    pub path: String,
    pub line_number: u32,
    pub api_type: ApiType,
}

impl ApiEndpoint {
    pub fn rest(method: impl Into<String>, path: impl Into<String>, line_number: u32) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            line_number,
            api_type: ApiType::Rest,
        }
    }

    pub fn graphql(operation: impl Into<String>, name: impl Into<String>, line_number: u32) -> Self {
        Self {
            method: operation.into(),
            path: name.into(),
            line_number,
            api_type: ApiType::Graphql,
        }
    }

    pub fn grpc(qualified: impl Into<String>, line_number: u32) -> Self {
        Self {
            method: "rpc".to_string(),
            path: qualified.into(),
            line_number,
            api_type: ApiType::Grpc,
        }
    }

    /// Match key for cross-service call pairing.
    pub fn matches_call(&self, method: &str, path: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && self.path == path
    }
}

/// A parsed API contract file (OpenAPI, GraphQL schema, proto).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiContract {
    pub path: String,
    pub api_type: ApiType,
    pub endpoints: Vec<ApiEndpoint>,
}

/// A microservice, serverless bundle, or mobile app detected under the
/// conventional service directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    id: String,
    repo_id: String,
    name: String,
    service_type: ServiceType,
    path: String,
    ports: Vec<u16>,
    contracts: Vec<ApiContract>,
    /// Names of services this one depends on (compose `depends_on`).
    dependencies: Vec<String>,
}

impl Service {
    pub fn new(
        repo_id: impl Into<String>,
        name: impl Into<String>,
        service_type: ServiceType,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            repo_id: repo_id.into(),
            name: name.into(),
            service_type,
            path: path.into(),
            ports: Vec::new(),
            contracts: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repo_id: String,
        name: String,
        service_type: ServiceType,
        path: String,
        ports: Vec<u16>,
        contracts: Vec<ApiContract>,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            id,
            repo_id,
            name,
            service_type,
            path,
            ports,
            contracts,
            dependencies,
        }
    }

    /// Keep a previously persisted id so file and chunk references stay
    /// valid across re-detection.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_contracts(mut self, contracts: Vec<ApiContract>) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn contracts(&self) -> &[ApiContract] {
        &self.contracts
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn contains(&self, file_path: &str) -> bool {
        let prefix = self.path.trim_end_matches('/');
        file_path == prefix || file_path.starts_with(&format!("{}/", prefix))
    }

    pub fn all_endpoints(&self) -> impl Iterator<Item = &ApiEndpoint> {
        self.contracts.iter().flat_map(|c| c.endpoints.iter())
    }
}

/// Directed service → service dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDependency {
    pub repo_id: String,
    pub source_service_id: String,
    pub target_service_id: String,
}

/// A cross-repository dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossRepoDependency {
    pub source_repo_id: String,
    pub target_repo_id: String,
    /// The package or module name that creates the edge.
    pub via: String,
}

/// A detected call from one service to another's endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossServiceCall {
    pub caller_service_id: String,
    pub callee_service_id: String,
    pub method: String,
    pub path: String,
}
