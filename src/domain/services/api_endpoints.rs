use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::models::ApiEndpoint;

/// Express-style registrations: `app.get('/path', …)`, `router.post(…)`.
static EXPRESS_ROUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)\b(?:app|router|server)\.(get|post|put|delete|patch)\s*\(\s*['"`]([^'"`]+)['"`]"#)
        .expect("express route pattern")
});

/// Annotation-style decorators: `@Get('/path')`, `@Post("/users")`.
static DECORATOR_ROUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)@(Get|Post|Put|Delete|Patch)\s*\(\s*['"`]([^'"`]*)['"`]?\s*\)"#)
        .expect("decorator route pattern")
});

/// GraphQL resolvers: `@Query()`, `@Mutation('renameUser')`.
static GRAPHQL_RESOLVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)@(Query|Mutation)\s*\(\s*(?:['"`]([^'"`]*)['"`])?\s*\)"#)
        .expect("graphql resolver pattern")
});

/// gRPC service blocks: `service Billing { rpc Charge (…) … }`.
static GRPC_SERVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\bservice\s+(\w+)\s*\{").expect("grpc service pattern"));
static GRPC_RPC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\brpc\s+(\w+)").expect("grpc rpc pattern"));

fn line_of(source: &str, byte_offset: usize) -> u32 {
    source[..byte_offset].matches('\n').count() as u32 + 1
}

/// Extract API endpoints from raw source text, across the framework
/// families the indexer recognizes.
pub fn extract_api_endpoints(source: &str) -> Vec<ApiEndpoint> {
    let mut endpoints = Vec::new();

    for cap in EXPRESS_ROUTE.captures_iter(source) {
        let m = cap.get(0).expect("match");
        endpoints.push(ApiEndpoint::rest(
            cap[1].to_uppercase(),
            &cap[2],
            line_of(source, m.start()),
        ));
    }

    for cap in DECORATOR_ROUTE.captures_iter(source) {
        let m = cap.get(0).expect("match");
        endpoints.push(ApiEndpoint::rest(
            cap[1].to_uppercase(),
            &cap[2],
            line_of(source, m.start()),
        ));
    }

    for cap in GRAPHQL_RESOLVER.captures_iter(source) {
        let m = cap.get(0).expect("match");
        let name = cap.get(2).map(|n| n.as_str()).unwrap_or("");
        endpoints.push(ApiEndpoint::graphql(
            &cap[1],
            name,
            line_of(source, m.start()),
        ));
    }

    // gRPC: pair each rpc with the nearest preceding service block.
    let services: Vec<(usize, String)> = GRPC_SERVICE
        .captures_iter(source)
        .map(|cap| (cap.get(0).expect("match").start(), cap[1].to_string()))
        .collect();
    if !services.is_empty() {
        for cap in GRPC_RPC.captures_iter(source) {
            let m = cap.get(0).expect("match");
            let service = services
                .iter()
                .rev()
                .find(|(start, _)| *start < m.start())
                .map(|(_, name)| name.as_str());
            if let Some(service) = service {
                endpoints.push(ApiEndpoint::grpc(
                    format!("{}.{}", service, &cap[1]),
                    line_of(source, m.start()),
                ));
            }
        }
    }

    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ApiType;

    #[test]
    fn test_express_routes() {
        let src = r#"
app.get('/users', listUsers);
router.post('/users/:id/activate', activate);
server.delete("/sessions", logout);
"#;
        let eps = extract_api_endpoints(src);
        assert_eq!(eps.len(), 3);
        assert_eq!(eps[0].method, "GET");
        assert_eq!(eps[0].path, "/users");
        assert_eq!(eps[0].line_number, 2);
        assert_eq!(eps[1].method, "POST");
        assert_eq!(eps[2].method, "DELETE");
    }

    #[test]
    fn test_decorator_routes() {
        let src = r#"
class UserController {
  @Get('/users')
  list() {}

  @Post('/users')
  create() {}
}
"#;
        let eps = extract_api_endpoints(src);
        assert_eq!(eps.len(), 2);
        assert!(eps.iter().all(|e| e.api_type == ApiType::Rest));
        assert_eq!(eps[0].line_number, 3);
    }

    #[test]
    fn test_graphql_resolvers() {
        let src = r#"
  @Query()
  user() {}

  @Mutation('renameUser')
  rename() {}
"#;
        let eps = extract_api_endpoints(src);
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].method, "Query");
        assert_eq!(eps[0].path, "");
        assert_eq!(eps[1].method, "Mutation");
        assert_eq!(eps[1].path, "renameUser");
        assert!(eps.iter().all(|e| e.api_type == ApiType::Graphql));
    }

    #[test]
    fn test_grpc_rpcs_qualified_by_service() {
        let src = r#"
service Billing {
  rpc Charge (ChargeRequest) returns (ChargeReply);
  rpc Refund (RefundRequest) returns (RefundReply);
}
"#;
        let eps = extract_api_endpoints(src);
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].path, "Billing.Charge");
        assert_eq!(eps[1].path, "Billing.Refund");
        assert!(eps.iter().all(|e| e.api_type == ApiType::Grpc));
    }

    #[test]
    fn test_rpc_without_service_block_is_ignored() {
        let eps = extract_api_endpoints("rpc Orphan (A) returns (B);");
        assert!(eps.is_empty());
    }
}
