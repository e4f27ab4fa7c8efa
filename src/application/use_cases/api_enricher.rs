use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::application::CatalogRepository;
use crate::connector::cache::EndpointCache;
use crate::domain::{
    ApiContext, AtlasError, CodeLocation, CrossServiceCall, EndpointHit, SearchScope, Service,
};

/// Outbound HTTP calls in chunk content: `axios.get('/users')`,
/// `client.post("/orders")`, `fetch('/api/x', { method: 'PUT' })`.
static HTTP_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)\b(?:axios|client|http)\.(get|post|put|delete|patch)\s*\(\s*['"`]([^'"`]+)['"`]"#)
        .expect("http call pattern")
});
static FETCH_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?ms)\bfetch\s*\(\s*['"`]([^'"`]+)['"`]\s*,\s*\{[^}]*method:\s*['"`](\w+)['"`]"#)
        .expect("fetch call pattern")
});

/// Attaches endpoint descriptors from chunk metadata and pairs outbound
/// calls with the services that serve them.
pub struct ApiEnricher {
    catalog: Arc<dyn CatalogRepository>,
    endpoint_cache: Arc<EndpointCache>,
}

impl ApiEnricher {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self {
            catalog,
            endpoint_cache: Arc::new(EndpointCache::new()),
        }
    }

    pub fn with_endpoint_cache(mut self, cache: Arc<EndpointCache>) -> Self {
        self.endpoint_cache = cache;
        self
    }

    /// Memoized outbound-call extraction keyed by chunk id.
    fn outbound_calls(&self, chunk_id: &str, content: &str) -> Vec<(String, String)> {
        if let Some(calls) = self.endpoint_cache.get(chunk_id) {
            return calls;
        }
        let calls = extract_outbound_calls(content);
        self.endpoint_cache.put(chunk_id, calls.clone());
        calls
    }

    pub async fn enrich(
        &self,
        locations: &[CodeLocation],
        scope: &SearchScope,
    ) -> Result<ApiContext, AtlasError> {
        let mut context = ApiContext::default();

        for location in locations {
            for endpoint in &location.metadata.api_endpoints {
                context.endpoints.push(EndpointHit {
                    chunk_id: location.chunk_id.clone(),
                    file_path: location.file_path.clone(),
                    service_id: location.service_id.clone(),
                    endpoint: endpoint.clone(),
                });
            }
        }

        let services = self.scoped_services(scope).await?;
        if services.is_empty() {
            if !context.endpoints.is_empty() {
                context
                    .warnings
                    .push("No services in scope; cross-service calls not computed".to_string());
            }
            return Ok(context);
        }

        let by_id: HashMap<&str, &Service> = services.iter().map(|s| (s.id(), s)).collect();

        for location in locations {
            let Some(caller_id) = location.service_id.as_deref() else {
                continue;
            };
            if !by_id.contains_key(caller_id) {
                continue;
            }
            for (method, path) in self.outbound_calls(&location.chunk_id, &location.content) {
                for callee in &services {
                    if callee.id() == caller_id {
                        continue;
                    }
                    if callee.all_endpoints().any(|e| e.matches_call(&method, &path)) {
                        debug!(
                            "Cross-service call {} {} from {} to {}",
                            method,
                            path,
                            caller_id,
                            callee.name()
                        );
                        context.cross_service_calls.push(CrossServiceCall {
                            caller_service_id: caller_id.to_string(),
                            callee_service_id: callee.id().to_string(),
                            method: method.clone(),
                            path: path.clone(),
                        });
                    }
                }
            }
        }

        Ok(context)
    }

    /// Services visible to the query: restricted to the scope's service
    /// ids when a service scope is active, otherwise every service of the
    /// scoped repositories.
    async fn scoped_services(&self, scope: &SearchScope) -> Result<Vec<Service>, AtlasError> {
        if !scope.service_ids.is_empty() {
            return self.catalog.services_by_ids(&scope.service_ids).await;
        }
        let mut services = Vec::new();
        for repo_id in &scope.repo_ids {
            services.extend(self.catalog.services_by_repository(repo_id).await?);
        }
        Ok(services)
    }
}

/// (method, path) pairs for outbound HTTP calls found in source text.
pub fn extract_outbound_calls(source: &str) -> Vec<(String, String)> {
    let mut calls = Vec::new();
    for cap in HTTP_CALL.captures_iter(source) {
        calls.push((cap[1].to_uppercase(), cap[2].to_string()));
    }
    for cap in FETCH_CALL.captures_iter(source) {
        calls.push((cap[2].to_uppercase(), cap[1].to_string()));
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_axios_style_calls() {
        let src = r#"
const users = await axios.get('/users');
await client.post("/orders", body);
"#;
        let calls = extract_outbound_calls(src);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ("GET".to_string(), "/users".to_string()));
        assert_eq!(calls[1], ("POST".to_string(), "/orders".to_string()));
    }

    #[test]
    fn test_extract_fetch_with_method() {
        let src = r#"await fetch('/api/items', { method: 'PUT', body });"#;
        let calls = extract_outbound_calls(src);
        assert_eq!(calls, vec![("PUT".to_string(), "/api/items".to_string())]);
    }

    #[test]
    fn test_plain_fetch_without_method_is_ignored() {
        assert!(extract_outbound_calls("fetch('/api/items')").is_empty());
    }
}
