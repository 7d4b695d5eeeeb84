//! Ingress traffic policy
//!
//! Projects a service's ingress backend policy into route policies. Merging
//! across a proxy's multiple fronted services happens in the route builder,
//! keyed on `(path_regex, host)`.

use std::collections::BTreeSet;

use trellis_api::{
    HttpRouteMatch, IngressHttpRoutePolicy, IngressTrafficPolicy, MeshService, MethodMatch,
    ServiceIdentity,
};

use crate::{CatalogError, MeshCatalog};

impl MeshCatalog {
    /// Ingress routes admitted for one service, or `None` when no ingress
    /// backend policy names it.
    pub fn get_ingress_traffic_policy(
        &self,
        service: &MeshService,
    ) -> Result<Option<IngressTrafficPolicy>, CatalogError> {
        let Some(backend) = self.provider().get_ingress_backend_policy(service) else {
            return Ok(None);
        };

        let allowed: BTreeSet<ServiceIdentity> = backend
            .allowed_sources
            .iter()
            .map(|account| account.to_service_identity())
            .collect();

        let mut http_route_policies = Vec::new();
        for spec in &backend.backends {
            let methods = if spec.methods.is_empty() {
                MethodMatch::Any
            } else {
                MethodMatch::Explicit(spec.methods.clone())
            };
            let mut route = HttpRouteMatch::new(&spec.path_regex, methods);
            route.headers = spec.headers.clone();
            http_route_policies.push(IngressHttpRoutePolicy {
                route,
                host: spec.host.clone(),
                allowed_principals: allowed.clone(),
            });
        }
        Ok(Some(IngressTrafficPolicy { http_route_policies }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use trellis_api::ServiceAccount;
    use trellis_compute::fake::fixtures;
    use trellis_compute::{FakeProvider, IngressBackend, IngressBackendSpec};
    use trellis_proxy::ServiceIdentityMapper;

    use super::*;

    fn catalog_over(provider: FakeProvider) -> MeshCatalog {
        let provider = Arc::new(provider);
        let mapper = Arc::new(ServiceIdentityMapper::new(provider.clone()));
        MeshCatalog::new(provider, mapper)
    }

    fn backend() -> IngressBackend {
        IngressBackend {
            name: "bookstore-ingress".to_string(),
            namespace: fixtures::NAMESPACE.to_string(),
            allowed_sources: vec![ServiceAccount::new("edge-gateway", "edge")],
            backends: vec![
                IngressBackendSpec {
                    path_regex: "/buy".to_string(),
                    host: "bookstore.example.com".to_string(),
                    methods: vec!["GET".to_string()],
                    headers: Default::default(),
                },
                IngressBackendSpec {
                    path_regex: "/admin".to_string(),
                    host: "bookstore.example.com".to_string(),
                    methods: vec![],
                    headers: Default::default(),
                },
            ],
        }
    }

    #[test]
    fn test_no_backend_policy_means_no_ingress() {
        let catalog = catalog_over(fixtures::book_world());
        let policy = catalog
            .get_ingress_traffic_policy(&fixtures::bookstore_service())
            .unwrap();
        assert!(policy.is_none());
    }

    #[test]
    fn test_backend_specs_project_to_route_policies() {
        let provider = fixtures::book_world();
        provider.set_ingress_backend(fixtures::bookstore_service(), backend());
        let catalog = catalog_over(provider);

        let policy = catalog
            .get_ingress_traffic_policy(&fixtures::bookstore_service())
            .unwrap()
            .unwrap();
        assert_eq!(policy.http_route_policies.len(), 2);

        let buy = &policy.http_route_policies[0];
        assert_eq!(buy.route.path_regex, "/buy");
        assert_eq!(buy.host, "bookstore.example.com");
        assert_eq!(
            buy.route.methods,
            MethodMatch::Explicit(vec!["GET".to_string()])
        );
        assert!(
            buy.allowed_principals
                .contains(&ServiceIdentity::new("edge-gateway", "edge"))
        );

        // An absent method list admits every method.
        assert_eq!(policy.http_route_policies[1].route.methods, MethodMatch::Any);
    }
}
