//! Egress traffic policy
//!
//! Routes towards non-mesh destinations, authorized per source identity.
//! One route configuration per (policy, port) pair; a policy without path
//! regexes allows any path towards its hosts.

use trellis_api::{EgressHttpRouteConfig, EgressTrafficPolicy, HttpRouteMatch, MethodMatch, ServiceIdentity};

use crate::{CatalogError, MeshCatalog};

impl MeshCatalog {
    /// Egress routes the given identity may use
    pub fn get_egress_traffic_policy(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<EgressTrafficPolicy, CatalogError> {
        let mut policy = EgressTrafficPolicy::default();
        for spec in self.provider().list_egress_policies(identity)? {
            let routes = if spec.path_regexes.is_empty() {
                vec![HttpRouteMatch::allow_any()]
            } else {
                spec.path_regexes
                    .iter()
                    .map(|path| HttpRouteMatch::new(path, MethodMatch::Any))
                    .collect()
            };
            for port in &spec.ports {
                policy
                    .route_configs_per_port
                    .entry(*port)
                    .or_default()
                    .push(EgressHttpRouteConfig {
                        name: spec.resource_name(),
                        hostnames: spec.hosts.clone(),
                        routes: routes.clone(),
                    });
            }
        }
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use trellis_compute::fake::fixtures;
    use trellis_compute::{EgressPolicySpec, FakeProvider};
    use trellis_proxy::ServiceIdentityMapper;

    use super::*;

    fn catalog_over(provider: FakeProvider) -> MeshCatalog {
        let provider = Arc::new(provider);
        let mapper = Arc::new(ServiceIdentityMapper::new(provider.clone()));
        MeshCatalog::new(provider, mapper)
    }

    fn api_egress() -> EgressPolicySpec {
        EgressPolicySpec {
            name: "external-api".to_string(),
            namespace: fixtures::NAMESPACE.to_string(),
            hosts: vec!["api.example.com".to_string()],
            ports: vec![443, 8443],
            path_regexes: vec!["/v1/.*".to_string()],
        }
    }

    #[test]
    fn test_no_policy_yields_empty_egress() {
        let catalog = catalog_over(fixtures::book_world());
        let policy = catalog
            .get_egress_traffic_policy(&fixtures::bookbuyer_identity())
            .unwrap();
        assert!(policy.is_empty());
    }

    #[test]
    fn test_policy_projects_per_port() {
        let provider = fixtures::book_world();
        provider.add_egress_policy(fixtures::bookbuyer_identity(), api_egress());
        let catalog = catalog_over(provider);

        let policy = catalog
            .get_egress_traffic_policy(&fixtures::bookbuyer_identity())
            .unwrap();
        assert_eq!(policy.route_configs_per_port.len(), 2);
        let config = &policy.route_configs_per_port[&443][0];
        assert_eq!(config.name, "default/external-api");
        assert_eq!(config.hostnames, vec!["api.example.com".to_string()]);
        assert_eq!(config.routes[0].path_regex, "/v1/.*");
    }

    #[test]
    fn test_policy_without_paths_allows_any_path() {
        let provider = fixtures::book_world();
        provider.add_egress_policy(
            fixtures::bookbuyer_identity(),
            EgressPolicySpec {
                path_regexes: vec![],
                ..api_egress()
            },
        );
        let catalog = catalog_over(provider);

        let policy = catalog
            .get_egress_traffic_policy(&fixtures::bookbuyer_identity())
            .unwrap();
        assert_eq!(
            policy.route_configs_per_port[&443][0].routes,
            vec![HttpRouteMatch::allow_any()]
        );
    }

    #[test]
    fn test_policies_are_identity_scoped() {
        let provider = fixtures::book_world();
        provider.add_egress_policy(fixtures::bookbuyer_identity(), api_egress());
        let catalog = catalog_over(provider);

        let policy = catalog
            .get_egress_traffic_policy(&fixtures::bookstore_identity())
            .unwrap();
        assert!(policy.is_empty());
    }
}
