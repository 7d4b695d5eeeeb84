//! Inbound mesh traffic policy
//!
//! For each service the proxy fronts, the routes in-mesh downstreams may
//! use and the principals allowed on each. Permissive traffic policy
//! replaces the rule set with a single allow-any rule admitting the
//! wildcard principal.

use trellis_api::{
    HttpRouteMatch, InboundHttpRouteConfig, InboundMeshTrafficPolicy, MeshService, Rule,
    ServiceIdentity,
};

use crate::{CatalogError, MeshCatalog};

impl MeshCatalog {
    /// Inbound routes for the services fronted by a proxy with the given
    /// identity. Services with no admitting rule contribute no route
    /// configuration.
    pub fn get_inbound_mesh_traffic_policy(
        &self,
        identity: &ServiceIdentity,
        services: &[MeshService],
    ) -> Result<InboundMeshTrafficPolicy, CatalogError> {
        let permissive = self
            .get_mesh_config()
            .enable_permissive_traffic_policy;

        let mut services = services.to_vec();
        services.sort();
        services.dedup();

        let mut policy = InboundMeshTrafficPolicy::default();
        for service in &services {
            let rules = if permissive {
                vec![Rule {
                    route: HttpRouteMatch::allow_any(),
                    allowed_principals: [ServiceIdentity::wildcard()].into(),
                }]
            } else {
                self.inbound_rules_for_service(identity, service)?
            };
            if rules.is_empty() {
                continue;
            }

            policy
                .route_configs_per_port
                .entry(service.target_port)
                .or_default()
                .push(InboundHttpRouteConfig {
                    name: service.to_string(),
                    hostnames: self.provider().get_hostnames_for_service(service, true),
                    rules,
                });
        }
        Ok(policy)
    }

    /// Rules admitting traffic to one fronted service, grouped by route with
    /// the allowed principals accumulated per route.
    fn inbound_rules_for_service(
        &self,
        identity: &ServiceIdentity,
        service: &MeshService,
    ) -> Result<Vec<Rule>, CatalogError> {
        let mut rules: Vec<Rule> = Vec::new();
        for policy in self.list_traffic_policies(service)? {
            if policy.destination != *identity {
                continue;
            }
            match rules.iter_mut().find(|r| r.route == policy.route) {
                Some(rule) => {
                    rule.allowed_principals.insert(policy.source);
                }
                None => rules.push(Rule {
                    route: policy.route,
                    allowed_principals: [policy.source].into(),
                }),
            }
        }
        rules.sort();
        Ok(rules)
    }
}
