//! Traffic target resolution
//!
//! Joins raw policy edges against flattened route groups. The flattened map
//! is keyed `<kind>/<namespace>/<group>/<match>`; a reference that misses the
//! map drops only that reference, an edge whose destination principal backs
//! no service drops only that edge. Both drops are logged with a diagnostic
//! code, and the enclosing query still succeeds.

use std::collections::BTreeMap;

use tracing::warn;

use trellis_api::{HttpRouteMatch, MeshService, MethodMatch, TrafficTarget};
use trellis_common::codes;
use trellis_compute::HttpRouteGroup;

use crate::{CatalogError, MeshCatalog};

/// Key of one flattened route-group match. Key tokens are `/`-delimited, so
/// a token containing the delimiter is rejected outright rather than left to
/// collide with a differently split group/match pair.
pub(crate) fn route_match_key(
    kind: &str,
    namespace: &str,
    group: &str,
    match_name: &str,
) -> Option<String> {
    if [namespace, group, match_name].iter().any(|t| t.contains('/')) {
        return None;
    }
    Some(format!("{kind}/{namespace}/{group}/{match_name}"))
}

impl MeshCatalog {
    /// Policy edges whose destination principal backs `service`, with route
    /// references resolved to concrete route matches. One edge per
    /// (source, destination, route) combination.
    pub fn list_traffic_policies(
        &self,
        service: &MeshService,
    ) -> Result<Vec<TrafficTarget>, CatalogError> {
        let routes = self.http_paths_per_route()?;
        let targets = self.provider().list_traffic_targets()?;

        let mut policies = Vec::new();
        for target in targets {
            let destination = target.destination.to_service_identity();
            let backed = self
                .provider()
                .get_services_for_service_identity(&destination)?;
            if backed.is_empty() {
                warn!(
                    code = %codes::POLICY_EDGE_UNRESOLVED,
                    traffic_target = %target.name,
                    destination = %destination,
                    "Destination principal backs no service; dropping policy edge"
                );
                continue;
            }
            if !backed.contains(service) {
                continue;
            }

            let resolved = if target.route_refs.is_empty() {
                // An edge without route references authorizes all traffic
                // between its principals.
                vec![HttpRouteMatch::allow_any()]
            } else {
                let mut resolved = Vec::new();
                for route_ref in &target.route_refs {
                    for match_name in &route_ref.matches {
                        let Some(key) = route_match_key(
                            &route_ref.kind,
                            &target.namespace,
                            &route_ref.name,
                            match_name,
                        ) else {
                            warn!(
                                code = %codes::MALFORMED_RESOURCE_NAME,
                                traffic_target = %target.name,
                                route_group = %route_ref.name,
                                route_match = %match_name,
                                "Route reference token contains '/'; skipping"
                            );
                            continue;
                        };
                        match routes.get(&key) {
                            Some(route) => resolved.push(route.clone()),
                            None => warn!(
                                code = %codes::ROUTE_REF_NOT_FOUND,
                                traffic_target = %target.name,
                                route_key = %key,
                                "Route reference has no matching entry; skipping"
                            ),
                        }
                    }
                }
                resolved
            };

            for source in &target.sources {
                for route in &resolved {
                    policies.push(TrafficTarget {
                        name: target.name.clone(),
                        source: source.to_service_identity(),
                        destination: destination.clone(),
                        route: route.clone(),
                    });
                }
            }
        }

        policies.sort();
        policies.dedup();
        Ok(policies)
    }

    /// Flatten every route group into a map keyed
    /// `<kind>/<namespace>/<group>/<match>`. A host constraint surfaces as
    /// the `host` header; an absent method list matches every method.
    pub(crate) fn http_paths_per_route(
        &self,
    ) -> Result<BTreeMap<String, HttpRouteMatch>, CatalogError> {
        let mut routes = BTreeMap::new();
        for group in self.provider().list_http_route_groups()? {
            for m in &group.matches {
                let Some(key) =
                    route_match_key(HttpRouteGroup::KIND, &group.namespace, &group.name, &m.name)
                else {
                    warn!(
                        code = %codes::MALFORMED_RESOURCE_NAME,
                        namespace = %group.namespace,
                        route_group = %group.name,
                        route_match = %m.name,
                        "Route group token contains '/'; skipping match"
                    );
                    continue;
                };
                let methods = if m.methods.is_empty() {
                    MethodMatch::Any
                } else {
                    MethodMatch::Explicit(m.methods.clone())
                };
                let mut route = HttpRouteMatch::new(&m.path_regex, methods);
                route.headers = m.headers.clone();
                if let Some(host) = &m.host {
                    route.headers.insert("host".to_string(), host.clone());
                }
                routes.insert(key, route);
            }
        }
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use trellis_compute::fake::fixtures;
    use trellis_compute::{FakeProvider, RouteGroupRef};
    use trellis_proxy::ServiceIdentityMapper;

    use super::*;

    fn catalog_over(provider: FakeProvider) -> MeshCatalog {
        let provider = Arc::new(provider);
        let mapper = Arc::new(ServiceIdentityMapper::new(provider.clone()));
        MeshCatalog::new(provider, mapper)
    }

    #[test]
    fn test_edge_without_route_refs_allows_all_traffic() {
        let catalog = catalog_over(fixtures::book_world());
        let policies = catalog
            .list_traffic_policies(&fixtures::bookstore_service())
            .unwrap();

        assert_eq!(policies.len(), 1);
        let policy = &policies[0];
        assert_eq!(policy.name, fixtures::TRAFFIC_TARGET_NAME);
        assert_eq!(policy.source, fixtures::bookbuyer_identity());
        assert_eq!(policy.destination, fixtures::bookstore_identity());
        assert_eq!(policy.route, HttpRouteMatch::allow_any());
    }

    #[test]
    fn test_route_refs_resolve_against_flattened_groups() {
        let provider = fixtures::book_world();
        provider.add_traffic_target(trellis_compute::TrafficTargetResource {
            name: "with-routes".to_string(),
            route_refs: vec![RouteGroupRef {
                kind: HttpRouteGroup::KIND.to_string(),
                name: fixtures::ROUTE_GROUP_NAME.to_string(),
                matches: vec![
                    fixtures::BUY_MATCH_NAME.to_string(),
                    fixtures::SELL_MATCH_NAME.to_string(),
                ],
            }],
            ..fixtures::traffic_target(vec![])
        });
        let catalog = catalog_over(provider);

        let policies = catalog
            .list_traffic_policies(&fixtures::bookstore_service())
            .unwrap();
        let with_routes: Vec<_> = policies.iter().filter(|p| p.name == "with-routes").collect();
        assert_eq!(with_routes.len(), 2);

        let buy = with_routes
            .iter()
            .find(|p| p.route.path_regex == fixtures::BUY_PATH)
            .unwrap();
        assert_eq!(
            buy.route.methods,
            MethodMatch::Explicit(vec!["GET".to_string()])
        );
        assert_eq!(buy.route.headers["host"], fixtures::DOMAIN);

        let sell = with_routes
            .iter()
            .find(|p| p.route.path_regex == fixtures::SELL_PATH)
            .unwrap();
        assert!(sell.route.headers.is_empty());
    }

    #[test]
    fn test_missing_route_ref_drops_only_that_reference() {
        let provider = fixtures::book_world();
        provider.add_traffic_target(trellis_compute::TrafficTargetResource {
            name: "partially-resolvable".to_string(),
            route_refs: vec![RouteGroupRef {
                kind: HttpRouteGroup::KIND.to_string(),
                name: fixtures::ROUTE_GROUP_NAME.to_string(),
                matches: vec![fixtures::BUY_MATCH_NAME.to_string(), "no-such".to_string()],
            }],
            ..fixtures::traffic_target(vec![])
        });
        let catalog = catalog_over(provider);

        let policies = catalog
            .list_traffic_policies(&fixtures::bookstore_service())
            .unwrap();
        let resolved: Vec<_> = policies
            .iter()
            .filter(|p| p.name == "partially-resolvable")
            .collect();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].route.path_regex, fixtures::BUY_PATH);
    }

    #[test]
    fn test_unresolvable_destination_drops_edge_not_query() {
        let provider = fixtures::book_world();
        provider.add_traffic_target(trellis_compute::TrafficTargetResource {
            destination: trellis_api::ServiceAccount::new("ghost", "nowhere"),
            ..fixtures::traffic_target(vec![])
        });
        let catalog = catalog_over(provider);

        let policies = catalog
            .list_traffic_policies(&fixtures::bookstore_service())
            .unwrap();
        assert_eq!(policies.len(), 1);
    }

    #[test]
    fn test_provider_enumeration_failure_fails_query() {
        let provider = fixtures::book_world();
        provider.fail_enumerations("connection refused");
        let catalog = catalog_over(provider);
        assert!(
            catalog
                .list_traffic_policies(&fixtures::bookstore_service())
                .is_err()
        );
    }

    #[test]
    fn test_repeated_queries_are_value_identical() {
        let catalog = catalog_over(fixtures::book_world());
        let first = catalog
            .list_traffic_policies(&fixtures::bookstore_service())
            .unwrap();
        let second = catalog
            .list_traffic_policies(&fixtures::bookstore_service())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_flattened_routes_carry_host_as_header() {
        let catalog = catalog_over(fixtures::book_world());
        let routes = catalog.http_paths_per_route().unwrap();

        let buy_key = route_match_key(
            HttpRouteGroup::KIND,
            fixtures::NAMESPACE,
            fixtures::ROUTE_GROUP_NAME,
            fixtures::BUY_MATCH_NAME,
        )
        .unwrap();
        assert_eq!(buy_key, "HTTPRouteGroup/default/bookstore-service-routes/buy");
        let buy = &routes[&buy_key];
        assert_eq!(buy.path_regex, fixtures::BUY_PATH);
        assert_eq!(buy.headers["host"], fixtures::DOMAIN);

        let sell_key = route_match_key(
            HttpRouteGroup::KIND,
            fixtures::NAMESPACE,
            fixtures::ROUTE_GROUP_NAME,
            fixtures::SELL_MATCH_NAME,
        )
        .unwrap();
        assert!(routes[&sell_key].headers.is_empty());
    }

    #[test]
    fn test_route_match_keys_cannot_collide_across_distinct_names() {
        let a = route_match_key(HttpRouteGroup::KIND, "default", "group-a", "buy").unwrap();
        let b = route_match_key(HttpRouteGroup::KIND, "default", "group", "a-buy").unwrap();
        assert_ne!(a, b);

        // Names embedding the delimiter cannot be keyed at all, so
        // ("a", "b/c") can never alias ("a/b", "c").
        assert!(route_match_key(HttpRouteGroup::KIND, "default", "a", "b/c").is_none());
        assert!(route_match_key(HttpRouteGroup::KIND, "default", "a/b", "c").is_none());
        assert!(route_match_key(HttpRouteGroup::KIND, "def/ault", "a", "b").is_none());
    }

    #[test]
    fn test_slash_bearing_route_group_match_is_dropped() {
        let provider = fixtures::book_world();
        provider.add_route_group(trellis_compute::HttpRouteGroup {
            namespace: fixtures::NAMESPACE.to_string(),
            name: "odd-group".to_string(),
            matches: vec![trellis_compute::HttpMatch {
                name: "odd/match".to_string(),
                path_regex: "/odd".to_string(),
                methods: vec![],
                headers: Default::default(),
                host: None,
            }],
        });
        let catalog = catalog_over(provider);

        let routes = catalog.http_paths_per_route().unwrap();
        assert!(!routes.values().any(|r| r.path_regex == "/odd"));
        // The well-formed groups are unaffected.
        assert!(!routes.is_empty());
    }
}
