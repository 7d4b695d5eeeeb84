//! Route discovery responses
//!
//! Four route configuration groups, each present only when it has content:
//! - `rds-inbound.<port>` - routes the proxy's services accept from in-mesh
//!   downstreams, with the allowed principals on each rule
//! - `rds-outbound.<port>` - routes towards authorized upstreams
//! - `rds-ingress` - externally admitted routes, merged across the proxy's
//!   services on the `(path_regex, host)` key
//! - `rds-egress.<port>` - routes towards non-mesh destinations
//!
//! An ingress fetch failure skips that service; an egress fetch failure is
//! downgraded to "no egress configuration". Either way the response is still
//! produced. Failure to resolve the proxy's own service list fails the
//! whole response.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, warn};

use trellis_api::{
    IngressHttpRoutePolicy, ResourceType, merge_ingress_policies,
};
use trellis_catalog::MeshCatalog;
use trellis_common::codes;
use trellis_proxy::Proxy;

use crate::types::{ResourceData, RouteConfiguration, RouteEntry, VirtualHost};
use crate::{ResponseBuilder, ResponseError};

/// Builds route configurations for a proxy
pub struct RouteResponseBuilder {
    catalog: Arc<MeshCatalog>,
}

impl RouteResponseBuilder {
    pub fn new(catalog: Arc<MeshCatalog>) -> Self {
        Self { catalog }
    }

    fn inbound_resources(&self, proxy: &Proxy) -> Result<Vec<ResourceData>, ResponseError> {
        let services = self.catalog.list_services_for_proxy(proxy).map_err(|e| {
            error!(
                code = %codes::FETCHING_SERVICE_LIST,
                proxy = %proxy,
                error = %e,
                "Failed to list services for proxy"
            );
            e
        })?;

        let inbound = self
            .catalog
            .get_inbound_mesh_traffic_policy(proxy.identity(), &services)?;

        let config = self.catalog.get_mesh_config();
        let stats_headers = if config.enable_wasm_stats && self.catalog.is_metrics_enabled(proxy) {
            self.catalog.get_proxy_stats_headers(proxy)
        } else {
            BTreeMap::new()
        };

        let mut resources = Vec::new();
        for (port, configs) in &inbound.route_configs_per_port {
            let virtual_hosts = configs
                .iter()
                .map(|cfg| VirtualHost {
                    name: format!("inbound_virtual-host|{}", cfg.name),
                    domains: cfg.hostnames.clone(),
                    routes: cfg
                        .rules
                        .iter()
                        .map(|rule| RouteEntry {
                            route: rule.route.clone(),
                            allowed_principals: rule.allowed_principals.clone(),
                            cluster: Some(format!("{}|local", cfg.name)),
                            retry: None,
                        })
                        .collect(),
                })
                .collect();
            let name = format!("rds-inbound.{port}");
            resources.push(ResourceData::encode(
                &name,
                &RouteConfiguration {
                    name: name.clone(),
                    virtual_hosts,
                    response_headers_to_add: stats_headers.clone(),
                },
            )?);
        }
        Ok(resources)
    }

    fn outbound_resources(&self, proxy: &Proxy) -> Result<Vec<ResourceData>, ResponseError> {
        let outbound = self
            .catalog
            .get_outbound_mesh_traffic_policy(proxy.identity())?;

        let mut resources = Vec::new();
        for (port, configs) in &outbound.route_configs_per_port {
            let virtual_hosts = configs
                .iter()
                .map(|cfg| VirtualHost {
                    name: format!("outbound_virtual-host|{}", cfg.name),
                    domains: cfg.hostnames.clone(),
                    routes: cfg
                        .routes
                        .iter()
                        .map(|route| RouteEntry {
                            route: route.clone(),
                            allowed_principals: Default::default(),
                            cluster: Some(cfg.name.clone()),
                            retry: cfg.retry.clone(),
                        })
                        .collect(),
                })
                .collect();
            let name = format!("rds-outbound.{port}");
            resources.push(ResourceData::encode(
                &name,
                &RouteConfiguration {
                    name: name.clone(),
                    virtual_hosts,
                    response_headers_to_add: BTreeMap::new(),
                },
            )?);
        }
        Ok(resources)
    }

    fn ingress_resource(&self, proxy: &Proxy) -> Result<Option<ResourceData>, ResponseError> {
        let services = self.catalog.list_services_for_proxy(proxy)?;

        let mut merged: Vec<IngressHttpRoutePolicy> = Vec::new();
        for service in &services {
            match self.catalog.get_ingress_traffic_policy(service) {
                Ok(Some(policy)) => {
                    merged = merge_ingress_policies(merged, policy.http_route_policies);
                }
                Ok(None) => {}
                Err(e) => warn!(
                    code = %codes::INGRESS_POLICY_FETCH,
                    proxy = %proxy,
                    service = %service,
                    error = %e,
                    "Skipping service in ingress route configuration"
                ),
            }
        }
        if merged.is_empty() {
            return Ok(None);
        }

        let mut per_host: BTreeMap<String, Vec<RouteEntry>> = BTreeMap::new();
        for policy in merged {
            per_host.entry(policy.host).or_default().push(RouteEntry {
                route: policy.route,
                allowed_principals: policy.allowed_principals,
                cluster: None,
                retry: None,
            });
        }
        let virtual_hosts = per_host
            .into_iter()
            .map(|(host, routes)| VirtualHost {
                name: format!("ingress_virtual-host|{host}"),
                domains: vec![host],
                routes,
            })
            .collect();

        Ok(Some(ResourceData::encode(
            "rds-ingress",
            &RouteConfiguration {
                name: "rds-ingress".to_string(),
                virtual_hosts,
                response_headers_to_add: BTreeMap::new(),
            },
        )?))
    }

    fn egress_resources(&self, proxy: &Proxy) -> Result<Vec<ResourceData>, ResponseError> {
        let egress = match self.catalog.get_egress_traffic_policy(proxy.identity()) {
            Ok(policy) => policy,
            Err(e) => {
                // Absent egress configuration only blocks external traffic;
                // the rest of the response still stands.
                warn!(
                    code = %codes::EGRESS_POLICY_FETCH,
                    proxy = %proxy,
                    error = %e,
                    "Treating as no egress configuration"
                );
                return Ok(Vec::new());
            }
        };

        let mut resources = Vec::new();
        for (port, configs) in &egress.route_configs_per_port {
            let virtual_hosts = configs
                .iter()
                .map(|cfg| VirtualHost {
                    name: format!("egress_virtual-host|{}", cfg.name),
                    domains: cfg.hostnames.clone(),
                    routes: cfg
                        .routes
                        .iter()
                        .map(|route| RouteEntry {
                            route: route.clone(),
                            allowed_principals: Default::default(),
                            cluster: None,
                            retry: None,
                        })
                        .collect(),
                })
                .collect();
            let name = format!("rds-egress.{port}");
            resources.push(ResourceData::encode(
                &name,
                &RouteConfiguration {
                    name: name.clone(),
                    virtual_hosts,
                    response_headers_to_add: BTreeMap::new(),
                },
            )?);
        }
        Ok(resources)
    }
}

impl ResponseBuilder for RouteResponseBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Route
    }

    /// Route configurations are always rebuilt in full; a name list on the
    /// request only records the subscription, it does not narrow the build.
    fn build(
        &self,
        proxy: &Proxy,
        _requested: Option<&[String]>,
    ) -> Result<Vec<ResourceData>, ResponseError> {
        let mut resources = self.inbound_resources(proxy)?;
        resources.extend(self.outbound_resources(proxy)?);
        if let Some(ingress) = self.ingress_resource(proxy)? {
            resources.push(ingress);
        }
        resources.extend(self.egress_resources(proxy)?);
        Ok(resources)
    }
}
