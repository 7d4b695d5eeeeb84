//! Outbound mesh traffic policy
//!
//! One route configuration per authorized upstream, keyed by the upstream's
//! port. Mesh-internal outbound traffic is path-unrestricted once the edge
//! authorizes it; per-path restriction is enforced inbound at the upstream.

use trellis_api::{HttpRouteMatch, OutboundHttpRouteConfig, OutboundMeshTrafficPolicy, ServiceIdentity};

use crate::{CatalogError, MeshCatalog};

impl MeshCatalog {
    /// Routes the given identity may use towards its authorized upstreams
    pub fn get_outbound_mesh_traffic_policy(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<OutboundMeshTrafficPolicy, CatalogError> {
        let account = identity.to_service_account();
        let retry = self
            .provider()
            .list_retry_policies(identity)
            .into_iter()
            .next();

        let mut policy = OutboundMeshTrafficPolicy::default();
        for upstream in self.list_outbound_services_for_identity(identity)? {
            let same_namespace = upstream.namespace == account.namespace;
            let upstream_traffic_setting = self
                .provider()
                .get_upstream_traffic_setting_by_service(&upstream)
                .or_else(|| {
                    self.provider()
                        .get_upstream_traffic_setting_by_namespace(&upstream.namespace)
                });
            let config = OutboundHttpRouteConfig {
                name: upstream.to_string(),
                hostnames: self
                    .provider()
                    .get_hostnames_for_service(&upstream, same_namespace),
                routes: vec![HttpRouteMatch::allow_any()],
                retry: retry.clone(),
                upstream_traffic_setting,
                upstream: upstream.clone(),
            };
            policy
                .route_configs_per_port
                .entry(upstream.target_port)
                .or_default()
                .push(config);
        }
        Ok(policy)
    }
}
