//! Outbound reachability and endpoint resolution

use std::collections::BTreeSet;

use trellis_api::{Endpoint, MeshService, ServiceIdentity};

use crate::{CatalogError, MeshCatalog};

impl MeshCatalog {
    /// Upstream services the given identity is authorized to reach. Under
    /// permissive traffic policy this is every mesh service; otherwise it is
    /// the union of destinations of policy edges naming the identity as a
    /// source.
    pub fn list_outbound_services_for_identity(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<Vec<MeshService>, CatalogError> {
        if self
            .get_mesh_config()
            .enable_permissive_traffic_policy
        {
            let mut services = self.provider().list_services()?;
            services.sort();
            services.dedup();
            return Ok(services);
        }

        let account = identity.to_service_account();
        let mut upstreams = BTreeSet::new();
        for target in self.provider().list_traffic_targets()? {
            if !target.sources.contains(&account) {
                continue;
            }
            let destination = target.destination.to_service_identity();
            upstreams.extend(
                self.provider()
                    .get_services_for_service_identity(&destination)?,
            );
        }
        Ok(upstreams.into_iter().collect())
    }

    /// Endpoints of `upstream` the identity may connect to. An upstream the
    /// identity is not authorized to reach resolves to no endpoints.
    pub fn list_allowed_upstream_endpoints_for_service(
        &self,
        identity: &ServiceIdentity,
        upstream: &MeshService,
    ) -> Result<Vec<Endpoint>, CatalogError> {
        let allowed = self.list_outbound_services_for_identity(identity)?;
        if !allowed.contains(upstream) {
            return Ok(Vec::new());
        }
        let mut endpoints = self.provider().list_endpoints_for_service(upstream);
        endpoints.sort();
        endpoints.dedup();
        Ok(endpoints)
    }
}
