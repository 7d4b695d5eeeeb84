//! Composite compute provider
//!
//! Aggregates several providers behind the single `ComputeProvider` trait.
//! Enumerations concatenate in provider order; point lookups take the first
//! provider that answers. A failing enumeration fails the whole call: the
//! catalog must never present a partial view of a store it cannot list.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use trellis_api::{
    Endpoint, MeshConfig, MeshService, RetryPolicySpec, ServiceIdentity, UpstreamTrafficSetting,
};

use crate::resources::{
    EgressPolicySpec, HttpRouteGroup, IngressBackend, TrafficTargetResource,
};
use crate::{ComputeProvider, ProviderError};

/// Several providers composed behind one interface
pub struct CompositeProvider {
    providers: Vec<Arc<dyn ComputeProvider>>,
}

impl CompositeProvider {
    pub fn new(providers: Vec<Arc<dyn ComputeProvider>>) -> Self {
        Self { providers }
    }

    fn concat<T>(
        &self,
        mut f: impl FnMut(&dyn ComputeProvider) -> Result<Vec<T>, ProviderError>,
    ) -> Result<Vec<T>, ProviderError> {
        let mut out = Vec::new();
        for provider in &self.providers {
            out.extend(f(provider.as_ref())?);
        }
        Ok(out)
    }

    fn first_some<T>(&self, mut f: impl FnMut(&dyn ComputeProvider) -> Option<T>) -> Option<T> {
        self.providers.iter().find_map(|p| f(p.as_ref()))
    }
}

impl ComputeProvider for CompositeProvider {
    fn name(&self) -> &str {
        "composite"
    }

    fn list_services(&self) -> Result<Vec<MeshService>, ProviderError> {
        self.concat(|p| p.list_services())
    }

    fn get_hostnames_for_service(
        &self,
        service: &MeshService,
        same_namespace: bool,
    ) -> Vec<String> {
        // Providers can answer for the same service; keep the first
        // occurrence of each hostname in provider order.
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for provider in &self.providers {
            for hostname in provider.get_hostnames_for_service(service, same_namespace) {
                if seen.insert(hostname.clone()) {
                    out.push(hostname);
                }
            }
        }
        out
    }

    fn list_endpoints_for_service(&self, service: &MeshService) -> Vec<Endpoint> {
        let mut out = Vec::new();
        for provider in &self.providers {
            out.extend(provider.list_endpoints_for_service(service));
        }
        out
    }

    fn get_services_for_service_identity(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<Vec<MeshService>, ProviderError> {
        self.concat(|p| p.get_services_for_service_identity(identity))
    }

    fn list_service_identities_for_service(
        &self,
        service: &MeshService,
    ) -> Result<Vec<ServiceIdentity>, ProviderError> {
        self.concat(|p| p.list_service_identities_for_service(service))
    }

    fn list_traffic_targets(&self) -> Result<Vec<TrafficTargetResource>, ProviderError> {
        self.concat(|p| p.list_traffic_targets())
    }

    fn list_http_route_groups(&self) -> Result<Vec<HttpRouteGroup>, ProviderError> {
        self.concat(|p| p.list_http_route_groups())
    }

    fn get_ingress_backend_policy(&self, service: &MeshService) -> Option<IngressBackend> {
        self.first_some(|p| p.get_ingress_backend_policy(service))
    }

    fn list_egress_policies(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<Vec<EgressPolicySpec>, ProviderError> {
        self.concat(|p| p.list_egress_policies(identity))
    }

    fn list_retry_policies(&self, identity: &ServiceIdentity) -> Vec<RetryPolicySpec> {
        let mut out = Vec::new();
        for provider in &self.providers {
            out.extend(provider.list_retry_policies(identity));
        }
        out
    }

    fn get_upstream_traffic_setting_by_host(&self, host: &str) -> Option<UpstreamTrafficSetting> {
        self.first_some(|p| p.get_upstream_traffic_setting_by_host(host))
    }

    fn get_upstream_traffic_setting_by_namespace(
        &self,
        namespace: &str,
    ) -> Option<UpstreamTrafficSetting> {
        self.first_some(|p| p.get_upstream_traffic_setting_by_namespace(namespace))
    }

    fn get_upstream_traffic_setting_by_service(
        &self,
        service: &MeshService,
    ) -> Option<UpstreamTrafficSetting> {
        self.first_some(|p| p.get_upstream_traffic_setting_by_service(service))
    }

    fn get_mesh_config(&self) -> MeshConfig {
        // The first provider owns mesh-wide configuration.
        self.providers
            .first()
            .map(|p| p.get_mesh_config())
            .unwrap_or_default()
    }

    fn is_metrics_enabled(&self, proxy_uuid: Uuid, identity: &ServiceIdentity) -> bool {
        self.providers
            .iter()
            .any(|p| p.is_metrics_enabled(proxy_uuid, identity))
    }
}
