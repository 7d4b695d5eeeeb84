//! Trellis Compute - pluggable data sources for the mesh catalog
//!
//! A compute provider exposes service, endpoint and policy facts from some
//! backing store (a Kubernetes-style API, an explicit inventory, a test
//! fixture). The catalog never touches a backing store directly; it only
//! calls this interface. Several providers compose behind the same trait via
//! `CompositeProvider` - no dynamic type inspection anywhere.

pub mod composite;
pub mod fake;
pub mod resources;

pub use composite::CompositeProvider;
pub use fake::FakeProvider;
pub use resources::{
    EgressPolicySpec, HttpMatch, HttpRouteGroup, IngressBackend, IngressBackendSpec,
    RouteGroupRef, TrafficTargetResource,
};

use trellis_api::{
    Endpoint, MeshConfig, MeshService, RetryPolicySpec, ServiceIdentity, UpstreamTrafficSetting,
};
use uuid::Uuid;

/// A provider enumeration failed outright: the backing store could not be
/// listed. Callers treat this as a hard error for the enclosing query; the
/// next reconciliation cycle retries.
#[derive(thiserror::Error, Debug, Clone)]
#[error("compute provider '{provider}' unavailable: {reason}")]
pub struct ProviderError {
    pub provider: String,
    pub reason: String,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Capability set every compute provider implements.
///
/// Enumerations return `Result`: failure to list a backing store is a hard
/// error. Point lookups return `Option` or an empty collection: "no policy"
/// means the feature is inapplicable, which is not an error.
pub trait ComputeProvider: Send + Sync {
    /// Provider name for diagnostics
    fn name(&self) -> &str;

    /// All services participating in the mesh
    fn list_services(&self) -> Result<Vec<MeshService>, ProviderError>;

    /// Hostnames clients may use to address `service`. When `same_namespace`
    /// is true the short, namespace-local names are included.
    fn get_hostnames_for_service(&self, service: &MeshService, same_namespace: bool)
    -> Vec<String>;

    /// Reachable endpoints backing `service`
    fn list_endpoints_for_service(&self, service: &MeshService) -> Vec<Endpoint>;

    /// Services a principal's workloads are registered behind
    fn get_services_for_service_identity(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<Vec<MeshService>, ProviderError>;

    /// Principals whose workloads back `service`
    fn list_service_identities_for_service(
        &self,
        service: &MeshService,
    ) -> Result<Vec<ServiceIdentity>, ProviderError>;

    /// Raw traffic-target policy edges
    fn list_traffic_targets(&self) -> Result<Vec<resources::TrafficTargetResource>, ProviderError>;

    /// Raw HTTP route groups referenced by traffic targets
    fn list_http_route_groups(&self) -> Result<Vec<resources::HttpRouteGroup>, ProviderError>;

    /// Ingress policy admitting external traffic to `service`, if any
    fn get_ingress_backend_policy(&self, service: &MeshService)
    -> Option<resources::IngressBackend>;

    /// Egress policies applying to `identity`
    fn list_egress_policies(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<Vec<resources::EgressPolicySpec>, ProviderError>;

    /// Retry policies applying to `identity`
    fn list_retry_policies(&self, identity: &ServiceIdentity) -> Vec<RetryPolicySpec>;

    /// Upstream traffic setting keyed by external host
    fn get_upstream_traffic_setting_by_host(&self, host: &str) -> Option<UpstreamTrafficSetting>;

    /// Upstream traffic setting keyed by namespace
    fn get_upstream_traffic_setting_by_namespace(
        &self,
        namespace: &str,
    ) -> Option<UpstreamTrafficSetting>;

    /// Upstream traffic setting keyed by mesh service
    fn get_upstream_traffic_setting_by_service(
        &self,
        service: &MeshService,
    ) -> Option<UpstreamTrafficSetting>;

    /// Current mesh-wide configuration
    fn get_mesh_config(&self) -> MeshConfig;

    /// Whether metrics collection is enabled for the given proxy workload
    fn is_metrics_enabled(&self, proxy_uuid: Uuid, identity: &ServiceIdentity) -> bool;
}
