//! In-memory compute provider
//!
//! Backs catalog, builder and dispatcher tests with a fully scripted store.
//! Mutators take `&self`; the provider is internally synchronized like any
//! real implementation.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use uuid::Uuid;

use trellis_api::{
    Endpoint, MeshConfig, MeshService, RetryPolicySpec, ServiceIdentity, UpstreamTrafficSetting,
};

use crate::resources::{
    EgressPolicySpec, HttpRouteGroup, IngressBackend, TrafficTargetResource,
};
use crate::{ComputeProvider, ProviderError};

#[derive(Default)]
struct Inner {
    services: Vec<MeshService>,
    endpoints: BTreeMap<MeshService, Vec<Endpoint>>,
    identities_for_service: BTreeMap<MeshService, Vec<ServiceIdentity>>,
    services_for_identity: BTreeMap<ServiceIdentity, Vec<MeshService>>,
    traffic_targets: Vec<TrafficTargetResource>,
    route_groups: Vec<HttpRouteGroup>,
    ingress: BTreeMap<MeshService, IngressBackend>,
    egress: BTreeMap<ServiceIdentity, Vec<EgressPolicySpec>>,
    retry: BTreeMap<ServiceIdentity, Vec<RetryPolicySpec>>,
    settings_by_host: BTreeMap<String, UpstreamTrafficSetting>,
    settings_by_namespace: BTreeMap<String, UpstreamTrafficSetting>,
    settings_by_service: BTreeMap<MeshService, UpstreamTrafficSetting>,
    mesh_config: MeshConfig,
    metrics_enabled: bool,
    fail_reason: Option<String>,
}

/// Scripted provider for tests
pub struct FakeProvider {
    name: String,
    inner: RwLock<Inner>,
}

impl FakeProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register a service and its endpoints
    pub fn add_service(&self, service: MeshService, endpoints: Vec<Endpoint>) {
        let mut inner = self.inner.write();
        inner.endpoints.insert(service.clone(), endpoints);
        inner.services.push(service);
    }

    /// Bind an identity to the services its workloads back
    pub fn link_identity(&self, identity: ServiceIdentity, services: Vec<MeshService>) {
        let mut inner = self.inner.write();
        for svc in &services {
            inner
                .identities_for_service
                .entry(svc.clone())
                .or_default()
                .push(identity.clone());
        }
        inner.services_for_identity.insert(identity, services);
    }

    pub fn add_traffic_target(&self, target: TrafficTargetResource) {
        self.inner.write().traffic_targets.push(target);
    }

    pub fn add_route_group(&self, group: HttpRouteGroup) {
        self.inner.write().route_groups.push(group);
    }

    pub fn set_ingress_backend(&self, service: MeshService, backend: IngressBackend) {
        self.inner.write().ingress.insert(service, backend);
    }

    pub fn add_egress_policy(&self, identity: ServiceIdentity, policy: EgressPolicySpec) {
        self.inner.write().egress.entry(identity).or_default().push(policy);
    }

    pub fn add_retry_policy(&self, identity: ServiceIdentity, policy: RetryPolicySpec) {
        self.inner.write().retry.entry(identity).or_default().push(policy);
    }

    pub fn set_upstream_traffic_setting_by_host(&self, setting: UpstreamTrafficSetting) {
        self.inner
            .write()
            .settings_by_host
            .insert(setting.host.clone(), setting);
    }

    pub fn set_upstream_traffic_setting_by_namespace(
        &self,
        namespace: impl Into<String>,
        setting: UpstreamTrafficSetting,
    ) {
        self.inner
            .write()
            .settings_by_namespace
            .insert(namespace.into(), setting);
    }

    pub fn set_upstream_traffic_setting_by_service(
        &self,
        service: MeshService,
        setting: UpstreamTrafficSetting,
    ) {
        self.inner
            .write()
            .settings_by_service
            .insert(service, setting);
    }

    pub fn set_mesh_config(&self, config: MeshConfig) {
        self.inner.write().mesh_config = config;
    }

    pub fn set_metrics_enabled(&self, enabled: bool) {
        self.inner.write().metrics_enabled = enabled;
    }

    /// Make every enumeration fail, simulating an unreachable backing store
    pub fn fail_enumerations(&self, reason: impl Into<String>) {
        self.inner.write().fail_reason = Some(reason.into());
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        match &self.inner.read().fail_reason {
            Some(reason) => Err(ProviderError::new(&self.name, reason)),
            None => Ok(()),
        }
    }
}

impl ComputeProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_services(&self) -> Result<Vec<MeshService>, ProviderError> {
        self.check_available()?;
        Ok(self.inner.read().services.clone())
    }

    fn get_hostnames_for_service(
        &self,
        service: &MeshService,
        same_namespace: bool,
    ) -> Vec<String> {
        let name = match &service.subdomain {
            Some(sub) => format!("{}.{}", sub, service.name),
            None => service.name.clone(),
        };
        let port = service.target_port;
        let mut hostnames = Vec::new();
        if same_namespace {
            hostnames.push(name.clone());
            hostnames.push(format!("{name}:{port}"));
        }
        hostnames.push(format!("{name}.{}", service.namespace));
        hostnames.push(format!("{name}.{}:{port}", service.namespace));
        hostnames.push(format!("{name}.{}.svc.cluster.local", service.namespace));
        hostnames.push(format!("{name}.{}.svc.cluster.local:{port}", service.namespace));
        hostnames
    }

    fn list_endpoints_for_service(&self, service: &MeshService) -> Vec<Endpoint> {
        self.inner
            .read()
            .endpoints
            .get(service)
            .cloned()
            .unwrap_or_default()
    }

    fn get_services_for_service_identity(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<Vec<MeshService>, ProviderError> {
        self.check_available()?;
        Ok(self
            .inner
            .read()
            .services_for_identity
            .get(identity)
            .cloned()
            .unwrap_or_default())
    }

    fn list_service_identities_for_service(
        &self,
        service: &MeshService,
    ) -> Result<Vec<ServiceIdentity>, ProviderError> {
        self.check_available()?;
        Ok(self
            .inner
            .read()
            .identities_for_service
            .get(service)
            .cloned()
            .unwrap_or_default())
    }

    fn list_traffic_targets(&self) -> Result<Vec<TrafficTargetResource>, ProviderError> {
        self.check_available()?;
        Ok(self.inner.read().traffic_targets.clone())
    }

    fn list_http_route_groups(&self) -> Result<Vec<HttpRouteGroup>, ProviderError> {
        self.check_available()?;
        Ok(self.inner.read().route_groups.clone())
    }

    fn get_ingress_backend_policy(&self, service: &MeshService) -> Option<IngressBackend> {
        self.inner.read().ingress.get(service).cloned()
    }

    fn list_egress_policies(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<Vec<EgressPolicySpec>, ProviderError> {
        self.check_available()?;
        Ok(self
            .inner
            .read()
            .egress
            .get(identity)
            .cloned()
            .unwrap_or_default())
    }

    fn list_retry_policies(&self, identity: &ServiceIdentity) -> Vec<RetryPolicySpec> {
        self.inner
            .read()
            .retry
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    fn get_upstream_traffic_setting_by_host(&self, host: &str) -> Option<UpstreamTrafficSetting> {
        self.inner.read().settings_by_host.get(host).cloned()
    }

    fn get_upstream_traffic_setting_by_namespace(
        &self,
        namespace: &str,
    ) -> Option<UpstreamTrafficSetting> {
        self.inner.read().settings_by_namespace.get(namespace).cloned()
    }

    fn get_upstream_traffic_setting_by_service(
        &self,
        service: &MeshService,
    ) -> Option<UpstreamTrafficSetting> {
        self.inner.read().settings_by_service.get(service).cloned()
    }

    fn get_mesh_config(&self) -> MeshConfig {
        self.inner.read().mesh_config
    }

    fn is_metrics_enabled(&self, _proxy_uuid: Uuid, _identity: &ServiceIdentity) -> bool {
        self.inner.read().metrics_enabled
    }
}

/// Canonical bookbuyer/bookstore scenario shared by catalog and builder tests
pub mod fixtures {
    use std::collections::BTreeMap;

    use trellis_api::{Endpoint, MeshService, ServiceAccount, ServiceIdentity};

    use crate::resources::{
        HttpMatch, HttpRouteGroup, RouteGroupRef, TrafficTargetResource,
    };

    use super::FakeProvider;

    pub const NAMESPACE: &str = "default";
    pub const TRAFFIC_TARGET_NAME: &str = "bookbuyer-access-bookstore";
    pub const ROUTE_GROUP_NAME: &str = "bookstore-service-routes";
    pub const BUY_MATCH_NAME: &str = "buy";
    pub const SELL_MATCH_NAME: &str = "sell";
    pub const BUY_PATH: &str = "/buy";
    pub const SELL_PATH: &str = "/sell";
    pub const DOMAIN: &str = "example.com";

    pub fn bookstore_service() -> MeshService {
        MeshService::new(NAMESPACE, "bookstore", 8080)
    }

    pub fn bookstore_v2_service() -> MeshService {
        MeshService::new(NAMESPACE, "bookstore-v2", 8080)
    }

    pub fn bookbuyer_service() -> MeshService {
        MeshService::new(NAMESPACE, "bookbuyer", 8080)
    }

    pub fn bookstore_identity() -> ServiceIdentity {
        ServiceIdentity::new("bookstore", NAMESPACE)
    }

    pub fn bookbuyer_identity() -> ServiceIdentity {
        ServiceIdentity::new("bookbuyer", NAMESPACE)
    }

    pub fn bookstore_endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::new("10.0.0.10".parse().unwrap(), 8080),
            Endpoint::new("10.0.0.11".parse().unwrap(), 8080),
        ]
    }

    pub fn route_group() -> HttpRouteGroup {
        HttpRouteGroup {
            namespace: NAMESPACE.to_string(),
            name: ROUTE_GROUP_NAME.to_string(),
            matches: vec![
                HttpMatch {
                    name: BUY_MATCH_NAME.to_string(),
                    path_regex: BUY_PATH.to_string(),
                    methods: vec!["GET".to_string()],
                    headers: BTreeMap::new(),
                    host: Some(DOMAIN.to_string()),
                },
                HttpMatch {
                    name: SELL_MATCH_NAME.to_string(),
                    path_regex: SELL_PATH.to_string(),
                    methods: vec!["GET".to_string()],
                    headers: BTreeMap::new(),
                    host: None,
                },
            ],
        }
    }

    pub fn traffic_target(route_refs: Vec<RouteGroupRef>) -> TrafficTargetResource {
        TrafficTargetResource {
            name: TRAFFIC_TARGET_NAME.to_string(),
            namespace: NAMESPACE.to_string(),
            destination: ServiceAccount::new("bookstore", NAMESPACE),
            sources: vec![ServiceAccount::new("bookbuyer", NAMESPACE)],
            route_refs,
        }
    }

    /// Provider with bookbuyer allowed to reach bookstore, no route refs
    pub fn book_world() -> FakeProvider {
        let provider = FakeProvider::new("fixture");
        provider.add_service(bookstore_service(), bookstore_endpoints());
        provider.add_service(bookstore_v2_service(), vec![]);
        provider.add_service(bookbuyer_service(), vec![
            Endpoint::new("10.0.0.1".parse().unwrap(), 8080),
        ]);
        provider.link_identity(
            bookstore_identity(),
            vec![bookstore_service(), bookstore_v2_service()],
        );
        provider.link_identity(bookbuyer_identity(), vec![bookbuyer_service()]);
        provider.add_traffic_target(traffic_target(vec![]));
        provider.add_route_group(route_group());
        provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::*;

    #[test]
    fn test_fake_provider_scripts_services() {
        let provider = book_world();
        let services = provider.list_services().unwrap();
        assert_eq!(services.len(), 3);
        assert_eq!(
            provider.list_endpoints_for_service(&bookstore_service()).len(),
            2
        );
    }

    #[test]
    fn test_fail_enumerations_is_hard_error() {
        let provider = book_world();
        provider.fail_enumerations("connection refused");
        assert!(provider.list_services().is_err());
        assert!(provider.list_traffic_targets().is_err());
        // Point lookups still answer from whatever is cached locally.
        assert!(!provider.list_endpoints_for_service(&bookstore_service()).is_empty());
    }

    #[test]
    fn test_hostnames_include_short_names_only_in_namespace() {
        let provider = book_world();
        let same_ns = provider.get_hostnames_for_service(&bookstore_service(), true);
        assert!(same_ns.contains(&"bookstore".to_string()));
        let cross_ns = provider.get_hostnames_for_service(&bookstore_service(), false);
        assert!(!cross_ns.contains(&"bookstore".to_string()));
        assert!(cross_ns.contains(&"bookstore.default.svc.cluster.local:8080".to_string()));
    }
}
