//! Trellis Catalog - policy aggregation over compute providers
//!
//! The catalog joins service inventory, endpoint inventory and policy objects
//! into identity- and service-scoped answers: what can this proxy reach, and
//! under what rules. It holds no cache of its own - every query is a pure
//! projection of currently-visible provider state, so two calls against
//! unchanged providers are value-identical, element ordering included.
//!
//! Failure policy: a single unresolvable sub-element (a policy edge, a route
//! reference) is dropped and logged with a diagnostic code; a provider that
//! cannot enumerate its backing store at all fails the enclosing call.

mod egress;
mod endpoints;
mod inbound;
mod ingress;
mod outbound;
mod traffic;

use std::collections::BTreeMap;
use std::sync::Arc;

use trellis_api::{MeshConfig, MeshService};
use trellis_common::STATS_HEADER_PREFIX;
use trellis_compute::{ComputeProvider, ProviderError};
use trellis_proxy::{Proxy, ProxyServiceMapper};

/// Error from a catalog query
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// A provider could not enumerate its backing store; the whole query
    /// fails and the caller retries on the next reconciliation cycle.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Aggregates provider data into identity- and service-scoped answers
pub struct MeshCatalog {
    provider: Arc<dyn ComputeProvider>,
    mapper: Arc<dyn ProxyServiceMapper>,
}

impl MeshCatalog {
    pub fn new(provider: Arc<dyn ComputeProvider>, mapper: Arc<dyn ProxyServiceMapper>) -> Self {
        Self { provider, mapper }
    }

    pub(crate) fn provider(&self) -> &dyn ComputeProvider {
        self.provider.as_ref()
    }

    /// Current mesh-wide configuration
    pub fn get_mesh_config(&self) -> MeshConfig {
        self.provider.get_mesh_config()
    }

    /// Services the given proxy fronts
    pub fn list_services_for_proxy(
        &self,
        proxy: &Proxy,
    ) -> Result<Vec<MeshService>, CatalogError> {
        let mut services = self.mapper.list_proxy_services(proxy)?;
        services.sort();
        Ok(services)
    }

    /// Whether metrics collection is enabled for the proxy's workload
    pub fn is_metrics_enabled(&self, proxy: &Proxy) -> bool {
        self.provider
            .is_metrics_enabled(proxy.uuid(), proxy.identity())
    }

    /// Headers identifying the proxy's workload in stats pipelines
    pub fn get_proxy_stats_headers(&self, proxy: &Proxy) -> BTreeMap<String, String> {
        let account = proxy.identity().to_service_account();
        BTreeMap::from([
            (
                format!("{STATS_HEADER_PREFIX}-namespace"),
                account.namespace,
            ),
            (format!("{STATS_HEADER_PREFIX}-workload"), account.name),
            (
                format!("{STATS_HEADER_PREFIX}-kind"),
                proxy.kind().to_string(),
            ),
            (
                format!("{STATS_HEADER_PREFIX}-uuid"),
                proxy.uuid().to_string(),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_compute::fake::fixtures;
    use trellis_proxy::{ProxyKind, ServiceIdentityMapper};
    use uuid::Uuid;

    fn catalog() -> MeshCatalog {
        let provider = Arc::new(fixtures::book_world());
        let mapper = Arc::new(ServiceIdentityMapper::new(provider.clone()));
        MeshCatalog::new(provider, mapper)
    }

    #[test]
    fn test_list_services_for_proxy_is_sorted() {
        let catalog = catalog();
        let proxy = Proxy::new(
            Uuid::new_v4(),
            ProxyKind::Sidecar,
            fixtures::bookstore_identity(),
            "serial",
        );
        let services = catalog.list_services_for_proxy(&proxy).unwrap();
        assert_eq!(
            services,
            vec![fixtures::bookstore_service(), fixtures::bookstore_v2_service()]
        );
    }

    #[test]
    fn test_stats_headers_identify_the_workload() {
        let catalog = catalog();
        let uuid = Uuid::new_v4();
        let proxy = Proxy::new(
            uuid,
            ProxyKind::Sidecar,
            fixtures::bookbuyer_identity(),
            "serial",
        );
        let headers = catalog.get_proxy_stats_headers(&proxy);
        assert_eq!(headers["trellis-stats-namespace"], "default");
        assert_eq!(headers["trellis-stats-workload"], "bookbuyer");
        assert_eq!(headers["trellis-stats-kind"], "sidecar");
        assert_eq!(headers["trellis-stats-uuid"], uuid.to_string());
    }
}
