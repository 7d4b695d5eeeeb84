//! Proxy to owned-services mapping
//!
//! Ownership is either implicit (the proxy's identity selects the services
//! its workload backs, via the compute provider) or explicit (a fixed
//! assignment, used by tests and alternate deployment modes). The registry
//! holds one mapper, chosen at construction.

use std::sync::Arc;

use trellis_api::MeshService;
use trellis_compute::{ComputeProvider, ProviderError};

use crate::proxy::Proxy;

/// Resolves the services a proxy fronts
pub trait ProxyServiceMapper: Send + Sync {
    fn list_proxy_services(&self, proxy: &Proxy) -> Result<Vec<MeshService>, ProviderError>;
}

/// Implicit mapping: the proxy owns the services its identity is registered
/// behind.
pub struct ServiceIdentityMapper {
    provider: Arc<dyn ComputeProvider>,
}

impl ServiceIdentityMapper {
    pub fn new(provider: Arc<dyn ComputeProvider>) -> Self {
        Self { provider }
    }
}

impl ProxyServiceMapper for ServiceIdentityMapper {
    fn list_proxy_services(&self, proxy: &Proxy) -> Result<Vec<MeshService>, ProviderError> {
        let mut services = self
            .provider
            .get_services_for_service_identity(proxy.identity())?;
        services.sort();
        Ok(services)
    }
}

/// Explicit mapping from a caller-supplied function
pub struct ExplicitMapper(
    Box<dyn Fn(&Proxy) -> Result<Vec<MeshService>, ProviderError> + Send + Sync>,
);

impl ExplicitMapper {
    pub fn new(
        f: impl Fn(&Proxy) -> Result<Vec<MeshService>, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self(Box::new(f))
    }
}

impl ProxyServiceMapper for ExplicitMapper {
    fn list_proxy_services(&self, proxy: &Proxy) -> Result<Vec<MeshService>, ProviderError> {
        (self.0)(proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_api::ServiceIdentity;
    use trellis_compute::fake::fixtures;
    use uuid::Uuid;

    use crate::proxy::ProxyKind;

    fn proxy_for(identity: ServiceIdentity) -> Proxy {
        Proxy::new(Uuid::new_v4(), ProxyKind::Sidecar, identity, "serial")
    }

    #[test]
    fn test_identity_mapper_resolves_owned_services_sorted() {
        let provider = Arc::new(fixtures::book_world());
        let mapper = ServiceIdentityMapper::new(provider);

        let services = mapper
            .list_proxy_services(&proxy_for(fixtures::bookstore_identity()))
            .unwrap();
        assert_eq!(
            services,
            vec![fixtures::bookstore_service(), fixtures::bookstore_v2_service()]
        );
    }

    #[test]
    fn test_identity_mapper_unknown_identity_owns_nothing() {
        let provider = Arc::new(fixtures::book_world());
        let mapper = ServiceIdentityMapper::new(provider);
        let services = mapper
            .list_proxy_services(&proxy_for(ServiceIdentity::new("ghost", "nowhere")))
            .unwrap();
        assert!(services.is_empty());
    }

    #[test]
    fn test_explicit_mapper_uses_supplied_function() {
        let mapper = ExplicitMapper::new(|_proxy| Ok(vec![fixtures::bookbuyer_service()]));
        let services = mapper
            .list_proxy_services(&proxy_for(fixtures::bookbuyer_identity()))
            .unwrap();
        assert_eq!(services, vec![fixtures::bookbuyer_service()]);
    }
}
