//! Proxy registry
//!
//! Maps connection UUIDs to live proxy records. The map is sharded
//! (`DashMap`) and each record carries its own subscription guard, so
//! concurrent sessions never serialize on each other. Unregistering while a
//! build for the same identity is in flight is safe: the build either already
//! holds the record's `Arc` and completes against that snapshot, or observes
//! the proxy absent and aborts cleanly.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use trellis_api::{MeshService, ResourceType};
use trellis_compute::ProviderError;

use crate::certificate::{IdentityError, parse_common_name};
use crate::mapper::ProxyServiceMapper;
use crate::proxy::Proxy;

/// Registry of connected proxies
pub struct ProxyRegistry {
    proxies: DashMap<Uuid, Arc<Proxy>>,
    mapper: Arc<dyn ProxyServiceMapper>,
}

impl ProxyRegistry {
    /// Create a registry with the given proxy-to-services mapper. The mapper
    /// is fixed for the registry's lifetime.
    pub fn new(mapper: Arc<dyn ProxyServiceMapper>) -> Self {
        Self {
            proxies: DashMap::new(),
            mapper,
        }
    }

    /// Register a newly authenticated session.
    ///
    /// The identity is derived exclusively from the certificate common name.
    /// A common name that does not decode leaves no registry entry behind.
    /// Re-registration under the same connection UUID returns the existing
    /// record with its certificate serial refreshed; the identity is pinned
    /// by the UUID embedded in the common name, so it never changes for the
    /// lifetime of the record.
    pub fn register(
        &self,
        common_name: &str,
        cert_serial: &str,
    ) -> Result<Arc<Proxy>, IdentityError> {
        let meta = parse_common_name(common_name).inspect_err(|e| {
            warn!(common_name = %common_name, error = %e, "Rejecting proxy registration");
        })?;

        let proxy = self
            .proxies
            .entry(meta.proxy_uuid)
            .and_modify(|existing| existing.refresh_cert_serial(cert_serial))
            .or_insert_with(|| {
                Arc::new(Proxy::new(
                    meta.proxy_uuid,
                    meta.kind,
                    meta.identity.clone(),
                    cert_serial,
                ))
            })
            .clone();

        info!(proxy = %proxy, "Registered proxy");
        Ok(proxy)
    }

    /// Look up a connected proxy by its connection UUID
    pub fn lookup(&self, proxy_uuid: Uuid) -> Option<Arc<Proxy>> {
        self.proxies.get(&proxy_uuid).map(|entry| entry.clone())
    }

    /// Remove a proxy and discard its subscription state
    pub fn unregister(&self, proxy_uuid: Uuid) {
        if self.proxies.remove(&proxy_uuid).is_some() {
            info!(proxy_uuid = %proxy_uuid, "Unregistered proxy");
        }
    }

    /// Replace (not merge) the subscription set for one resource type.
    ///
    /// For the secret resource type this is what scopes certificate delivery
    /// to only the peers the proxy currently needs.
    pub fn set_subscribed_resources(
        &self,
        proxy: &Proxy,
        resource_type: ResourceType,
        names: BTreeSet<String>,
    ) {
        debug!(
            proxy_uuid = %proxy.uuid(),
            resource_type = %resource_type,
            count = names.len(),
            "Replacing subscriptions"
        );
        proxy.replace_subscriptions(resource_type, names);
    }

    /// Services the given proxy fronts, per the configured mapper
    pub fn list_proxy_services(&self, proxy: &Proxy) -> Result<Vec<MeshService>, ProviderError> {
        self.mapper.list_proxy_services(proxy)
    }

    /// Proxies whose subscription for `resource_type` intersects `names`
    pub fn affected_proxies(
        &self,
        resource_type: ResourceType,
        names: &BTreeSet<String>,
    ) -> Vec<Arc<Proxy>> {
        let mut affected: Vec<Arc<Proxy>> = self
            .proxies
            .iter()
            .filter(|entry| entry.value().subscription_intersects(resource_type, names))
            .map(|entry| entry.value().clone())
            .collect();
        affected.sort_by_key(|p| p.uuid());
        affected
    }

    /// Number of connected proxies
    pub fn connected_count(&self) -> usize {
        self.proxies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_api::ServiceIdentity;

    use crate::certificate::certificate_common_name;
    use crate::mapper::ExplicitMapper;
    use crate::proxy::ProxyKind;

    fn registry() -> ProxyRegistry {
        ProxyRegistry::new(Arc::new(ExplicitMapper::new(|_| Ok(vec![]))))
    }

    #[test]
    fn test_register_derives_identity_from_common_name() {
        let reg = registry();
        let uuid = Uuid::new_v4();
        let cn = certificate_common_name(uuid, ProxyKind::Sidecar, "bookbuyer", "default");

        let proxy = reg.register(&cn, "serial-1").unwrap();
        assert_eq!(proxy.uuid(), uuid);
        assert_eq!(*proxy.identity(), ServiceIdentity::new("bookbuyer", "default"));
        assert_eq!(reg.connected_count(), 1);
    }

    #[test]
    fn test_register_bad_common_name_leaves_no_entry() {
        let reg = registry();
        assert!(reg.register("not-a-common-name", "serial").is_err());
        assert_eq!(reg.connected_count(), 0);
    }

    #[test]
    fn test_register_same_uuid_returns_existing_record() {
        let reg = registry();
        let uuid = Uuid::new_v4();
        let cn = certificate_common_name(uuid, ProxyKind::Sidecar, "bookbuyer", "default");

        let first = reg.register(&cn, "serial-1").unwrap();
        let second = reg.register(&cn, "serial-2").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(reg.connected_count(), 1);
    }

    #[test]
    fn test_reregistration_refreshes_certificate_serial() {
        let reg = registry();
        let uuid = Uuid::new_v4();
        let cn = certificate_common_name(uuid, ProxyKind::Sidecar, "bookbuyer", "default");

        let proxy = reg.register(&cn, "serial-1").unwrap();
        assert_eq!(proxy.cert_serial(), "serial-1");

        // Rotation re-registers under the same connection UUID; the record
        // survives but carries the new serial.
        reg.register(&cn, "serial-2").unwrap();
        assert_eq!(proxy.cert_serial(), "serial-2");
    }

    #[test]
    fn test_unregister_discards_subscription_state() {
        let reg = registry();
        let uuid = Uuid::new_v4();
        let cn = certificate_common_name(uuid, ProxyKind::Sidecar, "bookbuyer", "default");
        let proxy = reg.register(&cn, "serial").unwrap();

        reg.set_subscribed_resources(&proxy, ResourceType::Endpoint, ["a".to_string()].into());
        reg.unregister(uuid);
        assert!(reg.lookup(uuid).is_none());

        // Re-registration starts with a fresh wildcard subscription.
        let fresh = reg.register(&cn, "serial").unwrap();
        assert!(fresh.subscribed_resources(ResourceType::Endpoint).is_empty());
    }

    #[test]
    fn test_inflight_build_keeps_snapshot_across_unregister() {
        let reg = registry();
        let uuid = Uuid::new_v4();
        let cn = certificate_common_name(uuid, ProxyKind::Sidecar, "bookbuyer", "default");
        let held = reg.register(&cn, "serial").unwrap();

        reg.unregister(uuid);
        // The captured Arc stays valid for the remainder of the build.
        assert_eq!(*held.identity(), ServiceIdentity::new("bookbuyer", "default"));
        assert!(reg.lookup(uuid).is_none());
    }

    #[test]
    fn test_affected_proxies_intersection() {
        let reg = registry();
        let a = reg
            .register(
                &certificate_common_name(Uuid::new_v4(), ProxyKind::Sidecar, "a", "ns"),
                "s",
            )
            .unwrap();
        let b = reg
            .register(
                &certificate_common_name(Uuid::new_v4(), ProxyKind::Sidecar, "b", "ns"),
                "s",
            )
            .unwrap();

        reg.set_subscribed_resources(&a, ResourceType::Endpoint, ["ns/x|80".to_string()].into());
        reg.set_subscribed_resources(&b, ResourceType::Endpoint, ["ns/y|80".to_string()].into());

        let change: BTreeSet<String> = ["ns/x|80".to_string()].into();
        let affected = reg.affected_proxies(ResourceType::Endpoint, &change);
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0].uuid(), a.uuid());
    }

    #[test]
    fn test_concurrent_subscription_updates_do_not_serialize_reads() {
        let reg = Arc::new(registry());
        let a = reg
            .register(
                &certificate_common_name(Uuid::new_v4(), ProxyKind::Sidecar, "a", "ns"),
                "s",
            )
            .unwrap();
        let b = reg
            .register(
                &certificate_common_name(Uuid::new_v4(), ProxyKind::Sidecar, "b", "ns"),
                "s",
            )
            .unwrap();

        let reg2 = reg.clone();
        let a2 = a.clone();
        let writer = std::thread::spawn(move || {
            for i in 0..1000 {
                reg2.set_subscribed_resources(
                    &a2,
                    ResourceType::Endpoint,
                    [format!("ns/svc-{i}|80")].into(),
                );
            }
        });
        for _ in 0..1000 {
            let _ = b.subscribed_resources(ResourceType::Endpoint);
        }
        writer.join().unwrap();
    }
}
