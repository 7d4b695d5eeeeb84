//! Per-session proxy record
//!
//! One `Proxy` exists per established discovery session. The registry owns
//! its lifecycle and its subscription sets; builders only read them through
//! the `Arc` they captured when the build started.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trellis_api::{ResourceType, ServiceIdentity};

/// The role a proxy plays in the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyKind {
    /// Sidecar injected next to a workload
    Sidecar,
    /// Standalone gateway at the mesh edge
    Gateway,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Sidecar => f.write_str("sidecar"),
            ProxyKind::Gateway => f.write_str("gateway"),
        }
    }
}

impl FromStr for ProxyKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sidecar" => Ok(ProxyKind::Sidecar),
            "gateway" => Ok(ProxyKind::Gateway),
            _ => Err(()),
        }
    }
}

/// A connected proxy session
pub struct Proxy {
    uuid: Uuid,
    kind: ProxyKind,
    identity: ServiceIdentity,
    /// Serial of the certificate currently backing the session; refreshed
    /// in place when the proxy re-registers after certificate rotation.
    cert_serial: RwLock<String>,
    connected_at: DateTime<Utc>,
    /// Per-resource-type subscribed resource names. One guard per proxy
    /// record; updating one proxy's subscriptions never blocks another's.
    subscriptions: RwLock<HashMap<ResourceType, BTreeSet<String>>>,
}

impl Proxy {
    pub fn new(
        uuid: Uuid,
        kind: ProxyKind,
        identity: ServiceIdentity,
        cert_serial: impl Into<String>,
    ) -> Self {
        Self {
            uuid,
            kind,
            identity,
            cert_serial: RwLock::new(cert_serial.into()),
            connected_at: Utc::now(),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn cert_serial(&self) -> String {
        self.cert_serial.read().clone()
    }

    /// Replace the recorded certificate serial. Registry-only.
    pub(crate) fn refresh_cert_serial(&self, cert_serial: impl Into<String>) {
        *self.cert_serial.write() = cert_serial.into();
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Snapshot of the subscription set for one resource type
    pub fn subscribed_resources(&self, resource_type: ResourceType) -> BTreeSet<String> {
        self.subscriptions
            .read()
            .get(&resource_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any subscribed name for the type intersects `names`.
    /// An empty subscription set means the proxy subscribed to everything.
    pub fn subscription_intersects(
        &self,
        resource_type: ResourceType,
        names: &BTreeSet<String>,
    ) -> bool {
        let subscriptions = self.subscriptions.read();
        match subscriptions.get(&resource_type) {
            None => true,
            Some(set) if set.is_empty() => true,
            Some(set) => {
                set.contains(trellis_common::WILDCARD_RESOURCE)
                    || names.is_empty()
                    || names.iter().any(|n| set.contains(n))
            }
        }
    }

    /// Replace the subscription set for one resource type. Registry-only.
    pub(crate) fn replace_subscriptions(
        &self,
        resource_type: ResourceType,
        names: BTreeSet<String>,
    ) {
        self.subscriptions.write().insert(resource_type, names);
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.kind, self.identity, self.uuid)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cert_serial = self.cert_serial.read();
        f.debug_struct("Proxy")
            .field("uuid", &self.uuid)
            .field("kind", &self.kind)
            .field("identity", &self.identity)
            .field("cert_serial", &*cert_serial)
            .finish_non_exhaustive()
    }
}
