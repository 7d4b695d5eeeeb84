//! Traffic policy aggregates
//!
//! The catalog answers identity- and service-scoped questions with the types
//! here. All collections are ordered (`BTreeMap`/`BTreeSet`/sorted `Vec`) so
//! two queries against unchanged provider state are value-identical,
//! element ordering included.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::identity::ServiceIdentity;
use crate::route::HttpRouteMatch;
use crate::service::MeshService;

/// A directional policy edge authorizing `source` to reach `destination`
/// over one route. Not transitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrafficTarget {
    /// Name of the backing policy resource
    pub name: String,
    /// Downstream principal
    pub source: ServiceIdentity,
    /// Upstream principal
    pub destination: ServiceIdentity,
    /// The route this edge authorizes
    pub route: HttpRouteMatch,
}

/// One allowed route with the principals allowed to use it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rule {
    pub route: HttpRouteMatch,
    pub allowed_principals: BTreeSet<ServiceIdentity>,
}

/// Inbound route configuration for one service behind the proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundHttpRouteConfig {
    /// Resource name, the service's endpoint resource name
    pub name: String,
    /// Hostnames downstream clients may use to address the service
    pub hostnames: Vec<String>,
    pub rules: Vec<Rule>,
}

/// Routes the proxy's services accept from in-mesh downstreams, partitioned
/// by listening port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMeshTrafficPolicy {
    pub route_configs_per_port: BTreeMap<u16, Vec<InboundHttpRouteConfig>>,
}

impl InboundMeshTrafficPolicy {
    pub fn is_empty(&self) -> bool {
        self.route_configs_per_port.is_empty()
    }
}

/// Outbound route configuration towards one upstream service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundHttpRouteConfig {
    /// Resource name, the upstream's endpoint resource name
    pub name: String,
    /// Upstream this configuration routes to
    pub upstream: MeshService,
    /// Hostnames this proxy may use to address the upstream
    pub hostnames: Vec<String>,
    /// Allowed routes towards the upstream
    pub routes: Vec<HttpRouteMatch>,
    /// Retry behavior for this upstream, when a retry policy applies
    pub retry: Option<crate::config::RetryPolicySpec>,
    /// Connection-level settings for this upstream, when configured
    pub upstream_traffic_setting: Option<crate::config::UpstreamTrafficSetting>,
}

/// Routes this proxy may use towards upstreams, partitioned by upstream port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMeshTrafficPolicy {
    pub route_configs_per_port: BTreeMap<u16, Vec<OutboundHttpRouteConfig>>,
}

impl OutboundMeshTrafficPolicy {
    pub fn is_empty(&self) -> bool {
        self.route_configs_per_port.is_empty()
    }
}

/// One ingress route admitted from outside the mesh
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IngressHttpRoutePolicy {
    pub route: HttpRouteMatch,
    /// Host the route applies to; together with the path regex this is the
    /// merge key across services
    pub host: String,
    pub allowed_principals: BTreeSet<ServiceIdentity>,
}

/// Ingress routes admitted for one service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressTrafficPolicy {
    pub http_route_policies: Vec<IngressHttpRoutePolicy>,
}

/// Egress route configuration towards one external destination host set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressHttpRouteConfig {
    /// Resource name, `<policy-namespace>/<policy-name>`
    pub name: String,
    /// External hostnames the routes apply to
    pub hostnames: Vec<String>,
    /// Allowed routes towards the external destination
    pub routes: Vec<HttpRouteMatch>,
}

/// Egress routes towards non-mesh destinations, partitioned by upstream port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressTrafficPolicy {
    pub route_configs_per_port: BTreeMap<u16, Vec<EgressHttpRouteConfig>>,
}

impl EgressTrafficPolicy {
    pub fn is_empty(&self) -> bool {
        self.route_configs_per_port.is_empty()
    }
}

/// Merge incoming ingress route policies into an accumulated list.
///
/// Policies merge on the `(path_regex, host)` key: methods are unioned,
/// header entries are unioned with the last-applied policy winning on a
/// conflicting header key, and allowed principals accumulate. Keys not yet
/// present are appended in arrival order.
pub fn merge_ingress_policies(
    mut accumulated: Vec<IngressHttpRoutePolicy>,
    incoming: impl IntoIterator<Item = IngressHttpRoutePolicy>,
) -> Vec<IngressHttpRoutePolicy> {
    for policy in incoming {
        match accumulated
            .iter_mut()
            .find(|p| p.route.path_regex == policy.route.path_regex && p.host == policy.host)
        {
            Some(existing) => {
                existing.route.methods =
                    std::mem::replace(&mut existing.route.methods, crate::route::MethodMatch::None)
                        .union(policy.route.methods);
                // Last-applied wins on conflicting header values.
                existing.route.headers.extend(policy.route.headers);
                existing.allowed_principals.extend(policy.allowed_principals);
            }
            None => accumulated.push(policy),
        }
    }
    accumulated
}
