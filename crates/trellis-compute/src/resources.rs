//! Raw policy resources as providers surface them
//!
//! These mirror the backing store's shapes before the catalog joins and
//! projects them. The catalog owns all resolution logic; providers only
//! enumerate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use trellis_api::ServiceAccount;

/// Reference from a traffic target to matches inside a route group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteGroupRef {
    /// Resource kind, e.g. `HTTPRouteGroup`
    pub kind: String,
    /// Route group name, resolved in the target's namespace
    pub name: String,
    /// Names of the matches referenced inside the group
    pub matches: Vec<String>,
}

/// A raw policy edge: sources may reach the destination over referenced routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficTargetResource {
    pub name: String,
    pub namespace: String,
    pub destination: ServiceAccount,
    pub sources: Vec<ServiceAccount>,
    /// Empty means the edge authorizes all traffic between the principals
    pub route_refs: Vec<RouteGroupRef>,
}

/// One declared HTTP match rule inside a route group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMatch {
    pub name: String,
    pub path_regex: String,
    /// Copied verbatim into the flattened route; no implicit expansion
    pub methods: Vec<String>,
    pub headers: BTreeMap<String, String>,
    /// Host constraint; surfaces as the `host` header in the flattened route
    pub host: Option<String>,
}

/// A named group of HTTP match rules referenced by traffic targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRouteGroup {
    pub namespace: String,
    pub name: String,
    pub matches: Vec<HttpMatch>,
}

impl HttpRouteGroup {
    /// Kind token used in flattened route keys
    pub const KIND: &'static str = "HTTPRouteGroup";
}

/// One backend a service exposes to ingress traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressBackendSpec {
    pub path_regex: String,
    pub host: String,
    pub methods: Vec<String>,
    pub headers: BTreeMap<String, String>,
}

/// Policy admitting traffic from outside the mesh to one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressBackend {
    pub name: String,
    pub namespace: String,
    /// Principals admitted through this ingress
    pub allowed_sources: Vec<ServiceAccount>,
    pub backends: Vec<IngressBackendSpec>,
}

/// Policy authorizing an identity to reach non-mesh destinations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressPolicySpec {
    pub name: String,
    pub namespace: String,
    /// External hostnames the policy covers
    pub hosts: Vec<String>,
    /// Destination ports the policy covers
    pub ports: Vec<u16>,
    /// Allowed path regexes; empty means any path
    pub path_regexes: Vec<String>,
}

impl EgressPolicySpec {
    /// Resource name used for the egress route configuration
    pub fn resource_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}
