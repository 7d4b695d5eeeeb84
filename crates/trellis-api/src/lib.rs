//! Trellis API - Data model for the mesh control plane
//!
//! This crate defines the vocabulary shared by the catalog, the discovery
//! response builders and the proxy registry:
//! - `service` - addressable traffic units and the endpoint resource naming grammar
//! - `identity` - the `name.namespace` principal used for authorization
//! - `endpoint` - reachable (address, port) pairs produced by providers
//! - `route` - HTTP path/method/header match rules
//! - `policy` - traffic targets and per-identity/per-service policy aggregates
//! - `config` - mesh-wide feature flags and upstream traffic settings
//! - `discovery` - discovery resource categories and their push order

pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod identity;
pub mod policy;
pub mod route;
pub mod service;

pub use config::{MeshConfig, RetryPolicySpec, UpstreamTrafficSetting};
pub use discovery::ResourceType;
pub use endpoint::Endpoint;
pub use identity::{IdentityParseError, ServiceAccount, ServiceIdentity};
pub use policy::{
    EgressHttpRouteConfig, EgressTrafficPolicy, InboundHttpRouteConfig, InboundMeshTrafficPolicy,
    IngressHttpRoutePolicy, IngressTrafficPolicy, OutboundHttpRouteConfig,
    OutboundMeshTrafficPolicy, Rule, TrafficTarget, merge_ingress_policies,
};
pub use route::{HttpRouteMatch, MethodMatch};
pub use service::{MeshService, NameParseError};
