//! Discovery exchange and resource payload types
//!
//! The payloads are the control plane's own shapes, serialized as JSON
//! bodies inside named resources. The transport layer re-frames them into
//! its wire encoding; nothing here carries versions or nonces.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use trellis_api::{
    Endpoint, HttpRouteMatch, ResourceType, RetryPolicySpec, ServiceIdentity,
};
use trellis_common::WILDCARD_RESOURCE;

use crate::ResponseError;

/// A discovery request as handed over by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub type_url: String,
    /// Explicit resource names; empty or `*` means everything
    pub resource_names: Vec<String>,
}

impl DiscoveryRequest {
    pub fn new(resource_type: ResourceType, resource_names: Vec<String>) -> Self {
        Self {
            type_url: resource_type.type_url().to_string(),
            resource_names,
        }
    }

    pub fn resource_type(&self) -> Option<ResourceType> {
        ResourceType::from_type_url(&self.type_url)
    }

    pub fn is_wildcard(&self) -> bool {
        self.resource_names.is_empty()
            || self.resource_names.iter().any(|n| n == WILDCARD_RESOURCE)
    }
}

/// One named resource inside a discovery response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData {
    pub name: String,
    pub body: serde_json::Value,
}

impl ResourceData {
    /// Serialize a payload under a resource name
    pub fn encode<T: Serialize>(name: impl Into<String>, body: &T) -> Result<Self, ResponseError> {
        let name = name.into();
        let body = serde_json::to_value(body).map_err(|source| ResponseError::Encode {
            name: name.clone(),
            source,
        })?;
        Ok(Self { name, body })
    }
}

/// One pushed batch of resources of a single category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub type_url: String,
    pub resources: Vec<ResourceData>,
}

impl DiscoveryResponse {
    pub fn new(resource_type: ResourceType, resources: Vec<ResourceData>) -> Self {
        Self {
            type_url: resource_type.type_url().to_string(),
            resources,
        }
    }
}

/// Endpoint assignment for one upstream cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAssignment {
    pub cluster_name: String,
    pub endpoints: Vec<Endpoint>,
}

/// One route inside a virtual host, with the principals allowed on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub route: HttpRouteMatch,
    /// Empty means the route carries no principal restriction at this layer
    pub allowed_principals: BTreeSet<ServiceIdentity>,
    /// Cluster requests on this route are forwarded to, when mesh-internal
    pub cluster: Option<String>,
    pub retry: Option<RetryPolicySpec>,
}

/// Routes grouped under the domains they serve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    pub routes: Vec<RouteEntry>,
}

/// A named route configuration resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfiguration {
    pub name: String,
    pub virtual_hosts: Vec<VirtualHost>,
    /// Headers appended to responses, used for per-workload stats tagging
    pub response_headers_to_add: BTreeMap<String, String>,
}

/// Certificate and key material for a workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsCertificate {
    pub cert_chain_pem: Vec<u8>,
    pub private_key_pem: Vec<u8>,
}

/// Trust bundle used to validate peer certificates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationContext {
    pub trusted_ca_pem: Vec<u8>,
}

/// A named secret resource: either certificate material or a trust bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub tls_certificate: Option<TlsCertificate>,
    pub validation_context: Option<ValidationContext>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_request_detection() {
        let explicit = DiscoveryRequest::new(
            ResourceType::Endpoint,
            vec!["default/bookstore|8080".to_string()],
        );
        assert!(!explicit.is_wildcard());
        assert_eq!(explicit.resource_type(), Some(ResourceType::Endpoint));

        let empty = DiscoveryRequest::new(ResourceType::Endpoint, vec![]);
        assert!(empty.is_wildcard());

        let star = DiscoveryRequest::new(ResourceType::Endpoint, vec!["*".to_string()]);
        assert!(star.is_wildcard());
    }

    #[test]
    fn test_resource_data_encodes_payload() {
        let assignment = EndpointAssignment {
            cluster_name: "default/bookstore|8080".to_string(),
            endpoints: vec![Endpoint::new("10.0.0.1".parse().unwrap(), 8080)],
        };
        let data = ResourceData::encode("default/bookstore|8080", &assignment).unwrap();
        assert_eq!(data.name, "default/bookstore|8080");
        assert_eq!(data.body["cluster_name"], "default/bookstore|8080");
    }
}
