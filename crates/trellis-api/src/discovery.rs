//! Discovery resource types
//!
//! The configuration categories pushed to a proxy over the streaming
//! discovery exchange. The push order is fixed so a proxy never receives a
//! route referencing a cluster it has not yet been told about.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A discovery resource category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Cluster,
    Endpoint,
    Route,
    Listener,
    Secret,
}

impl ResourceType {
    /// Fixed push priority: clusters and endpoints before routes before
    /// listeners, secrets last.
    pub const PUSH_ORDER: [ResourceType; 5] = [
        ResourceType::Cluster,
        ResourceType::Endpoint,
        ResourceType::Route,
        ResourceType::Listener,
        ResourceType::Secret,
    ];

    /// Protocol type URL for this category
    pub fn type_url(&self) -> &'static str {
        match self {
            ResourceType::Cluster => "type.googleapis.com/envoy.config.cluster.v3.Cluster",
            ResourceType::Endpoint => {
                "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment"
            }
            ResourceType::Route => "type.googleapis.com/envoy.config.route.v3.RouteConfiguration",
            ResourceType::Listener => "type.googleapis.com/envoy.config.listener.v3.Listener",
            ResourceType::Secret => {
                "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret"
            }
        }
    }

    /// Resolve a category from its type URL
    pub fn from_type_url(url: &str) -> Option<ResourceType> {
        ResourceType::PUSH_ORDER
            .into_iter()
            .find(|rt| rt.type_url() == url)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Cluster => "CDS",
            ResourceType::Endpoint => "EDS",
            ResourceType::Route => "RDS",
            ResourceType::Listener => "LDS",
            ResourceType::Secret => "SDS",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_url_round_trips() {
        for rt in ResourceType::PUSH_ORDER {
            assert_eq!(ResourceType::from_type_url(rt.type_url()), Some(rt));
        }
        assert_eq!(ResourceType::from_type_url("type.googleapis.com/unknown"), None);
    }

    #[test]
    fn test_push_order_is_clusters_endpoints_routes_listeners() {
        let order = ResourceType::PUSH_ORDER;
        let pos = |rt| order.iter().position(|x| *x == rt).unwrap();
        assert!(pos(ResourceType::Cluster) < pos(ResourceType::Route));
        assert!(pos(ResourceType::Endpoint) < pos(ResourceType::Route));
        assert!(pos(ResourceType::Route) < pos(ResourceType::Listener));
    }
}
