//! Endpoint discovery responses
//!
//! Targeted mode resolves each requested cluster name independently: a name
//! that does not parse or resolves to zero endpoints is skipped with a
//! diagnostic, never answered with a placeholder. Wildcard mode walks every
//! upstream the proxy's identity is authorized to reach. In both modes a
//! destination with zero endpoints is simply absent from the response.

use std::sync::Arc;

use tracing::warn;

use trellis_api::{MeshService, ResourceType};
use trellis_catalog::MeshCatalog;
use trellis_common::codes;
use trellis_proxy::Proxy;

use crate::types::{EndpointAssignment, ResourceData};
use crate::{ResponseBuilder, ResponseError};

/// Builds cluster load assignments for a proxy
pub struct EndpointResponseBuilder {
    catalog: Arc<MeshCatalog>,
}

impl EndpointResponseBuilder {
    pub fn new(catalog: Arc<MeshCatalog>) -> Self {
        Self { catalog }
    }

    fn build_targeted(
        &self,
        proxy: &Proxy,
        requested: &[String],
    ) -> Result<Vec<ResourceData>, ResponseError> {
        let mut resources = Vec::new();
        for name in requested {
            let upstream: MeshService = match name.parse() {
                Ok(service) => service,
                Err(e) => {
                    warn!(
                        code = %codes::MALFORMED_RESOURCE_NAME,
                        proxy = %proxy,
                        resource = %name,
                        error = %e,
                        "Skipping unparseable cluster name"
                    );
                    continue;
                }
            };
            if let Some(resource) = self.assignment_for(proxy, &upstream)? {
                resources.push(resource);
            }
        }
        Ok(resources)
    }

    fn build_full(&self, proxy: &Proxy) -> Result<Vec<ResourceData>, ResponseError> {
        let upstreams = self
            .catalog
            .list_outbound_services_for_identity(proxy.identity())?;
        let mut resources = Vec::new();
        for upstream in &upstreams {
            if let Some(resource) = self.assignment_for(proxy, upstream)? {
                resources.push(resource);
            }
        }
        Ok(resources)
    }

    /// Assignment for one upstream, or `None` when nothing backs it
    fn assignment_for(
        &self,
        proxy: &Proxy,
        upstream: &MeshService,
    ) -> Result<Option<ResourceData>, ResponseError> {
        let endpoints = self
            .catalog
            .list_allowed_upstream_endpoints_for_service(proxy.identity(), upstream)?;
        if endpoints.is_empty() {
            warn!(
                code = %codes::ENDPOINTS_NOT_FOUND,
                proxy = %proxy,
                upstream = %upstream,
                "No endpoints for upstream; omitting cluster from response"
            );
            return Ok(None);
        }
        let cluster_name = upstream.to_string();
        let assignment = EndpointAssignment {
            cluster_name: cluster_name.clone(),
            endpoints,
        };
        Ok(Some(ResourceData::encode(cluster_name, &assignment)?))
    }
}

impl ResponseBuilder for EndpointResponseBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Endpoint
    }

    fn build(
        &self,
        proxy: &Proxy,
        requested: Option<&[String]>,
    ) -> Result<Vec<ResourceData>, ResponseError> {
        match requested {
            Some(names) if !names.is_empty() && !names.iter().any(|n| n == trellis_common::WILDCARD_RESOURCE) => {
                self.build_targeted(proxy, names)
            }
            _ => self.build_full(proxy),
        }
    }
}
