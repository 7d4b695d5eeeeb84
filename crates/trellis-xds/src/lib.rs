//! Trellis xDS - discovery response builders and the push dispatcher
//!
//! Each builder projects catalog state into the resources of one discovery
//! category for one proxy:
//! - `eds` - cluster load assignments (endpoints per upstream)
//! - `rds` - route configurations (inbound, outbound, ingress, egress)
//! - `sds` - workload certificates and trust bundles
//!
//! The dispatcher owns the per-proxy stream senders and turns resource
//! changes into per-proxy rebuild-and-push tasks in the fixed category
//! order. Version and nonce bookkeeping belong to the transport layer and
//! never appear here.

pub mod dispatcher;
pub mod eds;
pub mod rds;
pub mod sds;
pub mod types;

pub use dispatcher::{DispatcherConfig, PushDispatcher, ResourceChange};
pub use eds::EndpointResponseBuilder;
pub use rds::RouteResponseBuilder;
pub use sds::{SecretName, SecretNameParseError, SecretResponseBuilder};
pub use types::{DiscoveryRequest, DiscoveryResponse, ResourceData};

use trellis_api::ResourceType;
use trellis_proxy::Proxy;
use trellis_proxy::certificate::CertificateError;

/// Error building a per-proxy discovery response. Fails the whole response
/// for that proxy; other proxies are unaffected.
#[derive(thiserror::Error, Debug)]
pub enum ResponseError {
    #[error(transparent)]
    Catalog(#[from] trellis_catalog::CatalogError),

    #[error("failed to encode resource '{name}'")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

/// Builds the resources of one discovery category for one proxy.
///
/// `requested` carries the explicit resource names from the discovery
/// request; `None` is a wildcard build covering everything the proxy is
/// entitled to.
pub trait ResponseBuilder: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    fn build(
        &self,
        proxy: &Proxy,
        requested: Option<&[String]>,
    ) -> Result<Vec<ResourceData>, ResponseError>;
}
