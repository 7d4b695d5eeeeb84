//! Trellis Proxy - connected proxy sessions and their subscription state
//!
//! The registry is the only core-owned mutable shared state in the control
//! plane. It tracks each connected proxy by its connection UUID, resolves the
//! proxy's identity from the session certificate's common name, and owns the
//! per-resource-type subscription sets the dispatcher uses to scope pushes.
//!
//! - `certificate` - common-name codec and the certificate manager seam
//! - `proxy` - the per-session record
//! - `registry` - register/lookup/unregister and subscription replacement
//! - `mapper` - pluggable proxy-to-owned-services resolution

pub mod certificate;
pub mod mapper;
pub mod proxy;
pub mod registry;

pub use certificate::{
    CertificateManager, CommonNameMeta, DecodedCertificate, FakeCertificateManager,
    IdentityError, IssuedCertificate, certificate_common_name, parse_common_name,
};
pub use mapper::{ExplicitMapper, ProxyServiceMapper, ServiceIdentityMapper};
pub use proxy::{Proxy, ProxyKind};
pub use registry::ProxyRegistry;
