//! Secret discovery responses
//!
//! Targeted-only: a wildcard secret request answers with nothing. Secret
//! names are `service-cert:<namespace>/<service-account>` or
//! `root-cert:<namespace>/<service-account>`. A proxy may obtain the
//! service certificate of its own identity and trust bundles for peer
//! validation; a request for another workload's service certificate is
//! refused and logged, without failing the rest of the response.
//!
//! Issuance goes through the certificate manager collaborator and runs with
//! no registry or catalog lock held.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use tracing::warn;

use trellis_api::{ResourceType, ServiceAccount};
use trellis_common::codes;
use trellis_proxy::certificate::CertificateManager;
use trellis_proxy::Proxy;

use crate::types::{ResourceData, Secret, TlsCertificate, ValidationContext};
use crate::{ResponseBuilder, ResponseError};

const SERVICE_CERT_PREFIX: &str = "service-cert";
const ROOT_CERT_PREFIX: &str = "root-cert";

/// Error parsing a secret resource name
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid secret name '{0}': expected <service-cert|root-cert>:<namespace>/<service-account>")]
pub struct SecretNameParseError(pub String);

/// A parsed secret resource name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretName {
    /// The workload certificate of one service account
    ServiceCert(ServiceAccount),
    /// The trust bundle used to validate one service account's peers
    RootCert(ServiceAccount),
}

impl fmt::Display for SecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, account) = match self {
            SecretName::ServiceCert(account) => (SERVICE_CERT_PREFIX, account),
            SecretName::RootCert(account) => (ROOT_CERT_PREFIX, account),
        };
        write!(f, "{prefix}:{}/{}", account.namespace, account.name)
    }
}

impl FromStr for SecretName {
    type Err = SecretNameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SecretNameParseError(s.to_string());
        let (prefix, rest) = s.split_once(':').ok_or_else(err)?;
        let (namespace, name) = rest.split_once('/').ok_or_else(err)?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return Err(err());
        }
        let account = ServiceAccount::new(name, namespace);
        match prefix {
            SERVICE_CERT_PREFIX => Ok(SecretName::ServiceCert(account)),
            ROOT_CERT_PREFIX => Ok(SecretName::RootCert(account)),
            _ => Err(err()),
        }
    }
}

/// Builds secret resources for a proxy
pub struct SecretResponseBuilder {
    certificate_manager: Arc<dyn CertificateManager>,
    cert_validity: Duration,
}

impl SecretResponseBuilder {
    pub fn new(certificate_manager: Arc<dyn CertificateManager>, cert_validity: Duration) -> Self {
        Self {
            certificate_manager,
            cert_validity,
        }
    }

    fn secret_for(
        &self,
        proxy: &Proxy,
        raw_name: &str,
    ) -> Result<Option<ResourceData>, ResponseError> {
        let secret_name: SecretName = match raw_name.parse() {
            Ok(name) => name,
            Err(e) => {
                warn!(
                    code = %codes::MALFORMED_RESOURCE_NAME,
                    proxy = %proxy,
                    resource = %raw_name,
                    error = %e,
                    "Skipping unparseable secret name"
                );
                return Ok(None);
            }
        };

        let secret = match secret_name {
            SecretName::ServiceCert(account) => {
                if account != proxy.identity().to_service_account() {
                    warn!(
                        code = %codes::SECRET_NOT_ENTITLED,
                        proxy = %proxy,
                        resource = %raw_name,
                        "Refusing service certificate for another workload"
                    );
                    return Ok(None);
                }
                let issued = self.certificate_manager.issue_certificate(
                    account.to_service_identity().as_str(),
                    self.cert_validity,
                )?;
                Secret {
                    name: raw_name.to_string(),
                    tls_certificate: Some(TlsCertificate {
                        cert_chain_pem: issued.cert_chain_pem,
                        private_key_pem: issued.private_key_pem,
                    }),
                    validation_context: None,
                }
            }
            SecretName::RootCert(account) => {
                let issued = self.certificate_manager.issue_certificate(
                    account.to_service_identity().as_str(),
                    self.cert_validity,
                )?;
                Secret {
                    name: raw_name.to_string(),
                    tls_certificate: None,
                    validation_context: Some(ValidationContext {
                        trusted_ca_pem: issued.issuing_ca_pem,
                    }),
                }
            }
        };
        Ok(Some(ResourceData::encode(raw_name, &secret)?))
    }
}

impl ResponseBuilder for SecretResponseBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Secret
    }

    fn build(
        &self,
        proxy: &Proxy,
        requested: Option<&[String]>,
    ) -> Result<Vec<ResourceData>, ResponseError> {
        let Some(names) = requested else {
            return Ok(Vec::new());
        };
        let mut resources = Vec::new();
        for name in names {
            if let Some(resource) = self.secret_for(proxy, name)? {
                resources.push(resource);
            }
        }
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use trellis_api::ServiceIdentity;
    use trellis_proxy::certificate::FakeCertificateManager;
    use trellis_proxy::ProxyKind;
    use uuid::Uuid;

    use super::*;

    fn builder() -> SecretResponseBuilder {
        SecretResponseBuilder::new(Arc::new(FakeCertificateManager), Duration::hours(24))
    }

    fn bookbuyer_proxy() -> Proxy {
        Proxy::new(
            Uuid::new_v4(),
            ProxyKind::Sidecar,
            ServiceIdentity::new("bookbuyer", "default"),
            "serial",
        )
    }

    #[test]
    fn test_secret_name_round_trips() {
        for raw in ["service-cert:default/bookbuyer", "root-cert:default/bookbuyer"] {
            let parsed: SecretName = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
    }

    #[test]
    fn test_secret_name_rejects_malformed_inputs() {
        for raw in [
            "service-cert",
            "service-cert:default",
            "service-cert:/bookbuyer",
            "service-cert:default/",
            "client-cert:default/bookbuyer",
            "service-cert:default/a/b",
        ] {
            assert!(raw.parse::<SecretName>().is_err(), "{raw}");
        }
    }

    #[test]
    fn test_own_service_cert_is_served() {
        let resources = builder()
            .build(
                &bookbuyer_proxy(),
                Some(&["service-cert:default/bookbuyer".to_string()]),
            )
            .unwrap();
        assert_eq!(resources.len(), 1);
        let secret: Secret = serde_json::from_value(resources[0].body.clone()).unwrap();
        assert!(secret.tls_certificate.is_some());
        assert!(secret.validation_context.is_none());
    }

    #[test]
    fn test_peer_service_cert_is_refused() {
        let resources = builder()
            .build(
                &bookbuyer_proxy(),
                Some(&[
                    "service-cert:default/bookstore".to_string(),
                    "service-cert:default/bookbuyer".to_string(),
                ]),
            )
            .unwrap();
        // Only the proxy's own certificate comes back; the refusal does not
        // fail the response.
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "service-cert:default/bookbuyer");
    }

    #[test]
    fn test_root_cert_carries_trust_bundle_only() {
        let resources = builder()
            .build(
                &bookbuyer_proxy(),
                Some(&["root-cert:default/bookbuyer".to_string()]),
            )
            .unwrap();
        let secret: Secret = serde_json::from_value(resources[0].body.clone()).unwrap();
        assert!(secret.tls_certificate.is_none());
        assert!(secret.validation_context.is_some());
    }

    #[test]
    fn test_wildcard_request_yields_no_secrets() {
        let resources = builder().build(&bookbuyer_proxy(), None).unwrap();
        assert!(resources.is_empty());
    }
}
