//! Mesh services and the endpoint resource naming grammar
//!
//! A `MeshService` is one addressable traffic unit. Two services differing
//! only in target port are distinct units: endpoints are always derived from
//! the target port, never the service port.
//!
//! The wire-stable resource name used by the endpoint discovery exchange is
//!
//! ```text
//! <namespace>/<name>|<port>
//! <namespace>/<subdomain>.<name>|<port>   (headless-service instance)
//! ```
//!
//! `Display` formats it and `FromStr` parses it; the two must round-trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error parsing an endpoint discovery resource name
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameParseError {
    #[error("invalid resource name '{0}': expected <namespace>/<name>|<port>")]
    InvalidShape(String),

    #[error("invalid port '{port}' in resource name '{name}': expected unsigned 16-bit decimal")]
    InvalidPort { name: String, port: String },
}

/// An addressable traffic unit in the mesh
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeshService {
    /// Namespace the service resides in
    pub namespace: String,
    /// Service name
    pub name: String,
    /// Instance subdomain for headless services (e.g. the pod name `mysql-0`)
    pub subdomain: Option<String>,
    /// Port the backing endpoints listen on
    pub target_port: u16,
}

impl MeshService {
    /// Create a service without a subdomain
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        target_port: u16,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            subdomain: None,
            target_port,
        }
    }

    /// Set the headless-service instance subdomain
    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    /// The name token as it travels on the wire (`subdomain.name` or `name`)
    fn wire_name(&self) -> String {
        match &self.subdomain {
            Some(sub) => format!("{}.{}", sub, self.name),
            None => self.name.clone(),
        }
    }

    /// Namespaced name without port, used for log context
    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace, self.wire_name())
    }
}

impl fmt::Display for MeshService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}|{}",
            self.namespace,
            self.wire_name(),
            self.target_port
        )
    }
}

impl FromStr for MeshService {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NameParseError::InvalidShape(s.to_string());

        let (namespace, rest) = s.split_once('/').ok_or_else(invalid)?;
        let (name_token, port_token) = rest.split_once('|').ok_or_else(invalid)?;

        if namespace.is_empty()
            || name_token.is_empty()
            || namespace.contains(['/', '|'])
            || name_token.contains(['/', '|'])
        {
            return Err(invalid());
        }

        let target_port: u16 = port_token.parse().map_err(|_| NameParseError::InvalidPort {
            name: s.to_string(),
            port: port_token.to_string(),
        })?;

        // The subdomain travels embedded in the name token.
        let (subdomain, name) = match name_token.split_once('.') {
            None => (None, name_token),
            Some((sub, name)) => {
                if sub.is_empty() || name.is_empty() || name.contains('.') {
                    return Err(invalid());
                }
                (Some(sub.to_string()), name)
            }
        };

        Ok(MeshService {
            namespace: namespace.to_string(),
            name: name.to_string(),
            subdomain,
            target_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_plain_name() {
        let svc: MeshService = "foo/bar|80".parse().unwrap();
        assert_eq!(svc, MeshService::new("foo", "bar", 80));
    }

    #[test]
    fn test_parse_headless_instance_name() {
        let svc: MeshService = "foo/mysql-0.mysql|80".parse().unwrap();
        assert_eq!(
            svc,
            MeshService::new("foo", "mysql", 80).with_subdomain("mysql-0")
        );
    }

    #[test]
    fn test_parse_rejects_wrong_token_count() {
        assert!("foo/bar/local".parse::<MeshService>().is_err());
        assert!("foobar".parse::<MeshService>().is_err());
        assert!("foo/bar".parse::<MeshService>().is_err());
        assert!("foo|80".parse::<MeshService>().is_err());
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        let err = "foo/bar|http".parse::<MeshService>().unwrap_err();
        assert!(matches!(err, NameParseError::InvalidPort { .. }));
        assert!("foo/bar|65536".parse::<MeshService>().is_err());
    }

    #[test]
    fn test_parse_rejects_empty_tokens() {
        assert!("/bar|80".parse::<MeshService>().is_err());
        assert!("foo/|80".parse::<MeshService>().is_err());
        assert!("foo/.mysql|80".parse::<MeshService>().is_err());
        assert!("foo/mysql-0.|80".parse::<MeshService>().is_err());
    }

    #[test]
    fn test_display_format() {
        let svc = MeshService::new("default", "bookstore-v1", 80);
        assert_eq!(svc.to_string(), "default/bookstore-v1|80");

        let headless = MeshService::new("foo", "mysql", 3306).with_subdomain("mysql-0");
        assert_eq!(headless.to_string(), "foo/mysql-0.mysql|3306");
    }

    #[test]
    fn test_services_differing_in_target_port_are_distinct() {
        let a = MeshService::new("ns", "svc", 80);
        let b = MeshService::new("ns", "svc", 8080);
        assert_ne!(a, b);
    }

    fn token() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,15}"
    }

    proptest! {
        #[test]
        fn prop_name_round_trips(ns in token(), name in token(), sub in proptest::option::of(token()), port in 0u16..=u16::MAX) {
            let mut svc = MeshService::new(ns, name, port);
            if let Some(sub) = sub {
                svc = svc.with_subdomain(sub);
            }
            let parsed: MeshService = svc.to_string().parse().unwrap();
            prop_assert_eq!(parsed, svc);
        }
    }
}
