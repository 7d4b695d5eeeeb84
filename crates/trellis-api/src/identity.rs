//! Service identities
//!
//! A `ServiceIdentity` is the canonical `name.namespace` principal bound to a
//! service-account-equivalent subject. It is the authorization subject for
//! every traffic decision; any other shape is a data error, never silently
//! normalized.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error constructing a service identity from a raw string
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid service identity '{0}': expected <name>.<namespace>")]
pub struct IdentityParseError(pub String);

/// Canonical `name.namespace` principal
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceIdentity(String);

impl ServiceIdentity {
    /// Build an identity from its service-account name and namespace
    pub fn new(name: impl AsRef<str>, namespace: impl AsRef<str>) -> Self {
        Self(format!("{}.{}", name.as_ref(), namespace.as_ref()))
    }

    /// The wildcard principal. Permissive traffic policy admits it on every
    /// inbound rule; it never resolves to a service account.
    pub fn wildcard() -> Self {
        Self("*".to_string())
    }

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The service-account subject this identity is bound to
    pub fn to_service_account(&self) -> ServiceAccount {
        // Constructors guarantee exactly one separator.
        let (name, namespace) = self
            .0
            .split_once('.')
            .unwrap_or((self.0.as_str(), ""));
        ServiceAccount {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServiceIdentity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((name, namespace))
                if !name.is_empty() && !namespace.is_empty() && !namespace.contains('.') =>
            {
                Ok(Self(s.to_string()))
            }
            _ => Err(IdentityParseError(s.to_string())),
        }
    }
}

/// A service-account-equivalent subject
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub name: String,
    pub namespace: String,
}

impl ServiceAccount {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// The canonical identity for this subject
    pub fn to_service_identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(&self.name, &self.namespace)
    }
}

impl fmt::Display for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
