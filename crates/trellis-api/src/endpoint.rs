//! Service endpoints
//!
//! Endpoints are produced exclusively by compute providers; the catalog and
//! the builders only select and order them.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// A reachable (address, port) for a mesh service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint IP address
    pub ip: IpAddr,
    /// Port the endpoint listens on
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}
