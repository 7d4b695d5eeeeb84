//! Mesh-wide configuration and upstream traffic settings

use serde::{Deserialize, Serialize};

/// Feature flags and mesh-wide switches supplied by providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Allow all service-to-service traffic without explicit traffic targets
    pub enable_permissive_traffic_policy: bool,
    /// Attach per-proxy stats headers to inbound route configurations
    pub enable_wasm_stats: bool,
    /// Allow egress to non-mesh destinations mesh-wide
    pub enable_egress: bool,
}

/// Retry behavior applied to routes towards an upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicySpec {
    /// Conditions that trigger a retry (e.g. `5xx`, `connect-failure`)
    pub retry_on: String,
    pub num_retries: u32,
    pub per_try_timeout_ms: u64,
}

/// Connection-level settings for traffic towards an upstream host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamTrafficSetting {
    /// Host the setting applies to
    pub host: String,
    pub max_connections: Option<u32>,
    pub max_requests_per_connection: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_config_defaults_closed() {
        let cfg = MeshConfig::default();
        assert!(!cfg.enable_permissive_traffic_policy);
        assert!(!cfg.enable_wasm_stats);
        assert!(!cfg.enable_egress);
    }
}
