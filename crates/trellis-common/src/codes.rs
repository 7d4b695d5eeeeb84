//! Diagnostic codes for structured log events
//!
//! Multi-element catalog queries drop unresolvable elements instead of
//! failing; every drop is logged with one of these codes so operators can
//! alert on specific failure classes without parsing log text.

use serde::{Deserialize, Serialize};

/// A stable diagnostic code attached to a log event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCode {
    pub code: &'static str,
    pub message: &'static str,
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code)
    }
}

/// No endpoints resolved for an upstream service; the cluster is skipped
/// in the endpoint discovery response.
pub const ENDPOINTS_NOT_FOUND: DiagnosticCode = DiagnosticCode {
    code: "E5301",
    message: "endpoints not found for upstream service",
};

/// A requested resource name did not parse against the naming grammar.
pub const MALFORMED_RESOURCE_NAME: DiagnosticCode = DiagnosticCode {
    code: "E5302",
    message: "malformed discovery resource name",
};

/// A policy edge referenced a backing resource that could not be resolved;
/// the edge is dropped from the query result.
pub const POLICY_EDGE_UNRESOLVED: DiagnosticCode = DiagnosticCode {
    code: "E5303",
    message: "traffic policy edge could not be resolved",
};

/// A route-group/match reference on a policy edge had no matching entry.
pub const ROUTE_REF_NOT_FOUND: DiagnosticCode = DiagnosticCode {
    code: "E5304",
    message: "route group match reference not found",
};

/// Fetching the service list for a proxy failed.
pub const FETCHING_SERVICE_LIST: DiagnosticCode = DiagnosticCode {
    code: "E5305",
    message: "error fetching services for proxy",
};

/// Ingress policy retrieval failed for one owned service; that service is
/// skipped in the merged ingress route configuration.
pub const INGRESS_POLICY_FETCH: DiagnosticCode = DiagnosticCode {
    code: "E5306",
    message: "error fetching ingress traffic policy for service",
};

/// Egress policy retrieval failed; treated as no egress configuration.
pub const EGRESS_POLICY_FETCH: DiagnosticCode = DiagnosticCode {
    code: "E5307",
    message: "error fetching egress traffic policy for identity",
};

/// A secret was requested for a peer the proxy is not entitled to.
pub const SECRET_NOT_ENTITLED: DiagnosticCode = DiagnosticCode {
    code: "E5308",
    message: "proxy requested a secret for an unrelated peer",
};
