//! Trellis Common - Shared diagnostic codes and logging setup
//!
//! This crate provides the foundation used across all Trellis components:
//! - Diagnostic codes attached to structured log events
//! - Logging initialization (explicit handle, no ambient mutable default)

pub mod codes;
pub mod logging;

pub use codes::DiagnosticCode;
pub use logging::init_logging;

/// Header prefix for proxy stats headers pushed into inbound route configs
pub const STATS_HEADER_PREFIX: &str = "trellis-stats";

/// Wildcard resource name in discovery subscriptions
pub const WILDCARD_RESOURCE: &str = "*";
