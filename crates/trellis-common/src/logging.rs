//! Logging initialization
//!
//! The control plane logs through `tracing` with structured fields. The
//! subscriber is installed exactly once by the embedding process; components
//! receive no ambient mutable logging state beyond it.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global tracing subscriber.
///
/// `filter` follows the `EnvFilter` directive syntax (e.g. `"info,trellis_xds=debug"`);
/// an invalid directive falls back to the `RUST_LOG` environment, then `info`.
/// Returns an error if a subscriber is already installed.
pub fn init_logging(filter: &str) -> Result<(), anyhow::Error> {
    let env_filter = EnvFilter::try_new(filter)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}
