//! Tracing setup for embedders and tests
use tracing_subscriber::EnvFilter;

use crate::error::RuntimeError;

/// Installs a global fmt subscriber filtered by `filter`
/// (e.g. `"streamfn_core=debug,info"`).
pub fn init_tracing(filter: &str) -> Result<(), RuntimeError> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| RuntimeError::Config(format!("invalid log filter '{}': {}", filter, e)))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| RuntimeError::Telemetry(e.to_string()))
}
